//! Run configuration of the demo, read from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tandem_scheme::{ParticipantPair, SchemeConfig};

use crate::error::{DemoError, Result};

/// Everything needed to run both participants.
///
/// Missing fields take their default, so `{}` is a valid document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub participants: ParticipantPair,
    /// Shared scheme settings. The local participant is filled in per side.
    pub scheme: SchemeConfig,
    /// Time step each solver would like to take.
    pub solver_time_step: f64,
    /// Interface vertices of the shared mesh.
    pub vertices: usize,
    /// Relative convergence limit on the second participant's data.
    pub convergence_limit: f64,
    /// Under-relaxation factor, `None` to disable.
    pub relaxation: Option<f64>,
    /// Directory for `<participant>-diagnostics.jsonl` files.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            participants: ParticipantPair::default(),
            scheme: SchemeConfig::implicit("", 30)
                .with_time_window_size(0.1)
                .with_max_time_windows(10)
                .with_extrapolation_order(1),
            solver_time_step: 0.1,
            vertices: 4,
            convergence_limit: 1e-6,
            relaxation: Some(0.5),
            diagnostics_dir: None,
        }
    }
}

impl RunConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DemoError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Scheme configuration of `participant`.
    pub fn scheme_for(&self, participant: &str) -> SchemeConfig {
        SchemeConfig {
            local_participant: participant.to_string(),
            ..self.scheme.clone()
        }
    }
}
