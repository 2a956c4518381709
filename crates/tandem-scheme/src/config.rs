//! Construction parameters of a coupling scheme.

use serde::{Deserialize, Serialize};
use tandem_data::MAX_EXTRAPOLATION_ORDER;

use crate::error::{Error, Result};

/// Whether a time window is iterated until convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CouplingMode {
    /// One exchange per window, no repetition.
    #[default]
    Explicit,
    /// Windows are repeated until the convergence measures are satisfied.
    Implicit,
}

/// How the time window size is agreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeWindowSizeMethod {
    /// Both participants use the configured size.
    #[default]
    Fixed,
    /// The first participant's realized step becomes the window size.
    FirstParticipantSets,
}

/// The two coupled participants, in protocol order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPair {
    pub first: String,
    pub second: String,
}

impl ParticipantPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl Default for ParticipantPair {
    fn default() -> Self {
        Self::new("Fluid", "Solid")
    }
}

/// Scheme configuration.
///
/// A JSON document can describe it:
///
/// ```json
/// { "time_window_size": 0.1, "max_time_windows": 10, "mode": "implicit",
///   "max_iterations": 50, "local_participant": "Solid" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeConfig {
    /// End of the simulated time interval.
    pub max_time: Option<f64>,
    /// Number of windows to simulate.
    pub max_time_windows: Option<u32>,
    /// Size of each window, `None` if it is negotiated.
    pub time_window_size: Option<f64>,
    /// Digits compared when checking times, `eps = 10^-valid_digits`.
    pub valid_digits: u32,
    /// Name of the participant owning this scheme.
    pub local_participant: String,
    /// Upper bound on iterations per window (implicit only).
    pub max_iterations: Option<u32>,
    pub mode: CouplingMode,
    pub window_size_method: TimeWindowSizeMethod,
    /// Predictor order for the next window (implicit only).
    pub extrapolation_order: Option<u32>,
    /// Whether this rank logs residuals and writes diagnostics.
    pub primary: bool,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            max_time: None,
            max_time_windows: None,
            time_window_size: None,
            valid_digits: 10,
            local_participant: String::new(),
            max_iterations: None,
            mode: CouplingMode::Explicit,
            window_size_method: TimeWindowSizeMethod::Fixed,
            extrapolation_order: None,
            primary: true,
        }
    }
}

impl SchemeConfig {
    /// Start an explicit configuration for `local_participant`.
    pub fn explicit(local_participant: impl Into<String>) -> Self {
        Self {
            local_participant: local_participant.into(),
            ..Self::default()
        }
    }

    /// Start an implicit configuration for `local_participant`.
    pub fn implicit(local_participant: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            local_participant: local_participant.into(),
            mode: CouplingMode::Implicit,
            max_iterations: Some(max_iterations),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_time(mut self, max_time: f64) -> Self {
        self.max_time = Some(max_time);
        self
    }

    #[must_use]
    pub fn with_max_time_windows(mut self, windows: u32) -> Self {
        self.max_time_windows = Some(windows);
        self
    }

    #[must_use]
    pub fn with_time_window_size(mut self, size: f64) -> Self {
        self.time_window_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_valid_digits(mut self, digits: u32) -> Self {
        self.valid_digits = digits;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    #[must_use]
    pub fn with_window_size_method(mut self, method: TimeWindowSizeMethod) -> Self {
        self.window_size_method = method;
        self
    }

    #[must_use]
    pub fn with_extrapolation_order(mut self, order: u32) -> Self {
        self.extrapolation_order = Some(order);
        self
    }

    #[must_use]
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// Comparison tolerance derived from `valid_digits`.
    pub fn eps(&self) -> f64 {
        10f64.powi(-(self.valid_digits as i32))
    }

    /// Predictor order used for exchanged data.
    ///
    /// Explicit coupling never predicts. Implicit coupling without an
    /// explicit order carries the last value forward.
    pub fn effective_extrapolation_order(&self) -> Option<usize> {
        match self.mode {
            CouplingMode::Explicit => None,
            CouplingMode::Implicit => Some(self.extrapolation_order.unwrap_or(0) as usize),
        }
    }

    /// Reject contradicting or out-of-range parameters.
    pub fn validate(&self) -> Result<()> {
        if self.local_participant.is_empty() {
            return Err(Error::InvalidConfig(
                "the local participant must be named".into(),
            ));
        }
        if !(1..=16).contains(&self.valid_digits) {
            return Err(Error::InvalidConfig(format!(
                "valid digits must be between 1 and 16, got {}",
                self.valid_digits
            )));
        }
        if let Some(max_time) = self.max_time {
            if max_time.is_nan() || max_time <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "maximum time must be positive, got {max_time}"
                )));
            }
        }
        if self.max_time_windows == Some(0) {
            return Err(Error::InvalidConfig(
                "maximum number of time windows must be positive".into(),
            ));
        }
        match (self.window_size_method, self.time_window_size) {
            (TimeWindowSizeMethod::Fixed, None) => {
                return Err(Error::InvalidConfig(
                    "a fixed time window size has to be configured".into(),
                ));
            }
            (TimeWindowSizeMethod::Fixed, Some(size)) if size.is_nan() || size <= 0.0 => {
                return Err(Error::InvalidConfig(format!(
                    "time window size must be positive, got {size}"
                )));
            }
            (TimeWindowSizeMethod::FirstParticipantSets, Some(size)) => {
                return Err(Error::InvalidConfig(format!(
                    "time window size {size} cannot be configured when the first participant sets it"
                )));
            }
            _ => {}
        }
        match self.mode {
            CouplingMode::Explicit => {
                if self.max_iterations.is_some() {
                    return Err(Error::InvalidConfig(
                        "maximum iterations are only defined for implicit coupling".into(),
                    ));
                }
                if self.extrapolation_order.is_some() {
                    return Err(Error::InvalidConfig(
                        "extrapolation is only defined for implicit coupling".into(),
                    ));
                }
            }
            CouplingMode::Implicit => {
                match self.max_iterations {
                    None => {
                        return Err(Error::InvalidConfig(
                            "implicit coupling needs a maximum number of iterations".into(),
                        ))
                    }
                    Some(0) => {
                        return Err(Error::InvalidConfig(
                            "maximum iterations must be at least 1".into(),
                        ))
                    }
                    Some(_) => {}
                }
                if let Some(order) = self.extrapolation_order {
                    if order as usize > MAX_EXTRAPOLATION_ORDER {
                        return Err(Error::InvalidConfig(format!(
                            "extrapolation order {order} is not supported, use 0 or 1"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
