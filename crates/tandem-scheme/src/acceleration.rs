//! Acceleration contract and constant under-relaxation.
//!
//! An acceleration improves the iterate of a window that has not converged.
//! How it does that is up to the implementation; the scheme only decides
//! when to call it and on which data.

use tandem_data::{DataArena, DataIndex, ExchangeDatum};

use crate::error::{Error, Result};

/// The data an acceleration may read and rewrite.
pub struct AccelerationData<'a> {
    arena: &'a mut DataArena,
    members: &'a [DataIndex],
}

impl<'a> AccelerationData<'a> {
    pub fn new(arena: &'a mut DataArena, members: &'a [DataIndex]) -> Self {
        Self { arena, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member data, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ExchangeDatum> + '_ {
        self.members.iter().map(|index| &self.arena[*index])
    }

    /// Mutable member data, in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExchangeDatum> + '_ {
        self.arena.select_mut(self.members)
    }

    /// Shift every member to the next window.
    pub fn move_to_next_window(&mut self) {
        self.iter_mut().for_each(ExchangeDatum::move_to_next_window);
    }
}

/// Column counts of a least-squares based acceleration, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelerationDiagnostics {
    pub active_columns: usize,
    pub deleted_columns: usize,
    pub dropped_columns: usize,
}

/// Post-processing of non-converged iterates.
pub trait Acceleration: Send {
    /// Reserve history for `data`. Called once during `initialize`.
    fn initialize(&mut self, data: &AccelerationData<'_>) -> Result<()>;

    /// Rewrite the current values of `data` for the next iteration.
    fn perform_acceleration(&mut self, data: &mut AccelerationData<'_>) -> Result<()>;

    /// The window converged with the current values of `data`.
    fn iterations_converged(&mut self, data: &AccelerationData<'_>);

    fn diagnostics(&self) -> AccelerationDiagnostics {
        AccelerationDiagnostics::default()
    }
}

/// Blend each iterate with the previous one: `x ← ω·x + (1−ω)·x_prev`.
#[derive(Debug, Clone)]
pub struct ConstantRelaxation {
    omega: f64,
}

impl ConstantRelaxation {
    /// Create a relaxation with factor `omega` in `(0, 1]`.
    pub fn new(omega: f64) -> Result<Self> {
        if omega.is_nan() || omega <= 0.0 || omega > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "relaxation factor must be in (0, 1], got {omega}"
            )));
        }
        Ok(Self { omega })
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }
}

impl Acceleration for ConstantRelaxation {
    fn initialize(&mut self, data: &AccelerationData<'_>) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidConfig(
                "constant relaxation needs at least one datum to relax".into(),
            ));
        }
        Ok(())
    }

    fn perform_acceleration(&mut self, data: &mut AccelerationData<'_>) -> Result<()> {
        let omega = self.omega;
        for datum in data.iter_mut() {
            let previous = datum.previous_iteration().to_vec();
            for (value, old) in datum.values_mut().iter_mut().zip(previous) {
                *value = omega * *value + (1.0 - omega) * old;
            }
        }
        Ok(())
    }

    fn iterations_converged(&mut self, _data: &AccelerationData<'_>) {}
}
