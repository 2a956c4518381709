//! Shared harness for the two-participant scenarios in `tests/`.
//!
//! [`drive`] plays the part of a solver adapter: it handles the checkpoint
//! handshake, clamps its step to the window, and feeds received values
//! through a step function.

use tandem_data::DataId;
use tandem_scheme::{Action, CouplingScheme, Result};

/// What a participant saw during a run.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub completed_windows: u32,
    pub repetitions: u32,
    pub time: f64,
    /// Received values at the end of each completed window.
    pub received: Vec<Vec<f64>>,
}

/// Run `scheme` from `initialize` through `finalize`.
///
/// `step(time, received)` returns the values to send for the step ending at
/// `time`.
pub fn drive(
    scheme: &mut CouplingScheme,
    solver_dt: f64,
    send: DataId,
    receive: DataId,
    mut step: impl FnMut(f64, &[f64]) -> Vec<f64>,
) -> Result<Outcome> {
    scheme.initialize(0.0, 1)?;
    let mut outcome = Outcome::default();
    let mut solver_time = 0.0;
    let mut checkpoint = 0.0;

    while scheme.is_coupling_ongoing() {
        if scheme.is_action_required(Action::WriteCheckpoint)
            && !scheme.is_action_fulfilled(Action::WriteCheckpoint)
        {
            checkpoint = solver_time;
            scheme.mark_action_fulfilled(Action::WriteCheckpoint)?;
        }

        let dt = solver_dt.min(scheme.next_time_step_max_size());
        let values = step(solver_time + dt, scheme.data(receive)?.values());
        scheme.write_values(send, &values)?;
        scheme.advance(dt)?;
        solver_time += dt;

        if scheme.is_action_required(Action::ReadCheckpoint) {
            solver_time = checkpoint;
            outcome.repetitions += 1;
            scheme.mark_action_fulfilled(Action::ReadCheckpoint)?;
        } else if scheme.is_time_window_complete() {
            outcome.completed_windows += 1;
            outcome.received.push(scheme.data(receive)?.values().to_vec());
        }
    }

    scheme.finalize()?;
    outcome.time = scheme.time();
    Ok(outcome)
}
