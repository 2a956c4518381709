//! Error types for tandem-scheme.

use tandem_data::{DataError, DataId};
use tandem_transfer::TransportError;
use thiserror::Error;

use crate::action::Action;

/// Result type for tandem-scheme operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a coupling scheme.
///
/// Every error returned from a lifecycle call is fatal: the scheme moves to
/// its aborted state and rejects further calls.
#[derive(Debug, Error)]
pub enum Error {
    /// The construction parameters contradict each other.
    #[error("invalid coupling configuration: {0}")]
    InvalidConfig(String),

    /// The local participant is neither of the two coupled participants.
    #[error("name of local participant \"{local}\" does not match any participant of the coupling scheme (\"{first}\", \"{second}\")")]
    UnknownParticipant {
        local: String,
        first: String,
        second: String,
    },

    /// A participant was coupled with itself.
    #[error("first and second participant must have different names, both are \"{0}\"")]
    SameParticipants(String),

    /// The same datum was registered twice for one direction.
    #[error("data \"{data}\" cannot be added twice for {direction}, remove the duplicate exchange entry")]
    DuplicateExchange {
        data: String,
        direction: &'static str,
    },

    /// No datum with this id is registered.
    #[error("no data with id {0} is registered with the coupling scheme")]
    UnknownData(DataId),

    /// A call arrived in a state that does not allow it.
    #[error("invalid coupling scheme state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// The adapter left required actions unfulfilled.
    #[error("the required actions {} are not fulfilled, did you forget to read or write a checkpoint or to write initial data?", format_actions(.0))]
    UnfulfilledActions(Vec<Action>),

    /// Implicit coupling needs something to decide convergence with.
    #[error("at least one convergence measure has to be defined for an implicit coupling scheme")]
    MissingConvergenceMeasure,

    /// A strict measure ran out of iterations.
    #[error("the strict convergence measure for data \"{data}\" did not converge within the maximum of {max_iterations} iterations, which terminates the simulation; to avoid this forced termination do not mark the measure as strict")]
    StrictConvergenceFailed { data: String, max_iterations: u32 },

    /// The solver stepped past the end of the time window.
    #[error("the time step size {requested} exceeds the maximum allowed time step size {allowed} in the remainder of this time window, did you restrict your time step size with dt = min(coupling_dt, solver_dt)?")]
    TimeStepTooLarge { requested: f64, allowed: f64 },

    /// Time steps must be strictly positive.
    #[error("advance() cannot be called with a time step size of {0}")]
    InvalidTimeStep(f64),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A data buffer was misused.
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// A previous fatal error ended this scheme.
    #[error("coupling scheme has been aborted")]
    Aborted,
}

fn format_actions(actions: &[Action]) -> String {
    actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
