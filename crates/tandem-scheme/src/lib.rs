//! Tandem Scheme - coupling two simulation participants in time
//!
//! This crate provides:
//! - [`CouplingScheme`], the time-window and iteration state machine
//! - The serial exchange protocol between a first and a second participant
//! - Convergence measures and the rules combining them
//! - The checkpoint handshake with the solver adapter
//! - Constant under-relaxation and the [`Acceleration`] contract
//! - Per-window diagnostics sinks
//!
//! # Implicit coupling
//!
//! With implicit coupling every window is repeated until the second
//! participant's convergence measures agree. Before each repetition the
//! adapter restores its checkpoint:
//!
//! ```text
//! loop {
//!     if scheme.is_action_required(WriteCheckpoint) { save; fulfil }
//!     solve(dt)
//!     scheme.advance(dt)?
//!     if scheme.is_action_required(ReadCheckpoint) { restore; fulfil }
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use tandem_scheme::{CouplingScheme, ParticipantPair, SchemeConfig};
//! use tandem_transfer::ChannelTransport;
//!
//! let (fluid_end, _solid_end) = ChannelTransport::pair();
//! let config = SchemeConfig::explicit("Fluid")
//!     .with_time_window_size(0.1)
//!     .with_max_time_windows(2);
//! let mut fluid = CouplingScheme::new(
//!     config,
//!     ParticipantPair::new("Fluid", "Solid"),
//!     Box::new(fluid_end),
//! )
//! .unwrap();
//!
//! fluid.initialize(0.0, 1).unwrap();
//! while fluid.is_coupling_ongoing() {
//!     fluid.advance(0.1).unwrap();
//! }
//! fluid.finalize().unwrap();
//! ```

pub mod acceleration;
pub mod action;
pub mod config;
pub mod convergence;
pub mod diagnostics;
pub mod error;
pub mod math;
pub mod scheme;
pub mod serial;
pub mod topology;

// Re-export main types at crate root
pub use acceleration::{Acceleration, AccelerationData, AccelerationDiagnostics, ConstantRelaxation};
pub use action::{Action, ActionState, Actions};
pub use config::{CouplingMode, ParticipantPair, SchemeConfig, TimeWindowSizeMethod};
pub use convergence::{
    AbsoluteConvergenceMeasure, ConvergenceEvaluator, ConvergenceMeasure,
    MinIterationConvergenceMeasure, RelativeConvergenceMeasure,
};
pub use diagnostics::{
    DiagnosticsLine, DiagnosticsSink, IterationRecord, JsonLinesSink, MemorySink, NullSink,
    WindowRecord,
};
pub use error::{Error, Result};
pub use scheme::{CouplingScheme, Lifecycle};
pub use serial::{SerialExchange, Topology};
pub use topology::{BiTopology, Exchange, Role};
