//! Tandem Exchange Data
//!
//! Records for the quantities two coupled participants exchange at every
//! synchronization point.
//!
//! # Versions of a value
//!
//! Every [`ExchangeDatum`] keeps three versions of its buffer:
//!
//! - **current values**: what the solver wrote or the peer sent
//! - **previous iteration**: the values at the start of the current
//!   coupling iteration, used by convergence measures and acceleration
//! - **window history**: converged values of past windows, used to predict
//!   the first iterate of a new window ([`Extrapolation`])
//!
//! # Arena
//!
//! A coupling scheme owns all of its data in one [`DataArena`]. Exchange
//! maps and convergence measures refer to records by dense [`DataIndex`],
//! so there is exactly one owner of every buffer.

mod arena;
mod datum;
mod error;
mod extrapolation;

pub use arena::{DataArena, DataIndex};
pub use datum::{DataId, DatumKind, DatumSpec, ExchangeDatum, MeshId};
pub use error::{DataError, Result};
pub use extrapolation::{Extrapolation, MAX_EXTRAPOLATION_ORDER};
