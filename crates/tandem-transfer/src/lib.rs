//! Tandem Transfer - message transport between two coupled participants
//!
//! This crate provides:
//! - The [`Transport`] contract the coupling scheme sends through
//! - Typed wire frames for value buffers, votes and scalars
//! - [`ChannelTransport`], an in-process endpoint pair for tests and demos
//!
//! # Design Philosophy
//!
//! Coupling is fail-stop: participants are assumed to be cooperative and
//! correctly configured. The transport therefore offers no retries and no
//! timeouts. A malformed or missing message is reported once and ends the
//! run.
//!
//! # Example
//!
//! ```rust
//! use tandem_transfer::{ChannelTransport, StreamId, Transport};
//!
//! let (mut first, mut second) = ChannelTransport::pair();
//! first.send_values(&[1.0, 2.0], StreamId(0), 1).unwrap();
//!
//! let mut buffer = [0.0; 2];
//! second.receive_values(&mut buffer, StreamId(0), 1).unwrap();
//! assert_eq!(buffer, [1.0, 2.0]);
//! ```

pub mod error;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use error::{Result, TransportError};
pub use transport::{ChannelTransport, Transport};
pub use types::{Frame, FrameKind, StreamId};
