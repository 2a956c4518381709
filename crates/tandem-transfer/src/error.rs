//! Error types for tandem-transfer.

use thiserror::Error;

use crate::types::{FrameKind, StreamId};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors reported by a transport.
///
/// There is no retry at this layer: every error aborts the coupled run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The peer endpoint is gone.
    #[error("transport is disconnected from its peer")]
    Disconnected,

    /// The peer sent a different kind of message than expected.
    #[error("expected {expected}, received {received}")]
    UnexpectedFrame {
        expected: FrameKind,
        received: FrameKind,
    },

    /// A value buffer did not match the receiving buffer.
    #[error("buffer on {stream} holds {expected} values of {components} components, received {received}")]
    LengthMismatch {
        stream: StreamId,
        components: usize,
        expected: usize,
        received: usize,
    },

    /// Both sides disagree on the number of components per element.
    #[error("buffer on {stream} expected {expected} components per element, received {received}")]
    ComponentMismatch {
        stream: StreamId,
        expected: usize,
        received: usize,
    },
}
