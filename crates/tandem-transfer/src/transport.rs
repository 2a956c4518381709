//! Transport contract and an in-process channel transport
//!
//! The coupling core never owns a connection. It only needs a blocking,
//! ordered, reliable pipe to exactly one peer:
//! - Value buffers tagged with a stream and a component count
//! - Booleans for convergence votes
//! - Scalars for negotiated time window sizes

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::types::{Frame, FrameKind, StreamId};

/// Blocking, ordered message pipe to the coupling partner.
///
/// Every call blocks until the operation completes. Errors propagate to the
/// caller unchanged.
pub trait Transport: Send {
    /// Check if the peer is still reachable.
    fn is_connected(&self) -> bool;

    /// Send a value buffer on `stream`.
    fn send_values(&mut self, values: &[f64], stream: StreamId, components: usize) -> Result<()>;

    /// Receive a value buffer on `stream` into `values`.
    fn receive_values(
        &mut self,
        values: &mut [f64],
        stream: StreamId,
        components: usize,
    ) -> Result<()>;

    /// Send a boolean.
    fn send_flag(&mut self, flag: bool) -> Result<()>;

    /// Receive a boolean.
    fn receive_flag(&mut self) -> Result<bool>;

    /// Send a scalar.
    fn send_scalar(&mut self, value: f64) -> Result<()>;

    /// Receive a scalar.
    fn receive_scalar(&mut self) -> Result<f64>;
}

/// One endpoint of an in-process, unbounded channel pair.
///
/// Sends never block. Receives block the calling thread, so an endpoint
/// must not be driven from inside an async runtime.
#[derive(Debug)]
pub struct ChannelTransport {
    label: String,
    outgoing: mpsc::UnboundedSender<Frame>,
    incoming: mpsc::UnboundedReceiver<Frame>,
}

impl ChannelTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        Self::labelled("left", "right")
    }

    /// Create two connected endpoints with labels used in logs.
    pub fn labelled(left: impl Into<String>, right: impl Into<String>) -> (Self, Self) {
        let (to_right, from_left) = mpsc::unbounded_channel();
        let (to_left, from_right) = mpsc::unbounded_channel();

        let left = Self {
            label: left.into(),
            outgoing: to_right,
            incoming: from_right,
        };
        let right = Self {
            label: right.into(),
            outgoing: to_left,
            incoming: from_left,
        };
        (left, right)
    }

    /// Label of this endpoint.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn send_frame(&mut self, frame: Frame) -> Result<()> {
        let kind = frame.kind();
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Disconnected)?;
        trace!(endpoint = %self.label, frame = %kind, "Sent frame");
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Frame> {
        let frame = self
            .incoming
            .blocking_recv()
            .ok_or(TransportError::Disconnected)?;
        trace!(endpoint = %self.label, frame = %frame.kind(), "Received frame");
        Ok(frame)
    }
}

impl Transport for ChannelTransport {
    fn is_connected(&self) -> bool {
        !self.outgoing.is_closed()
    }

    fn send_values(&mut self, values: &[f64], stream: StreamId, components: usize) -> Result<()> {
        self.send_frame(Frame::Values {
            stream,
            components,
            values: values.to_vec(),
        })
    }

    fn receive_values(
        &mut self,
        values: &mut [f64],
        stream: StreamId,
        components: usize,
    ) -> Result<()> {
        match self.receive_frame()? {
            Frame::Values {
                stream: received_stream,
                components: received_components,
                values: received,
            } => {
                if received_stream != stream {
                    return Err(TransportError::UnexpectedFrame {
                        expected: FrameKind::Values(stream),
                        received: FrameKind::Values(received_stream),
                    });
                }
                if received_components != components {
                    return Err(TransportError::ComponentMismatch {
                        stream,
                        expected: components,
                        received: received_components,
                    });
                }
                if received.len() != values.len() {
                    return Err(TransportError::LengthMismatch {
                        stream,
                        components,
                        expected: values.len(),
                        received: received.len(),
                    });
                }
                values.copy_from_slice(&received);
                Ok(())
            }
            other => Err(TransportError::UnexpectedFrame {
                expected: FrameKind::Values(stream),
                received: other.kind(),
            }),
        }
    }

    fn send_flag(&mut self, flag: bool) -> Result<()> {
        self.send_frame(Frame::Flag(flag))
    }

    fn receive_flag(&mut self) -> Result<bool> {
        match self.receive_frame()? {
            Frame::Flag(flag) => Ok(flag),
            other => Err(TransportError::UnexpectedFrame {
                expected: FrameKind::Flag,
                received: other.kind(),
            }),
        }
    }

    fn send_scalar(&mut self, value: f64) -> Result<()> {
        self.send_frame(Frame::Scalar(value))
    }

    fn receive_scalar(&mut self) -> Result<f64> {
        match self.receive_frame()? {
            Frame::Scalar(value) => Ok(value),
            other => Err(TransportError::UnexpectedFrame {
                expected: FrameKind::Scalar,
                received: other.kind(),
            }),
        }
    }
}
