//! Core types for the Tandem transfer layer

use serde::{Deserialize, Serialize};

/// Logical stream a value buffer travels on.
///
/// Mesh data uses the id of its mesh; mesh-less data shares one global stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl StreamId {
    /// Stream carrying global (mesh-less) data.
    pub const GLOBAL: StreamId = StreamId(u32::MAX);

    /// Check if this is the global stream.
    pub const fn is_global(self) -> bool {
        self.0 == u32::MAX
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_global() {
            write!(f, "global")
        } else {
            write!(f, "mesh-{}", self.0)
        }
    }
}

/// One message exchanged between two participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// A value buffer
    Values {
        /// Stream the buffer belongs to
        stream: StreamId,
        /// Components per element
        components: usize,
        /// Flat buffer, element-major
        values: Vec<f64>,
    },
    /// A boolean (convergence vote)
    Flag(bool),
    /// A scalar (negotiated time window size)
    Scalar(f64),
}

impl Frame {
    /// Classify the frame without its payload.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Values { stream, .. } => FrameKind::Values(*stream),
            Frame::Flag(_) => FrameKind::Flag,
            Frame::Scalar(_) => FrameKind::Scalar,
        }
    }
}

/// Frame classification used in errors and logs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    Values(StreamId),
    Flag,
    Scalar,
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameKind::Values(stream) => write!(f, "values on {stream}"),
            FrameKind::Flag => write!(f, "flag"),
            FrameKind::Scalar => write!(f, "scalar"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind() {
        let frame = Frame::Values {
            stream: StreamId(4),
            components: 2,
            values: vec![1.0, 2.0],
        };
        assert_eq!(frame.kind(), FrameKind::Values(StreamId(4)));
        assert_eq!(Frame::Flag(true).kind(), FrameKind::Flag);
        assert_eq!(Frame::Scalar(0.5).kind(), FrameKind::Scalar);
    }

    #[test]
    fn test_stream_display() {
        assert_eq!(StreamId(3).to_string(), "mesh-3");
        assert_eq!(StreamId::GLOBAL.to_string(), "global");
        assert!(StreamId::GLOBAL.is_global());
    }

    #[test]
    fn test_frame_wire_format_is_stable() {
        let frame = Frame::Scalar(0.05);
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"Scalar":0.05}"#);
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }
}
