//! Error types shared by the transcode crates.

use crate::rational::Rational;
use thiserror::Error;

/// Main error type for the core and collaborator traits.
#[derive(Error, Debug)]
pub enum Error {
    /// Container errors (demuxing/muxing).
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Codec errors (encoding/decoding).
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unsupported feature or format.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A collaborator ran out of memory, buffers or handles.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A rescaled timestamp does not fit in 64 bits.
    #[error("Timestamp overflow rescaling {value} from {from} to {to}")]
    Overflow {
        value: i64,
        from: Rational,
        to: Rational,
    },

    /// Shifting a timestamp would leave the representable range.
    #[error("Timestamp {value} shifted by {delta} is out of range")]
    OutOfRange { value: i64, delta: i64 },

    /// A lifecycle transition that would move backwards or stay put.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },

    /// End of stream reached.
    #[error("End of stream")]
    EndOfStream,
}

/// Container errors.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The input or output could not be opened.
    #[error("Cannot open {path}: {reason}")]
    Open { path: String, reason: String },

    /// The container header could not be written.
    #[error("Header write failed: {0}")]
    Header(String),

    /// A packet could not be written.
    #[error("Packet write failed: {0}")]
    Write(String),

    /// The container trailer could not be written.
    #[error("Trailer write failed: {0}")]
    Trailer(String),

    /// Stream not found in container.
    #[error("Stream {index} not found")]
    StreamNotFound { index: usize },

    /// Generic container error message.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for ContainerError {
    fn from(s: &str) -> Self {
        ContainerError::Other(s.to_string())
    }
}

/// Codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Codec used before being opened.
    #[error("Codec not initialized")]
    NotInitialized,

    /// No implementation for the requested codec.
    #[error("Codec not found: {0}")]
    NotFound(String),

    /// Decoder configuration error.
    #[error("Decoder configuration error: {0}")]
    DecoderConfig(String),

    /// Encoder configuration error.
    #[error("Encoder configuration error: {0}")]
    EncoderConfig(String),

    /// Payload could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Frame could not be encoded.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Generic codec error message.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(s: &str) -> Self {
        CodecError::Other(s.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Check if this is an end-of-stream error.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidParameter("test parameter".into());
        assert_eq!(err.to_string(), "Invalid parameter: test parameter");
    }

    #[test]
    fn test_overflow_display() {
        let err = Error::Overflow {
            value: 7,
            from: Rational::new(1, 1),
            to: Rational::new(1, 90000),
        };
        assert_eq!(
            err.to_string(),
            "Timestamp overflow rescaling 7 from 1/1 to 1/90000"
        );
    }

    #[test]
    fn test_out_of_range_display() {
        let err = Error::OutOfRange {
            value: i64::MAX,
            delta: 1,
        };
        assert_eq!(
            err.to_string(),
            format!("Timestamp {} shifted by 1 is out of range", i64::MAX)
        );
    }

    #[test]
    fn test_container_error_conversion() {
        let err: Error = ContainerError::Header("disk full".into()).into();
        assert!(matches!(err, Error::Container(ContainerError::Header(_))));
    }

    #[test]
    fn test_is_eof() {
        assert!(Error::EndOfStream.is_eof());
        assert!(!Error::unsupported("x").is_eof());
    }
}
