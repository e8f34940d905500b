//! Pipeline error types.

use crate::stream_map::ContainerId;
use std::fmt;
use thiserror::Error;
use transcode_core::error::Error as CoreError;

/// Pipeline error type.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// An input, output, decoder or encoder could not be opened.
    #[error("Cannot open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: CoreError,
    },

    /// A buffer or frame could not be allocated.
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// The session has nothing to transcode.
    #[error("No input stream is mapped to an output")]
    EmptyMapping,

    /// An output stream was mapped twice.
    #[error("Stream {stream} of {container} is already mapped from input stream {input}")]
    DuplicateTarget {
        input: usize,
        container: ContainerId,
        stream: usize,
    },

    /// A container header could not be written.
    #[error("Header write failed for {container}: {source}")]
    Header {
        container: ContainerId,
        #[source]
        source: CoreError,
    },

    /// A packet could not be written.
    #[error("Write failed for stream {stream_index} of {container} at packet {packet}: {source}")]
    Write {
        container: ContainerId,
        stream_index: usize,
        packet: u64,
        #[source]
        source: CoreError,
    },

    /// A container trailer could not be written.
    #[error("Trailer write failed for {container}: {source}")]
    Trailer {
        container: ContainerId,
        #[source]
        source: CoreError,
    },

    /// The decoder rejected a payload or stopped making progress.
    #[error("Decode failed for input stream {stream_index} at packet {packet}: {reason}")]
    DecodeFailure {
        stream_index: usize,
        packet: u64,
        reason: String,
    },

    /// A packet has no presentation timestamp after synchronization.
    #[error("Packet {packet} of input stream {stream_index} has no presentation timestamp")]
    MissingTimestamp { stream_index: usize, packet: u64 },

    /// Transforming or encoding a frame for one output stream failed.
    #[error("Encode failed for stream {stream_index} of {container}: {reason}")]
    EncodeFailure {
        container: ContainerId,
        stream_index: usize,
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not allowed in the current session state.
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Stream not found.
    #[error("Stream {0} not found")]
    StreamNotFound(usize),

    /// No decoder for stream.
    #[error("No decoder for input stream {0}")]
    NoDecoder(usize),
}

/// A stream stopped by a contained failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStream {
    Input(usize),
    Output(ContainerId, usize),
}

impl fmt::Display for FailedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(index) => write!(f, "input stream {}", index),
            Self::Output(container, index) => write!(f, "stream {} of {}", index, container),
        }
    }
}

impl PipelineError {
    /// The stream a failure is confined to.
    ///
    /// `None` for failures that end the session.
    pub fn failed_stream(&self) -> Option<FailedStream> {
        match self {
            PipelineError::DecodeFailure { stream_index, .. }
            | PipelineError::MissingTimestamp { stream_index, .. } => {
                Some(FailedStream::Input(*stream_index))
            }
            PipelineError::EncodeFailure {
                container,
                stream_index,
                ..
            } => Some(FailedStream::Output(*container, *stream_index)),
            _ => None,
        }
    }
}

/// Pipeline result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
