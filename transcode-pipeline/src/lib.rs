//! Transcode session orchestration.
//!
//! Connects a demuxer, per-stream decoders, optional frame transforms,
//! encoders and muxers into a [`TranscodeSession`]:
//!
//! - [`StreamMap`] routes each input stream to the output streams it feeds
//! - [`TimestampSynchronizer`] keeps input timestamps on one continuous
//!   timeline, correcting discontinuities
//! - [`TranscodePipeline`] decodes one input stream and encodes every picture
//!   for each of its output streams
//! - [`OutputContainer`] owns a muxer and its encoded streams

mod config;
mod error;
mod output;
mod pipeline;
mod session;
mod stream_map;
mod sync;
mod transform;

pub use config::{MuxSettings, SessionConfig, StreamErrorPolicy, SyncConfig};
pub use error::{FailedStream, PipelineError, Result};
pub use output::{OutputContainer, OutputStream};
pub use pipeline::{StepReport, TranscodePipeline};
pub use session::{SessionBuilder, SessionState, StreamFailure, TranscodeSession, TranscodeStats};
pub use stream_map::{ContainerId, OutputTarget, StreamMap};
pub use sync::{SyncOutcome, TimestampOffset, TimestampSynchronizer};
pub use transform::{PassThrough, ScaleTransform, ScaleTransformFactory, Transform, TransformFactory};

pub use transcode_codecs::EncoderConfig;
