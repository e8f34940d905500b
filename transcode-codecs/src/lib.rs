//! # Transcode Codecs
//!
//! Codec capability traits for the transcode orchestrator.
//!
//! Codec implementations live outside this workspace. The pipeline drives
//! them through two traits:
//!
//! - [`VideoDecoder`] - decodes packet payloads into a reusable [`Frame`](transcode_core::Frame)
//! - [`VideoEncoder`] - encodes frames into a reusable byte buffer
//!
//! [`EncoderConfig`] describes one output stream and is resolved against the
//! decoded input layout before the encoder is opened.

pub mod config;
pub mod traits;

pub use config::EncoderConfig;
pub use traits::{CodedFrame, DecodeStatus, PictureType, VideoDecoder, VideoEncoder};
