//! # Transcode Core
//!
//! Core types shared by the transcode crates.
//!
//! This crate provides:
//! - Error handling types
//! - Exact rational time arithmetic and timestamps
//! - Packet and frame buffer abstractions
//! - Per-stream timing state

pub mod error;
pub mod frame;
pub mod packet;
pub mod rational;
pub mod stream;
pub mod timestamp;

pub use error::{CodecError, ContainerError, Error, Result};
pub use frame::{Frame, FrameBuffer, FrameFlags, PixelFormat, VideoFormat};
pub use packet::{Packet, PacketFlags};
pub use rational::{rescale, Rational};
pub use stream::{CodecId, CodecParameters, MediaKind, MediaStream, StreamState};
pub use timestamp::{
    checked_shift, Duration, TimeBase, Timestamp, GLOBAL_TIME_BASE, NO_TIMESTAMP,
};
