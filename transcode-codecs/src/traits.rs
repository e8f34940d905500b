//! Common codec traits.
//!
//! This module defines the capability traits the transcoder drives:
//!
//! - [`VideoDecoder`] - turns packet payloads into pictures
//! - [`VideoEncoder`] - turns pictures into coded bytes
//!
//! # Buffer Reuse
//!
//! Both traits write into caller-owned buffers. The decoder fills a [`Frame`]
//! that the caller keeps across packets and the encoder appends into a byte
//! vector the caller reuses, so the hot transcoding loop does not allocate
//! per packet.
//!
//! ```ignore
//! let mut frame = Frame::with_format(decoder.output_format(), decoder.time_base());
//! let mut offset = 0;
//! while offset < payload.len() {
//!     let status = decoder.decode(&mut frame, &payload[offset..])?;
//!     offset += status.bytes_consumed;
//!     if status.picture_produced {
//!         encoder.encode(Some(&frame), &mut out)?;
//!     }
//! }
//! ```

use crate::config::EncoderConfig;
use std::fmt;
use transcode_core::{CodecParameters, Frame, Result, TimeBase, VideoFormat, NO_TIMESTAMP};

/// Outcome of one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeStatus {
    /// A complete picture was written into the frame.
    pub picture_produced: bool,
    /// Payload bytes consumed by this call.
    pub bytes_consumed: usize,
    /// Duration of the produced picture in decoder ticks.
    pub duration: i64,
}

impl DecodeStatus {
    /// A call that produced a picture.
    pub fn picture(bytes_consumed: usize, duration: i64) -> Self {
        Self {
            picture_produced: true,
            bytes_consumed,
            duration,
        }
    }

    /// A call that consumed input without completing a picture.
    pub fn consumed(bytes_consumed: usize) -> Self {
        Self {
            picture_produced: false,
            bytes_consumed,
            duration: 0,
        }
    }
}

/// Picture coding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// Intra picture.
    I,
    /// Forward predicted picture.
    #[default]
    P,
    /// Bidirectionally predicted picture.
    B,
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I => write!(f, "I"),
            Self::P => write!(f, "P"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Properties of the picture the encoder most recently emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedFrame {
    /// Presentation time in encoder ticks, or `NO_TIMESTAMP`.
    pub pts: i64,
    pub key_frame: bool,
    pub picture_type: PictureType,
}

impl CodedFrame {
    /// A coded picture with a known presentation time.
    pub fn new(pts: i64, picture_type: PictureType) -> Self {
        Self {
            pts,
            key_frame: picture_type == PictureType::I,
            picture_type,
        }
    }

    /// A coded picture whose presentation time the encoder does not report.
    pub fn untimed(picture_type: PictureType) -> Self {
        Self::new(NO_TIMESTAMP, picture_type)
    }

    pub fn has_pts(&self) -> bool {
        self.pts != NO_TIMESTAMP
    }
}

/// Common trait for video decoders.
pub trait VideoDecoder: Send {
    /// Prepare the decoder for a stream with the given parameters.
    fn open(&mut self, params: &CodecParameters) -> Result<()>;

    /// Tick base of [`DecodeStatus::duration`].
    fn time_base(&self) -> TimeBase;

    /// Layout of the pictures this decoder produces. Valid after `open`.
    fn output_format(&self) -> VideoFormat;

    /// Decode from the start of `data` into `frame`.
    ///
    /// An empty `data` asks the decoder to emit a delayed picture, if any.
    fn decode(&mut self, frame: &mut Frame, data: &[u8]) -> Result<DecodeStatus>;
}

/// Common trait for video encoders.
pub trait VideoEncoder: Send {
    /// Prepare the encoder with a resolved configuration.
    fn open(&mut self, config: &EncoderConfig) -> Result<()>;

    /// Tick base of frame and coded-frame timestamps.
    fn time_base(&self) -> TimeBase;

    /// Encode `frame`, or drain a delayed picture when `frame` is `None`.
    ///
    /// Coded bytes are appended to `out`; returns how many were written.
    /// Zero means the encoder is buffering (or, when draining, is empty).
    fn encode(&mut self, frame: Option<&Frame>, out: &mut Vec<u8>) -> Result<usize>;

    /// Properties of the last picture emitted by `encode`.
    fn coded_frame(&self) -> Option<CodedFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_frame_key_from_type() {
        assert!(CodedFrame::new(0, PictureType::I).key_frame);
        assert!(!CodedFrame::new(0, PictureType::B).key_frame);
        assert!(!CodedFrame::untimed(PictureType::P).has_pts());
    }

    #[test]
    fn test_decode_status_constructors() {
        let s = DecodeStatus::picture(10, 1);
        assert!(s.picture_produced);
        assert_eq!(s.bytes_consumed, 10);
        let s = DecodeStatus::consumed(4);
        assert!(!s.picture_produced);
        assert_eq!(s.duration, 0);
    }
}
