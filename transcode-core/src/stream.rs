//! Media stream timing state.
//!
//! A [`MediaStream`] describes one elementary stream of an input or output
//! container together with the running timestamps the transcoder keeps for
//! it. All running timestamps except `sync_pts` are in
//! [`GLOBAL_TIME_BASE`](crate::timestamp::GLOBAL_TIME_BASE) units.

use crate::error::{Error, Result};
use crate::frame::{PixelFormat, VideoFormat};
use crate::timestamp::{checked_shift, TimeBase, GLOBAL_TIME_BASE, NO_TIMESTAMP};
use std::fmt;

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// Codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CodecId {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2.
    Mpeg4,
    /// VP9.
    Vp9,
    /// AV1.
    Av1,
    /// Uncompressed video.
    RawVideo,
}

impl CodecId {
    /// Get the FourCC code for this codec.
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::H264 => *b"avc1",
            Self::H265 => *b"hvc1",
            Self::Mpeg4 => *b"mp4v",
            Self::Vp9 => *b"vp09",
            Self::Av1 => *b"av01",
            Self::RawVideo => *b"raw ",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "H.264/AVC"),
            Self::H265 => write!(f, "H.265/HEVC"),
            Self::Mpeg4 => write!(f, "MPEG-4"),
            Self::Vp9 => write!(f, "VP9"),
            Self::Av1 => write!(f, "AV1"),
            Self::RawVideo => write!(f, "Raw"),
        }
    }
}

/// Codec parameters describing the coded content of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParameters {
    pub codec: CodecId,
    pub width: u32,
    pub height: u32,
    pub pixel_format: Option<PixelFormat>,
    /// Bits per second, 0 when unknown.
    pub bit_rate: u64,
    /// Out-of-band codec configuration.
    pub extradata: Vec<u8>,
}

impl CodecParameters {
    /// Parameters for a video stream of the given layout.
    pub fn video(codec: CodecId, format: VideoFormat) -> Self {
        Self {
            codec,
            width: format.width,
            height: format.height,
            pixel_format: Some(format.pixel_format),
            bit_rate: 0,
            extradata: Vec::new(),
        }
    }

    /// Picture layout, if fully known.
    pub fn video_format(&self) -> Option<VideoFormat> {
        self.pixel_format
            .map(|pf| VideoFormat::new(self.width, self.height, pf))
    }
}

/// Lifecycle of a stream. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamState {
    Created,
    Configured,
    Streaming,
    Draining,
    Closed,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One elementary stream and its running timing state.
#[derive(Debug, Clone)]
pub struct MediaStream {
    /// Index within the owning container.
    pub index: usize,
    pub kind: MediaKind,
    /// Time base of packet timestamps in the container.
    pub time_base: TimeBase,
    pub codec: CodecParameters,
    /// Tick base of the bound codec, used for frame durations.
    codec_time_base: TimeBase,
    /// Total duration in `time_base` ticks, 0 when unknown.
    pub duration: i64,
    /// Current presentation time, internal units.
    pub pts: i64,
    /// Predicted presentation time of the next frame, internal units.
    pub next_pts: i64,
    sync_pts: i64,
    state: StreamState,
}

impl MediaStream {
    /// Create a stream in the `Created` state with no known timing.
    pub fn new(index: usize, kind: MediaKind, time_base: TimeBase, codec: CodecParameters) -> Self {
        Self {
            index,
            kind,
            time_base,
            codec,
            codec_time_base: time_base,
            duration: 0,
            pts: 0,
            next_pts: NO_TIMESTAMP,
            sync_pts: 0,
            state: StreamState::Created,
        }
    }

    /// Set the total duration in stream ticks.
    #[must_use]
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    /// Tick base used by [`advance_next_pts`](Self::advance_next_pts).
    pub fn codec_time_base(&self) -> TimeBase {
        self.codec_time_base
    }

    /// Number of frames written for this stream so far.
    pub fn sync_pts(&self) -> i64 {
        self.sync_pts
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Bind the codec tick base and move to `Configured`.
    pub fn configure(&mut self, codec_time_base: TimeBase) -> Result<()> {
        self.transition(StreamState::Configured)?;
        self.codec_time_base = codec_time_base;
        Ok(())
    }

    /// Move forward to `next`. Skipping states is allowed; staying or going
    /// back is not.
    pub fn transition(&mut self, next: StreamState) -> Result<()> {
        if next <= self.state {
            return Err(Error::InvalidState {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Advance `next_pts` by a frame lasting `decoded_ticks` codec ticks.
    ///
    /// No-op while `next_pts` is unknown or the codec tick duration is zero.
    pub fn advance_next_pts(&mut self, decoded_ticks: i64) -> Result<()> {
        if self.codec_time_base.is_unknown() || self.next_pts == NO_TIMESTAMP {
            return Ok(());
        }
        let step = self.codec_time_base.convert(decoded_ticks, GLOBAL_TIME_BASE)?;
        self.next_pts = checked_shift(self.next_pts, step)?;
        Ok(())
    }

    /// Count one more written frame.
    pub fn bump_sync(&mut self) {
        self.sync_pts += 1;
    }

    /// Duration rescaled into `target`, 0 when unknown.
    pub fn duration_in(&self, target: TimeBase) -> Result<i64> {
        if self.duration == 0 {
            return Ok(0);
        }
        self.time_base.convert(self.duration, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(tb: TimeBase) -> MediaStream {
        let params = CodecParameters::video(
            CodecId::H264,
            VideoFormat::new(320, 240, PixelFormat::Yuv420p),
        );
        MediaStream::new(0, MediaKind::Video, tb, params)
    }

    #[test]
    fn test_new_stream_has_unknown_next_pts() {
        let s = stream(TimeBase::MPEG);
        assert_eq!(s.next_pts, NO_TIMESTAMP);
        assert_eq!(s.sync_pts(), 0);
        assert_eq!(s.state(), StreamState::Created);
        assert_eq!(s.codec_time_base(), TimeBase::MPEG);
    }

    #[test]
    fn test_advance_next_pts_uses_codec_base() {
        let mut s = stream(TimeBase::MPEG);
        s.configure(TimeBase::new(1, 25)).unwrap();
        s.next_pts = 1_000_000;
        s.advance_next_pts(1).unwrap();
        assert_eq!(s.next_pts, 1_040_000);
    }

    #[test]
    fn test_advance_skips_unknown_next_pts() {
        let mut s = stream(TimeBase::MPEG);
        s.advance_next_pts(3600).unwrap();
        assert_eq!(s.next_pts, NO_TIMESTAMP);
    }

    #[test]
    fn test_advance_skips_zero_tick_base() {
        let mut s = stream(TimeBase::MPEG);
        s.configure(TimeBase::new(0, 1)).unwrap();
        s.next_pts = 10;
        s.advance_next_pts(1).unwrap();
        assert_eq!(s.next_pts, 10);
    }

    #[test]
    fn test_advance_overflow_leaves_next_pts() {
        let mut s = stream(TimeBase::MPEG);
        s.configure(TimeBase::new(1, 1)).unwrap();
        s.next_pts = i64::MAX - 10;
        assert!(matches!(
            s.advance_next_pts(1),
            Err(Error::OutOfRange { delta: 1_000_000, .. })
        ));
        assert_eq!(s.next_pts, i64::MAX - 10);
    }

    #[test]
    fn test_bump_sync() {
        let mut s = stream(TimeBase::MPEG);
        for _ in 0..3 {
            s.bump_sync();
        }
        assert_eq!(s.sync_pts(), 3);
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let mut s = stream(TimeBase::MPEG);
        s.transition(StreamState::Streaming).unwrap();
        assert!(s.transition(StreamState::Streaming).is_err());
        assert!(s.transition(StreamState::Configured).is_err());
        s.transition(StreamState::Closed).unwrap();
        assert!(matches!(
            s.transition(StreamState::Draining),
            Err(Error::InvalidState { from: "closed", to: "draining" })
        ));
    }

    #[test]
    fn test_duration_in() {
        let s = stream(TimeBase::MPEG).with_duration(90000 * 120);
        assert_eq!(s.duration_in(TimeBase::new(1, 25)).unwrap(), 3000);
        assert_eq!(stream(TimeBase::MPEG).duration_in(TimeBase::new(1, 25)).unwrap(), 0);
    }
}
