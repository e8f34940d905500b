//! Container format traits for demuxing and muxing.

use std::io::Write;
use std::path::Path;
use transcode_core::error::Result;
use transcode_core::packet::Packet;
use transcode_core::{
    CodecId, CodecParameters, MediaKind, MediaStream, PixelFormat, Rational, TimeBase,
};

/// Stream information reported by a demuxer.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream index.
    pub index: usize,
    /// Stream kind.
    pub kind: MediaKind,
    /// Codec ID.
    pub codec_id: CodecId,
    /// Time base of packet timestamps.
    pub time_base: TimeBase,
    /// Duration in time base units.
    pub duration: Option<i64>,
    /// Codec-specific extra data.
    pub extra_data: Option<Vec<u8>>,
    /// Video-specific info.
    pub video: Option<VideoStreamInfo>,
}

/// Video stream information.
#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format, when the container records it.
    pub pixel_format: Option<PixelFormat>,
    /// Frame rate.
    pub frame_rate: Option<Rational>,
}

impl StreamInfo {
    /// Describe a video stream.
    pub fn video(index: usize, codec_id: CodecId, time_base: TimeBase, video: VideoStreamInfo) -> Self {
        Self {
            index,
            kind: MediaKind::Video,
            codec_id,
            time_base,
            duration: None,
            extra_data: None,
            video: Some(video),
        }
    }

    /// Codec parameters carried by this stream.
    pub fn codec_parameters(&self) -> CodecParameters {
        let (width, height, pixel_format) = self
            .video
            .as_ref()
            .map(|v| (v.width, v.height, v.pixel_format))
            .unwrap_or((0, 0, None));
        CodecParameters {
            codec: self.codec_id,
            width,
            height,
            pixel_format,
            bit_rate: 0,
            extradata: self.extra_data.clone().unwrap_or_default(),
        }
    }

    /// Timing state for this stream, in the `Created` state.
    pub fn to_media_stream(&self) -> MediaStream {
        MediaStream::new(self.index, self.kind, self.time_base, self.codec_parameters())
            .with_duration(self.duration.unwrap_or(0))
    }
}

/// Muxer timing settings.
///
/// Values are in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MuxSettings {
    /// How far ahead of the first packet playback may start buffering.
    pub preload: i64,
    /// Maximum demux-decode delay the muxer may introduce.
    pub max_delay: i64,
    /// Whether the output should loop (for formats that support it).
    pub loop_output: bool,
}

impl Default for MuxSettings {
    fn default() -> Self {
        Self {
            preload: 500_000,
            max_delay: 700_000,
            loop_output: false,
        }
    }
}

/// Demuxer trait for reading container formats.
pub trait Demuxer: Send {
    /// Open a container for reading.
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Get container format name.
    fn format_name(&self) -> &str;

    /// Describe every stream in the container. Valid after `open`.
    fn streams(&self) -> Vec<StreamInfo>;

    /// Read the next packet, or `None` at end of input.
    fn read_packet(&mut self) -> Result<Option<Packet<'static>>>;
}

/// Muxer trait for writing container formats.
pub trait Muxer: Send {
    /// Bind the muxer to its output sink.
    fn create(&mut self, sink: Box<dyn Write + Send>) -> Result<()>;

    /// Get container format name.
    fn format_name(&self) -> &str;

    /// Add a stream, returning its index in the container.
    fn add_stream(&mut self, params: &CodecParameters, time_base: TimeBase) -> Result<usize>;

    /// Apply timing settings before the header is written.
    fn configure(&mut self, _settings: &MuxSettings) -> Result<()> {
        Ok(())
    }

    /// Write the header.
    fn write_header(&mut self) -> Result<()>;

    /// Write a packet, interleaving it with the other streams.
    fn write_packet(&mut self, packet: &Packet<'_>) -> Result<()>;

    /// Write the trailer and finalize.
    fn write_trailer(&mut self) -> Result<()>;
}
