//! Encoder configuration.

use transcode_core::{CodecId, CodecParameters, Error, PixelFormat, Result, TimeBase, VideoFormat};

/// Encoder configuration for one output stream.
///
/// Zero dimensions and an unset pixel format mean "same as the decoded
/// input"; [`EncoderConfig::resolve`] fills them in once the decoder is open.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EncoderConfig {
    /// Output codec.
    pub codec: CodecId,
    /// Output width, 0 to inherit.
    pub width: u32,
    /// Output height, 0 to inherit.
    pub height: u32,
    /// Output pixel format, `None` to inherit.
    pub pixel_format: Option<PixelFormat>,
    /// Encoder tick base.
    pub time_base: TimeBase,
    /// Target bitrate in bits per second.
    pub bit_rate: u64,
    /// Allowed bitrate deviation, 0 for 20% of `bit_rate`.
    pub bit_rate_tolerance: u64,
    /// GOP size (keyframe interval).
    pub gop_size: u32,
    /// Maximum consecutive B-frames.
    pub max_b_frames: u32,
    /// VBV buffer size in bits, 0 when unconstrained.
    pub rc_buffer_size: u64,
    /// Initial VBV fullness in bits; 0 or 1 for three quarters of the buffer.
    pub rc_initial_buffer_occupancy: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: CodecId::Mpeg4,
            width: 0,
            height: 0,
            pixel_format: None,
            time_base: TimeBase::new(1, 25),
            bit_rate: 1_000_000,
            bit_rate_tolerance: 0,
            gop_size: 12,
            max_b_frames: 0,
            rc_buffer_size: 0,
            rc_initial_buffer_occupancy: 0,
        }
    }
}

impl EncoderConfig {
    /// Create a config for `codec` with default rate control.
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            ..Default::default()
        }
    }

    /// Set output dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set output pixel format.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = Some(format);
        self
    }

    /// Set encoder tick base.
    #[must_use]
    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    /// Set target bitrate.
    #[must_use]
    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Set GOP size.
    #[must_use]
    pub fn with_gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = gop_size;
        self
    }

    /// Set maximum consecutive B-frames.
    #[must_use]
    pub fn with_max_b_frames(mut self, max_b_frames: u32) -> Self {
        self.max_b_frames = max_b_frames;
        self
    }

    /// Set VBV buffer size and initial occupancy.
    #[must_use]
    pub fn with_rc_buffer(mut self, size: u64, initial_occupancy: u64) -> Self {
        self.rc_buffer_size = size;
        self.rc_initial_buffer_occupancy = initial_occupancy;
        self
    }

    /// Output layout, once every part of it is known.
    pub fn format(&self) -> Option<VideoFormat> {
        match (self.width, self.height, self.pixel_format) {
            (0, _, _) | (_, 0, _) | (_, _, None) => None,
            (w, h, Some(pf)) => Some(VideoFormat::new(w, h, pf)),
        }
    }

    /// Fill inherited and derived fields against the decoded input layout.
    pub fn resolve(&self, input: &VideoFormat) -> Result<Self> {
        if self.time_base.0.num <= 0 {
            return Err(Error::invalid_param(format!(
                "encoder time base {} must be positive",
                self.time_base
            )));
        }

        let mut resolved = self.clone();
        if resolved.width == 0 {
            resolved.width = input.width;
        }
        if resolved.height == 0 {
            resolved.height = input.height;
        }
        if resolved.pixel_format.is_none() {
            resolved.pixel_format = Some(input.pixel_format);
        }
        if resolved.width == 0 || resolved.height == 0 {
            return Err(Error::invalid_param(format!(
                "cannot derive output size from input {}",
                input
            )));
        }
        if resolved.bit_rate_tolerance == 0 {
            resolved.bit_rate_tolerance = resolved.bit_rate / 5;
        }
        if resolved.rc_initial_buffer_occupancy <= 1 {
            resolved.rc_initial_buffer_occupancy = resolved.rc_buffer_size * 3 / 4;
        }
        Ok(resolved)
    }

    /// Codec parameters to announce to a muxer.
    pub fn codec_parameters(&self) -> CodecParameters {
        CodecParameters {
            codec: self.codec,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            bit_rate: self.bit_rate,
            extradata: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> VideoFormat {
        VideoFormat::new(1920, 1080, PixelFormat::Yuv420p)
    }

    #[test]
    fn test_defaults() {
        let config = EncoderConfig::default();
        assert_eq!(config.time_base, TimeBase::new(1, 25));
        assert_eq!(config.gop_size, 12);
        assert_eq!(config.bit_rate, 1_000_000);
        assert!(config.format().is_none());
    }

    #[test]
    fn test_resolve_inherits_input_layout() {
        let resolved = EncoderConfig::new(CodecId::H264).resolve(&input()).unwrap();
        assert_eq!(resolved.format(), Some(input()));
    }

    #[test]
    fn test_resolve_keeps_explicit_layout() {
        let resolved = EncoderConfig::new(CodecId::H264)
            .with_size(640, 360)
            .with_pixel_format(PixelFormat::Nv12)
            .resolve(&input())
            .unwrap();
        assert_eq!(
            resolved.format(),
            Some(VideoFormat::new(640, 360, PixelFormat::Nv12))
        );
    }

    #[test]
    fn test_resolve_derives_rate_control() {
        let resolved = EncoderConfig::new(CodecId::H264)
            .with_bit_rate(2_000_000)
            .with_rc_buffer(1_000_000, 1)
            .resolve(&input())
            .unwrap();
        assert_eq!(resolved.bit_rate_tolerance, 400_000);
        assert_eq!(resolved.rc_initial_buffer_occupancy, 750_000);
    }

    #[test]
    fn test_resolve_keeps_explicit_occupancy() {
        let resolved = EncoderConfig::default()
            .with_rc_buffer(1_000_000, 500_000)
            .resolve(&input())
            .unwrap();
        assert_eq!(resolved.rc_initial_buffer_occupancy, 500_000);
    }

    #[test]
    fn test_resolve_rejects_unknown_time_base() {
        let config = EncoderConfig::default().with_time_base(TimeBase::new(0, 1));
        assert!(config.resolve(&input()).is_err());
    }

    #[test]
    fn test_codec_parameters() {
        let params = EncoderConfig::new(CodecId::Vp9)
            .resolve(&input())
            .unwrap()
            .codec_parameters();
        assert_eq!(params.codec, CodecId::Vp9);
        assert_eq!(params.video_format(), Some(input()));
    }
}
