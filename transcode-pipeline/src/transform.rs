//! Frame transforms between decoded and encoder layouts.
//!
//! A [`TransformFactory`] is asked once per output stream whose layout differs
//! from the decoded frames; the transform it returns is kept and reused for
//! every later frame of that stream.

use transcode_core::error::{Error, Result};
use transcode_core::frame::{Frame, VideoFormat};

/// Converts decoded frames to an encoder's layout.
pub trait Transform: Send {
    /// Get transform name.
    fn name(&self) -> &str;

    /// Produce a converted copy of `frame`, keeping its timing and flags.
    fn transform(&mut self, frame: &Frame) -> Result<Frame>;
}

/// Builds transforms for a source and destination layout.
pub trait TransformFactory: Send {
    fn create(&self, src: VideoFormat, dst: VideoFormat) -> Result<Box<dyn Transform>>;
}

/// Pass-through transform.
#[derive(Debug, Default)]
pub struct PassThrough;

impl Transform for PassThrough {
    fn name(&self) -> &str {
        "null"
    }

    fn transform(&mut self, frame: &Frame) -> Result<Frame> {
        Ok(frame.clone())
    }
}

/// Nearest-neighbour resize within one pixel format.
pub struct ScaleTransform {
    name: String,
    src: VideoFormat,
    dst: VideoFormat,
}

impl ScaleTransform {
    /// Create a new scale transform.
    pub fn new(src: VideoFormat, dst: VideoFormat) -> Result<Self> {
        if src.pixel_format != dst.pixel_format {
            return Err(Error::unsupported(format!(
                "pixel format conversion {} -> {}",
                src.pixel_format, dst.pixel_format
            )));
        }
        if dst.width == 0 || dst.height == 0 || src.width == 0 || src.height == 0 {
            return Err(Error::invalid_param(format!(
                "cannot scale {} to {}",
                src, dst
            )));
        }
        Ok(Self {
            name: format!("scale_{}x{}", dst.width, dst.height),
            src,
            dst,
        })
    }
}

impl Transform for ScaleTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, frame: &Frame) -> Result<Frame> {
        if frame.video_format() != self.src {
            return Err(Error::invalid_param(format!(
                "{} expects {} input, got {}",
                self.name,
                self.src,
                frame.video_format()
            )));
        }

        let format = self.dst.pixel_format;
        let mut scaled = Frame::with_format(self.dst, frame.pts.time_base);

        for plane in 0..format.num_planes() {
            let (src_w, src_h) = format.plane_dimensions(plane, self.src.width, self.src.height);
            let (dst_w, dst_h) = format.plane_dimensions(plane, self.dst.width, self.dst.height);
            let sample = format.plane_sample_size(plane);
            let src_stride = frame.stride(plane);
            let dst_stride = scaled.stride(plane);

            let (Some(src), Some(dst)) = (frame.plane(plane), scaled.plane_mut(plane)) else {
                continue;
            };

            for y in 0..dst_h {
                let src_row = (y * src_h / dst_h) * src_stride;
                let dst_row = y * dst_stride;
                for x in 0..dst_w {
                    let s = src_row + (x * src_w / dst_w) * sample;
                    let d = dst_row + x * sample;
                    dst[d..d + sample].copy_from_slice(&src[s..s + sample]);
                }
            }
        }

        // Copy timing information
        scaled.pts = frame.pts;
        scaled.duration = frame.duration;
        scaled.flags = frame.flags;

        Ok(scaled)
    }
}

/// Default factory: pass-through for equal layouts, [`ScaleTransform`] for
/// size changes. Pixel format conversion is not supported.
#[derive(Debug, Default)]
pub struct ScaleTransformFactory;

impl TransformFactory for ScaleTransformFactory {
    fn create(&self, src: VideoFormat, dst: VideoFormat) -> Result<Box<dyn Transform>> {
        if src == dst {
            return Ok(Box::new(PassThrough));
        }
        Ok(Box::new(ScaleTransform::new(src, dst)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_core::{FrameFlags, PixelFormat, TimeBase, Timestamp};

    fn gradient(format: VideoFormat) -> Frame {
        let mut frame = Frame::with_format(format, TimeBase::new(1, 25));
        let stride = frame.stride(0);
        let plane = frame.plane_mut(0).unwrap();
        for y in 0..format.height as usize {
            for x in 0..format.width as usize {
                plane[y * stride + x] = (y * 16 + x) as u8;
            }
        }
        frame
    }

    #[test]
    fn test_factory_passthrough_for_equal_layouts() {
        let format = VideoFormat::new(4, 4, PixelFormat::Gray8);
        let mut t = ScaleTransformFactory.create(format, format).unwrap();
        assert_eq!(t.name(), "null");
        let out = t.transform(&gradient(format)).unwrap();
        assert_eq!(out.video_format(), format);
    }

    #[test]
    fn test_factory_rejects_pixel_format_change() {
        let src = VideoFormat::new(4, 4, PixelFormat::Gray8);
        let dst = VideoFormat::new(4, 4, PixelFormat::Rgb24);
        let err = ScaleTransformFactory.create(src, dst).err().unwrap();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_downscale_picks_nearest_samples() {
        let src = VideoFormat::new(4, 4, PixelFormat::Gray8);
        let dst = VideoFormat::new(2, 2, PixelFormat::Gray8);
        let mut t = ScaleTransform::new(src, dst).unwrap();

        let mut frame = gradient(src);
        frame.pts = Timestamp::new(7, TimeBase::new(1, 25));
        frame.flags = FrameFlags::KEYFRAME;

        let out = t.transform(&frame).unwrap();
        let stride = out.stride(0);
        let plane = out.plane(0).unwrap();
        assert_eq!(plane[0], 0);
        assert_eq!(plane[1], 2);
        assert_eq!(plane[stride], 32);
        assert_eq!(plane[stride + 1], 34);
        assert_eq!(out.pts.value, 7);
        assert!(out.is_keyframe());
    }

    #[test]
    fn test_upscale_yuv_planes() {
        let src = VideoFormat::new(4, 4, PixelFormat::Yuv420p);
        let dst = VideoFormat::new(8, 6, PixelFormat::Yuv420p);
        let mut t = ScaleTransform::new(src, dst).unwrap();

        let mut frame = Frame::with_format(src, TimeBase::new(1, 25));
        frame.buffer_mut().fill(9);
        let out = t.transform(&frame).unwrap();
        assert_eq!(out.video_format(), dst);
        assert_eq!(out.plane(2).unwrap()[0], 9);
    }

    #[test]
    fn test_rejects_unexpected_input() {
        let src = VideoFormat::new(4, 4, PixelFormat::Gray8);
        let dst = VideoFormat::new(2, 2, PixelFormat::Gray8);
        let mut t = ScaleTransform::new(src, dst).unwrap();
        let other = gradient(VideoFormat::new(8, 8, PixelFormat::Gray8));
        assert!(t.transform(&other).is_err());
    }
}
