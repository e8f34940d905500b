//! Video frame buffer abstractions.
//!
//! Provides types for representing decoded video frames in various pixel formats.

use crate::timestamp::{Duration, TimeBase, Timestamp};
use bitflags::bitflags;
use std::fmt;

/// Pixel format for video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (1 Cr & Cb sample per 2x2 Y samples).
    Yuv420p,
    /// Planar YUV 4:2:2, 16bpp (1 Cr & Cb sample per 2x1 Y samples).
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp (no subsampling).
    Yuv444p,
    /// Packed NV12 (Y plane, interleaved UV plane).
    Nv12,
    /// Packed RGB24, 24bpp.
    Rgb24,
    /// Packed RGBA, 32bpp.
    Rgba,
    /// Grayscale, 8bpp.
    Gray8,
}

impl PixelFormat {
    /// Get the number of planes for this pixel format.
    pub fn num_planes(&self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Nv12 => 2,
            Self::Rgb24 | Self::Rgba | Self::Gray8 => 1,
        }
    }

    /// Bytes per pixel in the first plane.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba => 4,
            _ => 1,
        }
    }

    /// Get chroma subsampling factors (horizontal, vertical).
    pub fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p | Self::Nv12 => (2, 2),
            Self::Yuv422p => (2, 1),
            _ => (1, 1),
        }
    }

    /// Dimensions of `plane` for a picture of `width` x `height`.
    ///
    /// Sample pairs of an interleaved NV12 chroma plane count as one sample.
    pub fn plane_dimensions(&self, plane: usize, width: u32, height: u32) -> (usize, usize) {
        if plane == 0 {
            return (width as usize, height as usize);
        }
        let (hsub, vsub) = self.chroma_subsampling();
        (
            (width as usize).div_ceil(hsub as usize),
            (height as usize).div_ceil(vsub as usize),
        )
    }

    /// Bytes per sample of `plane`.
    pub fn plane_sample_size(&self, plane: usize) -> usize {
        match (self, plane) {
            (Self::Nv12, 1) => 2,
            _ => self.bytes_per_pixel(),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yuv420p => write!(f, "yuv420p"),
            Self::Yuv422p => write!(f, "yuv422p"),
            Self::Yuv444p => write!(f, "yuv444p"),
            Self::Nv12 => write!(f, "nv12"),
            Self::Rgb24 => write!(f, "rgb24"),
            Self::Rgba => write!(f, "rgba"),
            Self::Gray8 => write!(f, "gray8"),
        }
    }
}

/// Layout of a picture: dimensions and pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
    }
}

bitflags! {
    /// Frame flags indicating frame properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u32 {
        /// This is a keyframe (I-frame).
        const KEYFRAME = 0x0001;
        /// Frame is corrupted or incomplete.
        const CORRUPT = 0x0002;
        /// Interlaced frame.
        const INTERLACED = 0x0008;
    }
}

/// A decoded video frame.
#[derive(Clone)]
pub struct Frame {
    buffer: FrameBuffer,
    /// Presentation timestamp.
    pub pts: Timestamp,
    /// Frame duration.
    pub duration: Duration,
    /// Frame flags.
    pub flags: FrameFlags,
}

impl Frame {
    /// Create a new zeroed frame.
    pub fn new(width: u32, height: u32, format: PixelFormat, time_base: TimeBase) -> Self {
        Self {
            buffer: FrameBuffer::new(width, height, format),
            pts: Timestamp::none_in(time_base),
            duration: Duration::zero_in(time_base),
            flags: FrameFlags::empty(),
        }
    }

    /// Create a new zeroed frame with the given layout.
    pub fn with_format(format: VideoFormat, time_base: TimeBase) -> Self {
        Self::new(format.width, format.height, format.pixel_format, time_base)
    }

    /// Create a frame from an existing buffer.
    pub fn from_buffer(buffer: FrameBuffer) -> Self {
        Self {
            buffer,
            pts: Timestamp::none(),
            duration: Duration::default(),
            flags: FrameFlags::empty(),
        }
    }

    /// Get the frame width.
    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    /// Get the frame height.
    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    /// Get the pixel format.
    pub fn format(&self) -> PixelFormat {
        self.buffer.format
    }

    /// Layout of this frame.
    pub fn video_format(&self) -> VideoFormat {
        VideoFormat::new(self.width(), self.height(), self.format())
    }

    /// Check if this is a keyframe.
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(FrameFlags::KEYFRAME)
    }

    /// Clear timing and flags before the buffer is decoded into again.
    pub fn reset(&mut self) {
        self.pts = Timestamp::none_in(self.pts.time_base);
        self.duration = Duration::zero_in(self.duration.time_base);
        self.flags = FrameFlags::empty();
    }

    /// Get the frame buffer.
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Get a mutable reference to the frame buffer.
    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    /// Get a plane's data.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.buffer.plane(index)
    }

    /// Get a mutable reference to a plane's data.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.buffer.plane_mut(index)
    }

    /// Get the stride (bytes per row) for a plane.
    pub fn stride(&self, plane: usize) -> usize {
        self.buffer.stride(plane)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format())
            .field("pts", &self.pts)
            .field("flags", &self.flags)
            .finish()
    }
}

/// A buffer for storing frame pixel data.
#[derive(Clone)]
pub struct FrameBuffer {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    planes: Vec<PlaneData>,
}

#[derive(Clone)]
struct PlaneData {
    data: Vec<u8>,
    stride: usize,
}

impl FrameBuffer {
    /// Create a new zeroed frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = (0..format.num_planes())
            .map(|plane| {
                let (plane_width, plane_height) = format.plane_dimensions(plane, width, height);
                let stride = plane_width * format.plane_sample_size(plane);
                // Rows start on 32-byte boundaries
                let aligned_stride = (stride + 31) & !31;
                PlaneData {
                    data: vec![0u8; aligned_stride * plane_height],
                    stride: aligned_stride,
                }
            })
            .collect();

        Self {
            width,
            height,
            format,
            planes,
        }
    }

    /// Get the number of planes.
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Get a plane's data.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(|p| p.data.as_slice())
    }

    /// Get a mutable reference to a plane's data.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.planes.get_mut(index).map(|p| p.data.as_mut_slice())
    }

    /// Get the stride for a plane.
    pub fn stride(&self, plane: usize) -> usize {
        self.planes.get(plane).map(|p| p.stride).unwrap_or(0)
    }

    /// Get the total size of all planes in bytes.
    pub fn total_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Fill all planes with a value.
    pub fn fill(&mut self, value: u8) {
        for plane in &mut self.planes {
            plane.data.fill(value);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("planes", &self.planes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_planes() {
        assert_eq!(PixelFormat::Yuv420p.num_planes(), 3);
        assert_eq!(PixelFormat::Nv12.num_planes(), 2);
        assert_eq!(PixelFormat::Rgb24.num_planes(), 1);
    }

    #[test]
    fn test_odd_dimensions_round_chroma_up() {
        assert_eq!(PixelFormat::Yuv420p.plane_dimensions(1, 5, 3), (3, 2));
        assert_eq!(PixelFormat::Yuv422p.plane_dimensions(2, 5, 3), (3, 3));
    }

    #[test]
    fn test_frame_buffer_creation() {
        let buffer = FrameBuffer::new(1920, 1080, PixelFormat::Yuv420p);
        assert_eq!(buffer.num_planes(), 3);
        assert!(buffer.plane(2).is_some());
        assert!(buffer.plane(3).is_none());
        assert_eq!(buffer.stride(0) % 32, 0);
    }

    #[test]
    fn test_frame_reset_keeps_time_base() {
        let mut frame = Frame::new(16, 16, PixelFormat::Gray8, TimeBase::new(1, 25));
        frame.pts = Timestamp::new(42, TimeBase::new(1, 25));
        frame.flags = FrameFlags::KEYFRAME;
        frame.reset();
        assert!(!frame.pts.is_valid());
        assert_eq!(frame.pts.time_base, TimeBase::new(1, 25));
        assert!(!frame.is_keyframe());
    }

    #[test]
    fn test_video_format_display() {
        let frame = Frame::new(640, 480, PixelFormat::Yuv420p, TimeBase::MPEG);
        assert_eq!(frame.video_format().to_string(), "640x480 yuv420p");
    }
}
