//! Encoded packets.
//!
//! A demuxed packet lives for one session step: the synchronizer corrects its
//! timestamps in place and the pipeline feeds its payload to the decoder.
//! Packets built from encoder output always own their payload.

use crate::timestamp::{Duration, TimeBase, Timestamp};
use bitflags::bitflags;
use std::borrow::Cow;
use std::fmt;

bitflags! {
    /// Packet properties reported by the demuxer or the encoder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        /// Starts with a picture decodable on its own.
        const KEYFRAME = 0x0001;
        /// Payload is damaged.
        const CORRUPT = 0x0002;
        /// Payload may be dropped.
        const DISCARD = 0x0004;
    }
}

/// One encoded access unit of one stream.
#[derive(Clone)]
pub struct Packet<'a> {
    data: Cow<'a, [u8]>,
    /// Presentation timestamp, possibly NONE.
    pub pts: Timestamp,
    /// Decode timestamp, possibly NONE.
    pub dts: Timestamp,
    pub duration: Duration,
    /// Index of the stream in its container.
    pub stream_index: u32,
    pub flags: PacketFlags,
    /// Byte offset in the input, when the demuxer knows it.
    pub pos: Option<u64>,
}

impl<'a> Packet<'a> {
    /// Packet owning `data`, with no timestamps.
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_data(Cow::Owned(data))
    }

    /// Packet borrowing a demuxer buffer.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self::with_data(Cow::Borrowed(data))
    }

    fn with_data(data: Cow<'a, [u8]>) -> Self {
        Self {
            data,
            pts: Timestamp::none(),
            dts: Timestamp::none(),
            duration: Duration::default(),
            stream_index: 0,
            flags: PacketFlags::empty(),
            pos: None,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(PacketFlags::KEYFRAME)
    }

    pub fn set_keyframe(&mut self, keyframe: bool) {
        self.flags.set(PacketFlags::KEYFRAME, keyframe);
    }

    /// Copy a borrowed payload so the packet can outlive the demuxer buffer.
    pub fn into_owned(self) -> Packet<'static> {
        Packet {
            data: Cow::Owned(self.data.into_owned()),
            pts: self.pts,
            dts: self.dts,
            duration: self.duration,
            stream_index: self.stream_index,
            flags: self.flags,
            pos: self.pos,
        }
    }

    /// Set pts and dts as ticks of `time_base`.
    #[must_use]
    pub fn with_timestamps(mut self, pts: i64, dts: i64, time_base: TimeBase) -> Self {
        self.pts = Timestamp::new(pts, time_base);
        self.dts = Timestamp::new(dts, time_base);
        self
    }

    #[must_use]
    pub fn with_stream_index(mut self, index: u32) -> Self {
        self.stream_index = index;
        self
    }
}

impl fmt::Debug for Packet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("stream", &self.stream_index)
            .field("size", &self.size())
            .field("pts", &self.pts.value)
            .field("dts", &self.dts.value)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::NO_TIMESTAMP;

    #[test]
    fn test_new_packet_has_no_timestamps() {
        let packet = Packet::new(vec![0u8; 100]);
        assert_eq!(packet.size(), 100);
        assert_eq!(packet.pts.value, NO_TIMESTAMP);
        assert_eq!(packet.dts.value, NO_TIMESTAMP);
        assert_eq!(packet.pos, None);
    }

    #[test]
    fn test_borrowed_payload_survives_buffer_reuse() {
        let mut buffer = vec![1u8, 2, 3];
        let owned: Packet<'static> = Packet::from_slice(&buffer)
            .with_stream_index(2)
            .with_timestamps(7200, 3600, TimeBase::MPEG)
            .into_owned();
        buffer.fill(0);
        assert_eq!(owned.data(), &[1, 2, 3]);
        assert_eq!(owned.stream_index, 2);
        assert_eq!(owned.pts, Timestamp::new(7200, TimeBase::MPEG));
        assert_eq!(owned.dts, Timestamp::new(3600, TimeBase::MPEG));
    }

    #[test]
    fn test_keyframe_flag() {
        let mut packet = Packet::new(Vec::new());
        assert!(packet.is_empty());
        assert!(!packet.is_keyframe());
        packet.set_keyframe(true);
        assert!(packet.is_keyframe());
        packet.set_keyframe(false);
        assert!(!packet.is_keyframe());
    }
}
