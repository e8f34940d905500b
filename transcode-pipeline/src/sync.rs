//! Timestamp synchronization.
//!
//! Input packets arrive with timestamps in their stream's time base. The
//! [`TimestampSynchronizer`] shifts them by the session offset, detects
//! discontinuities against the stream's predicted next timestamp, folds any
//! correction back into the offset and records the stream's new position.

use crate::config::SyncConfig;
use crate::error::{PipelineError, Result};
use tracing::debug;
use transcode_core::packet::Packet;
use transcode_core::stream::MediaStream;
use transcode_core::timestamp::{checked_shift, GLOBAL_TIME_BASE, NO_TIMESTAMP};

/// Cumulative timestamp correction of a session, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampOffset(i64);

impl TimestampOffset {
    pub fn new(micros: i64) -> Self {
        Self(micros)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// What the synchronizer did to a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Only the session offset was applied.
    Aligned,
    /// A discontinuity of `delta` microseconds was removed.
    Corrected { delta: i64 },
}

/// Aligns input packet timestamps on a continuous session timeline.
#[derive(Debug, Clone, Default)]
pub struct TimestampSynchronizer {
    config: SyncConfig,
}

impl TimestampSynchronizer {
    /// Create a new synchronizer.
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Correct `packet` in place and update `stream`'s position.
    ///
    /// Packet timestamps are read as ticks of the stream time base. Fails
    /// with [`PipelineError::MissingTimestamp`] when the packet still has no
    /// pts afterwards; the stream state is updated even then.
    pub fn synchronize(
        &self,
        offset: &mut TimestampOffset,
        stream: &mut MediaStream,
        packet: &mut Packet<'_>,
        packet_number: u64,
    ) -> Result<SyncOutcome> {
        let tb = stream.time_base;
        packet.dts.time_base = tb;
        packet.pts.time_base = tb;

        let shift = GLOBAL_TIME_BASE.convert(offset.0, tb)?;
        packet.dts.shift(shift)?;
        packet.pts.shift(shift)?;

        let mut outcome = SyncOutcome::Aligned;
        if self.config.drift_correction && packet.dts.is_valid() && stream.next_pts != NO_TIMESTAMP
        {
            let dts = tb.convert(packet.dts.value, GLOBAL_TIME_BASE)?;
            let delta = dts.saturating_sub(stream.next_pts);
            if delta.saturating_abs() > self.config.dts_delta_threshold
                || dts.saturating_add(1) < stream.pts
            {
                let corrected = checked_shift(offset.0, delta.saturating_neg())?;
                let correction = GLOBAL_TIME_BASE.convert(delta, tb)?.saturating_neg();
                packet.dts.shift(correction)?;
                packet.pts.shift(correction)?;
                offset.0 = corrected;
                debug!(
                    "Timestamp discontinuity on stream {}: delta {} us, offset now {} us",
                    stream.index, delta, offset.0
                );
                outcome = SyncOutcome::Corrected { delta };
            }
        }

        if packet.dts.is_valid() {
            stream.pts = tb.convert(packet.dts.value, GLOBAL_TIME_BASE)?;
            stream.next_pts = stream.pts;
        }

        if !packet.pts.is_valid() {
            return Err(PipelineError::MissingTimestamp {
                stream_index: stream.index,
                packet: packet_number,
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_core::error::Error as CoreError;
    use transcode_core::{
        CodecId, CodecParameters, MediaKind, PixelFormat, TimeBase, Timestamp, VideoFormat,
    };

    fn stream() -> MediaStream {
        let params = CodecParameters::video(
            CodecId::H264,
            VideoFormat::new(320, 240, PixelFormat::Yuv420p),
        );
        MediaStream::new(0, MediaKind::Video, TimeBase::MPEG, params)
    }

    fn packet(pts: i64, dts: i64) -> Packet<'static> {
        Packet::new(vec![0u8; 8]).with_timestamps(pts, dts, TimeBase::MPEG)
    }

    #[test]
    fn test_first_packet_seeds_position() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        let mut p = packet(3600, 3600);

        let outcome = sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();
        assert_eq!(outcome, SyncOutcome::Aligned);
        assert_eq!(s.pts, 40_000);
        assert_eq!(s.next_pts, 40_000);
        assert_eq!(offset.get(), 0);
    }

    #[test]
    fn test_missing_dts_does_not_seed_next_pts() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        let mut p = packet(7200, NO_TIMESTAMP);

        sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();
        assert_eq!(s.next_pts, NO_TIMESTAMP);
        assert_eq!(p.pts.value, 7200);

        let mut p = packet(10800, 10800);
        sync.synchronize(&mut offset, &mut s, &mut p, 2).unwrap();
        assert_eq!(s.next_pts, 120_000);
    }

    #[test]
    fn test_missing_pts_is_reported() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        let mut p = packet(NO_TIMESTAMP, 3600);

        let err = sync.synchronize(&mut offset, &mut s, &mut p, 9).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingTimestamp { stream_index: 0, packet: 9 }
        ));
        assert_eq!(s.pts, 40_000);
    }

    #[test]
    fn test_forward_jump_is_corrected() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        s.pts = 1_000_000;
        s.next_pts = 1_040_000;

        // 20 s ahead of the prediction
        let dts = 90000 * 21 + 3600;
        let mut p = packet(dts, dts);
        let outcome = sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();

        assert_eq!(outcome, SyncOutcome::Corrected { delta: 20_000_000 });
        assert_eq!(offset.get(), -20_000_000);
        assert_eq!(p.dts.value, 93600);
        assert_eq!(p.pts.value, 93600);
        assert_eq!(s.next_pts, 1_040_000);
    }

    #[test]
    fn test_correction_is_not_repeated() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        s.pts = 1_000_000;
        s.next_pts = 1_040_000;

        let dts = 90000 * 21 + 3600;
        let mut p = packet(dts, dts);
        sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();
        s.next_pts += 40_000;

        // The next packet continues on the far side of the jump
        let mut p = packet(dts + 3600, dts + 3600);
        let outcome = sync.synchronize(&mut offset, &mut s, &mut p, 2).unwrap();
        assert_eq!(outcome, SyncOutcome::Aligned);
        assert_eq!(offset.get(), -20_000_000);
        assert_eq!(p.dts.value, 93600 + 3600);
        assert_eq!(s.pts, 1_080_000);
    }

    #[test]
    fn test_backward_jump_is_corrected() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        s.pts = 5_000_000;
        s.next_pts = 5_040_000;

        // One second back, well under the threshold
        let mut p = packet(90000 * 4, 90000 * 4);
        let outcome = sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();

        assert_eq!(outcome, SyncOutcome::Corrected { delta: -1_040_000 });
        assert_eq!(offset.get(), 1_040_000);
        assert_eq!(s.pts, 5_040_000);
    }

    #[test]
    fn test_small_jitter_is_tolerated() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        s.pts = 1_000_000;
        s.next_pts = 1_040_000;

        let mut p = packet(94500, 94500);
        let outcome = sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();
        assert_eq!(outcome, SyncOutcome::Aligned);
        assert_eq!(s.pts, 1_050_000);
    }

    #[test]
    fn test_drift_correction_disabled() {
        let sync = TimestampSynchronizer::new(SyncConfig::default().with_drift_correction(false));
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        s.pts = 1_000_000;
        s.next_pts = 1_040_000;

        let dts = 90000 * 100;
        let mut p = packet(dts, dts);
        let outcome = sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();
        assert_eq!(outcome, SyncOutcome::Aligned);
        assert_eq!(offset.get(), 0);
        assert_eq!(s.pts, 100_000_000);
    }

    #[test]
    fn test_offset_is_applied_before_check() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::new(-20_000_000);
        let mut s = stream();

        let mut p = packet(90000 * 30, NO_TIMESTAMP);
        sync.synchronize(&mut offset, &mut s, &mut p, 1).unwrap();
        assert_eq!(p.pts, Timestamp::new(90000 * 10, TimeBase::MPEG));
        assert!(!p.dts.is_valid());
    }

    #[test]
    fn test_shift_out_of_range_is_an_error() {
        let sync = TimestampSynchronizer::default();
        let mut offset = TimestampOffset::new(1_000_000);
        let mut s = stream();

        let mut p = packet(i64::MAX - 10, i64::MAX - 10);
        let result = sync.synchronize(&mut offset, &mut s, &mut p, 1);
        assert!(matches!(
            result,
            Err(PipelineError::Core(CoreError::OutOfRange { delta: 90000, .. }))
        ));
        assert_eq!(s.next_pts, NO_TIMESTAMP);
        assert_eq!(offset.get(), 1_000_000);
    }
}
