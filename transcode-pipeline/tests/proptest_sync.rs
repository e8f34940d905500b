//! Property tests for timestamp synchronization.

use proptest::prelude::*;
use transcode_core::{CodecId, CodecParameters, MediaKind, MediaStream, Packet, PixelFormat, TimeBase, VideoFormat};
use transcode_pipeline::{SyncConfig, SyncOutcome, TimestampOffset, TimestampSynchronizer};

fn stream() -> MediaStream {
    let params = CodecParameters::video(
        CodecId::H264,
        VideoFormat::new(320, 240, PixelFormat::Yuv420p),
    );
    let mut stream = MediaStream::new(0, MediaKind::Video, TimeBase::MPEG, params);
    stream.configure(TimeBase::new(1, 25)).unwrap();
    stream
}

proptest! {
    /// Increasing timestamps with jitter below the threshold never move the offset.
    #[test]
    fn jitter_below_threshold_is_kept(
        start in 0i64..1_000_000,
        steps in prop::collection::vec(3000i64..4200, 1..200),
    ) {
        let sync = TimestampSynchronizer::new(SyncConfig::default());
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        let mut dts = start;

        for (n, step) in steps.iter().enumerate() {
            let mut packet = Packet::new(vec![0u8; 4]).with_timestamps(dts, dts, TimeBase::MPEG);
            let outcome = sync.synchronize(&mut offset, &mut s, &mut packet, n as u64 + 1).unwrap();
            prop_assert_eq!(outcome, SyncOutcome::Aligned);
            prop_assert_eq!(packet.dts.value, dts);
            s.advance_next_pts(1).unwrap();
            dts += step;
        }
        prop_assert_eq!(offset.get(), 0);
    }

    /// A single large jump is removed and later packets stay on the corrected timeline.
    #[test]
    fn large_jump_is_folded_into_offset(
        before in 1usize..50,
        after in 1usize..50,
        jump_secs in 11i64..3600,
    ) {
        let sync = TimestampSynchronizer::new(SyncConfig::default());
        let mut offset = TimestampOffset::default();
        let mut s = stream();
        let mut corrections = 0;

        for i in 0..before + after {
            let mut dts = i as i64 * 3600;
            if i >= before {
                dts += jump_secs * 90000;
            }
            let mut packet = Packet::new(vec![0u8; 4]).with_timestamps(dts, dts, TimeBase::MPEG);
            if let SyncOutcome::Corrected { .. } =
                sync.synchronize(&mut offset, &mut s, &mut packet, i as u64 + 1).unwrap()
            {
                corrections += 1;
            }
            prop_assert_eq!(packet.dts.value, i as i64 * 3600);
            s.advance_next_pts(1).unwrap();
        }

        prop_assert_eq!(corrections, 1);
        prop_assert_eq!(offset.get(), -jump_secs * 1_000_000);
    }
}
