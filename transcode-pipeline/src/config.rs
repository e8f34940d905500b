//! Session configuration.

pub use transcode_containers::MuxSettings;

/// Drift correction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SyncConfig {
    /// Correct timestamp discontinuities by moving the session offset.
    pub drift_correction: bool,
    /// Largest jump between predicted and actual dts accepted without
    /// correction, in microseconds.
    pub dts_delta_threshold: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_correction: true,
            dts_delta_threshold: 10_000_000,
        }
    }
}

impl SyncConfig {
    /// Enable or disable drift correction.
    #[must_use]
    pub fn with_drift_correction(mut self, enabled: bool) -> Self {
        self.drift_correction = enabled;
        self
    }

    /// Set the correction threshold in seconds.
    #[must_use]
    pub fn with_threshold_secs(mut self, secs: i64) -> Self {
        self.dts_delta_threshold = secs.saturating_mul(1_000_000);
        self
    }
}

/// What a stream-local failure does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamErrorPolicy {
    /// Stop the failed stream, keep the others running.
    #[default]
    Isolate,
    /// Abort the whole session.
    Abort,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Synchronization config.
    pub sync: SyncConfig,
    /// Handling of decode, timestamp and encode failures.
    pub stream_errors: StreamErrorPolicy,
    /// Muxer timing applied to every output container.
    pub mux: MuxSettings,
    /// Initial capacity of each encode buffer, in bytes.
    pub output_buffer_size: usize,
    /// Enable progress reporting.
    pub report_progress: bool,
    /// Progress reporting interval (packets).
    pub progress_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            stream_errors: StreamErrorPolicy::default(),
            mux: MuxSettings::default(),
            output_buffer_size: 1 << 20,
            report_progress: true,
            progress_interval: 100,
        }
    }
}

impl SessionConfig {
    /// Set synchronization config.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Set stream failure policy.
    #[must_use]
    pub fn with_stream_errors(mut self, policy: StreamErrorPolicy) -> Self {
        self.stream_errors = policy;
        self
    }

    /// Set muxer timing.
    #[must_use]
    pub fn with_mux(mut self, mux: MuxSettings) -> Self {
        self.mux = mux;
        self
    }

    /// Set encode buffer capacity.
    #[must_use]
    pub fn with_output_buffer_size(mut self, size: usize) -> Self {
        self.output_buffer_size = size;
        self
    }

    /// Set progress reporting. An interval of 0 disables it.
    #[must_use]
    pub fn with_progress(mut self, interval: u64) -> Self {
        self.report_progress = interval > 0;
        self.progress_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert!(config.sync.drift_correction);
        assert_eq!(config.sync.dts_delta_threshold, 10_000_000);
        assert_eq!(config.stream_errors, StreamErrorPolicy::Isolate);
        assert_eq!(config.output_buffer_size, 1024 * 1024);
        assert!(config.report_progress);
        assert_eq!(config.progress_interval, 100);
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::default()
            .with_sync(SyncConfig::default().with_threshold_secs(2))
            .with_stream_errors(StreamErrorPolicy::Abort)
            .with_progress(0);
        assert_eq!(config.sync.dts_delta_threshold, 2_000_000);
        assert_eq!(config.stream_errors, StreamErrorPolicy::Abort);
        assert!(!config.report_progress);
    }
}
