//! Transcode sessions.
//!
//! A [`TranscodeSession`] owns one input, its demuxer and input streams, one
//! [`TranscodePipeline`] per mapped input stream and every output container.
//! It is assembled with a [`SessionBuilder`] and then driven packet by packet:
//!
//! ```ignore
//! let mut builder = SessionBuilder::new(SessionConfig::default());
//! builder.open_input("in.ts", Box::new(demuxer))?;
//! builder.decoder(0, Box::new(decoder));
//! let out = builder.create_output("out.mp4", Box::new(muxer), Box::new(file))?;
//! let target = builder.declare_stream(out, EncoderConfig::new(CodecId::H264), Box::new(encoder))?;
//! builder.map(0, target)?;
//!
//! let mut session = builder.build()?;
//! let stats = session.run()?;
//! ```

use crate::config::{SessionConfig, StreamErrorPolicy};
use crate::error::{FailedStream, PipelineError, Result};
use crate::output::OutputContainer;
use crate::pipeline::{StepReport, TranscodePipeline};
use crate::stream_map::{ContainerId, OutputTarget, StreamMap};
use crate::sync::{SyncOutcome, TimestampOffset, TimestampSynchronizer};
use crate::transform::{ScaleTransformFactory, TransformFactory};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use transcode_codecs::{EncoderConfig, VideoDecoder, VideoEncoder};
use transcode_containers::{Demuxer, Muxer, StreamInfo};
use transcode_core::{MediaStream, Packet, StreamState};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Assembled; nothing opened or written yet.
    Built,
    /// Codecs open, every header written.
    HeadersWritten,
    /// Packets are being transcoded.
    Running,
    /// Input exhausted; decoders and encoders are being flushed.
    Draining,
    /// Every trailer written.
    Finalized,
    /// Stopped by a fatal error.
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => write!(f, "built"),
            Self::HeadersWritten => write!(f, "headers written"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Finalized => write!(f, "finalized"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A contained failure recorded by the session.
#[derive(Debug)]
pub struct StreamFailure {
    pub stream: FailedStream,
    pub error: PipelineError,
}

/// Session counters.
#[derive(Debug, Default)]
pub struct TranscodeStats {
    /// Packets read from the input.
    pub packets_read: u64,
    /// Packets of unmapped or stopped streams.
    pub packets_skipped: u64,
    pub frames_decoded: u64,
    pub packets_written: u64,
    /// Timestamp discontinuities corrected.
    pub drift_corrections: u64,
    /// Final session timestamp offset, in microseconds.
    pub timestamp_offset: i64,
    pub stream_failures: Vec<StreamFailure>,
}

struct InputFile {
    path: PathBuf,
    demuxer: Box<dyn Demuxer>,
    streams: Vec<MediaStream>,
}

/// Builder for constructing sessions.
pub struct SessionBuilder {
    config: SessionConfig,
    input: Option<InputFile>,
    decoders: BTreeMap<usize, Box<dyn VideoDecoder>>,
    outputs: Vec<OutputContainer>,
    map: StreamMap,
    transforms: Box<dyn TransformFactory>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionBuilder {
    /// Create a new session builder.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            input: None,
            decoders: BTreeMap::new(),
            outputs: Vec::new(),
            map: StreamMap::new(),
            transforms: Box::new(ScaleTransformFactory),
        }
    }

    /// Open the input; returns the number of streams it contains.
    pub fn open_input(&mut self, path: impl AsRef<Path>, mut demuxer: Box<dyn Demuxer>) -> Result<usize> {
        if self.input.is_some() {
            return Err(PipelineError::InvalidConfig("input already opened".into()));
        }
        let path = path.as_ref();
        demuxer.open(path).map_err(|source| PipelineError::Open {
            target: path.display().to_string(),
            source,
        })?;

        let streams: Vec<MediaStream> = demuxer
            .streams()
            .iter()
            .map(StreamInfo::to_media_stream)
            .collect();
        if let Some((position, stream)) = streams
            .iter()
            .enumerate()
            .find(|(position, stream)| stream.index != *position)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "demuxer reported stream {} at position {}",
                stream.index, position
            )));
        }

        info!(
            "Opened input {} ({}, {} streams)",
            path.display(),
            demuxer.format_name(),
            streams.len()
        );
        let count = streams.len();
        self.input = Some(InputFile {
            path: path.to_path_buf(),
            demuxer,
            streams,
        });
        Ok(count)
    }

    /// Set the decoder for input stream `index`.
    pub fn decoder(&mut self, index: usize, decoder: Box<dyn VideoDecoder>) -> &mut Self {
        self.decoders.insert(index, decoder);
        self
    }

    /// Create an output container writing into `sink`.
    pub fn create_output(
        &mut self,
        name: impl Into<String>,
        mut muxer: Box<dyn Muxer>,
        sink: Box<dyn Write + Send>,
    ) -> Result<ContainerId> {
        let name = name.into();
        muxer.create(sink).map_err(|source| PipelineError::Open {
            target: name.clone(),
            source,
        })?;
        let id = ContainerId::new(self.outputs.len());
        debug!("Created {} ({}) as {}", name, muxer.format_name(), id);
        self.outputs.push(OutputContainer::new(id, name, muxer));
        Ok(id)
    }

    /// Declare an encoded stream in `container`.
    pub fn declare_stream(
        &mut self,
        container: ContainerId,
        config: EncoderConfig,
        encoder: Box<dyn VideoEncoder>,
    ) -> Result<OutputTarget> {
        let output = self.outputs.get_mut(container.index()).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("unknown container {}", container))
        })?;
        let stream = output.declare_stream(config, encoder);
        Ok(OutputTarget::new(container, stream))
    }

    /// Feed `target` from input stream `input`.
    pub fn map(&mut self, input: usize, target: OutputTarget) -> Result<()> {
        let streams = self
            .input
            .as_ref()
            .map(|i| i.streams.len())
            .ok_or_else(|| PipelineError::InvalidConfig("no input opened".into()))?;
        if input >= streams {
            return Err(PipelineError::StreamNotFound(input));
        }
        let declared = self
            .outputs
            .get(target.container.index())
            .and_then(|c| c.stream(target.stream))
            .is_some();
        if !declared {
            return Err(PipelineError::InvalidConfig(format!(
                "unknown output stream {}",
                target
            )));
        }
        self.map.add(input, target)
    }

    /// Replace the factory used for layout conversions.
    pub fn transform_factory(&mut self, factory: Box<dyn TransformFactory>) -> &mut Self {
        self.transforms = factory;
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<TranscodeSession> {
        let SessionBuilder {
            config,
            input,
            mut decoders,
            outputs,
            map,
            transforms,
        } = self;

        let input = input.ok_or_else(|| PipelineError::InvalidConfig("no input opened".into()))?;
        if map.is_empty() {
            return Err(PipelineError::EmptyMapping);
        }
        for container in &outputs {
            for stream in 0..container.streams().len() {
                let target = OutputTarget::new(container.id(), stream);
                if map.source_of(target).is_none() {
                    return Err(PipelineError::InvalidConfig(format!(
                        "output stream {} has no source",
                        target
                    )));
                }
            }
        }

        let mut pipelines = BTreeMap::new();
        for index in map.inputs() {
            let decoder = decoders.remove(&index).ok_or(PipelineError::NoDecoder(index))?;
            let targets = map.targets_for(index).to_vec();
            pipelines.insert(
                index,
                TranscodePipeline::new(index, decoder, targets, config.output_buffer_size),
            );
        }
        for index in decoders.keys() {
            debug!("Ignoring decoder for unmapped input stream {}", index);
        }

        Ok(TranscodeSession {
            synchronizer: TimestampSynchronizer::new(config.sync),
            config,
            state: SessionState::Built,
            offset: TimestampOffset::default(),
            input,
            pipelines,
            outputs,
            map,
            transforms,
            stats: TranscodeStats::default(),
        })
    }
}

/// A configured transcode from one input to one or more outputs.
pub struct TranscodeSession {
    config: SessionConfig,
    state: SessionState,
    synchronizer: TimestampSynchronizer,
    offset: TimestampOffset,
    input: InputFile,
    pipelines: BTreeMap<usize, TranscodePipeline>,
    outputs: Vec<OutputContainer>,
    map: StreamMap,
    transforms: Box<dyn TransformFactory>,
    stats: TranscodeStats,
}

impl TranscodeSession {
    /// Get current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &TranscodeStats {
        &self.stats
    }

    /// Current cumulative timestamp correction, in microseconds.
    pub fn timestamp_offset(&self) -> i64 {
        self.offset.get()
    }

    pub fn stream_map(&self) -> &StreamMap {
        &self.map
    }

    pub fn input_stream(&self, index: usize) -> Option<&MediaStream> {
        self.input.streams.get(index)
    }

    pub fn output(&self, id: ContainerId) -> Option<&OutputContainer> {
        self.outputs.get(id.index())
    }

    pub fn output_stream(&self, target: OutputTarget) -> Option<&MediaStream> {
        self.output(target.container)
            .and_then(|c| c.stream(target.stream))
            .map(|s| s.media())
    }

    pub fn pipeline(&self, input: usize) -> Option<&TranscodePipeline> {
        self.pipelines.get(&input)
    }

    /// Open every codec and write every container header.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Built {
            return Err(PipelineError::InvalidState(format!(
                "cannot start a session that is {}",
                self.state
            )));
        }
        let result = self.open_and_write_headers();
        self.guard(result)?;
        self.state = SessionState::HeadersWritten;
        Ok(())
    }

    /// Transcode one input packet.
    ///
    /// Returns `false` once the input is exhausted and the session finalized.
    pub fn step(&mut self) -> Result<bool> {
        match self.state {
            SessionState::HeadersWritten | SessionState::Running => {}
            SessionState::Finalized => return Ok(false),
            state => {
                return Err(PipelineError::InvalidState(format!(
                    "cannot step a session that is {}",
                    state
                )))
            }
        }
        self.state = SessionState::Running;

        let packet = match self.input.demuxer.read_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                debug!("End of input {}", self.input.path.display());
                self.finish()?;
                return Ok(false);
            }
            Err(e) => {
                warn!(
                    "Read error on {}, treating as end of input: {}",
                    self.input.path.display(),
                    e
                );
                self.finish()?;
                return Ok(false);
            }
        };

        self.stats.packets_read += 1;
        let packet_number = self.stats.packets_read;
        let result = self.process_packet(packet, packet_number);
        self.guard(result)?;
        self.report_progress();
        Ok(true)
    }

    /// Run the session to completion.
    pub fn run(&mut self) -> Result<&TranscodeStats> {
        if self.state == SessionState::Built {
            self.start()?;
        }

        while self.step()? {}

        Ok(&self.stats)
    }

    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = SessionState::Aborted;
        }
        result
    }

    fn open_and_write_headers(&mut self) -> Result<()> {
        if self.map.is_empty() {
            return Err(PipelineError::EmptyMapping);
        }

        for (&index, pipeline) in self.pipelines.iter_mut() {
            let stream = self
                .input
                .streams
                .get_mut(index)
                .ok_or(PipelineError::StreamNotFound(index))?;
            pipeline.open(stream)?;
            let format = pipeline.output_format();
            for &target in pipeline.targets() {
                let container = self.outputs.get_mut(target.container.index()).ok_or_else(|| {
                    PipelineError::InvalidConfig(format!("unknown container {}", target.container))
                })?;
                container.open_stream(target.stream, &format, stream)?;
            }
            stream.transition(StreamState::Streaming)?;
        }

        for container in &mut self.outputs {
            container.write_header(&self.config.mux)?;
        }

        info!(
            "Session started: {} input streams feeding {} output streams in {} containers",
            self.map.len(),
            self.map.target_count(),
            self.outputs.len()
        );
        Ok(())
    }

    fn process_packet(&mut self, mut packet: Packet<'static>, packet_number: u64) -> Result<()> {
        let index = packet.stream_index as usize;
        let Some(pipeline) = self.pipelines.get_mut(&index) else {
            self.stats.packets_skipped += 1;
            trace!("Skipping packet {} of unmapped stream {}", packet_number, index);
            return Ok(());
        };
        if pipeline.is_failed() {
            self.stats.packets_skipped += 1;
            return Ok(());
        }
        let stream = self
            .input
            .streams
            .get_mut(index)
            .ok_or(PipelineError::StreamNotFound(index))?;

        let processed = match self.synchronizer.synchronize(
            &mut self.offset,
            stream,
            &mut packet,
            packet_number,
        ) {
            Ok(outcome) => {
                if let SyncOutcome::Corrected { .. } = outcome {
                    self.stats.drift_corrections += 1;
                }
                pipeline.process(
                    stream,
                    Some(&packet),
                    packet_number,
                    &mut self.outputs,
                    self.transforms.as_ref(),
                )
            }
            Err(e) => Err(e),
        };

        match processed {
            Ok(report) => self.absorb(report),
            Err(e) => self.contain(e),
        }
    }

    /// Fold a pipeline report into the stats.
    ///
    /// Output failures are contained before the decode failure that ended
    /// the call, so their frames and packets are counted either way.
    fn absorb(&mut self, report: StepReport) -> Result<()> {
        self.stats.frames_decoded += report.frames_decoded;
        self.stats.packets_written += report.packets_written;
        for failure in report.failures {
            self.contain(failure)?;
        }
        match report.decode_failure {
            Some(failure) => self.contain(failure),
            None => Ok(()),
        }
    }

    /// Record a stream-local failure, or hand back a fatal one.
    fn contain(&mut self, error: PipelineError) -> Result<()> {
        let Some(stream) = error.failed_stream() else {
            return Err(error);
        };
        if self.config.stream_errors == StreamErrorPolicy::Abort {
            return Err(error);
        }
        if let FailedStream::Input(index) = stream {
            if let Some(pipeline) = self.pipelines.get_mut(&index) {
                pipeline.mark_failed();
            }
        }
        warn!("Stopped {}: {}", stream, error);
        self.stats
            .stream_failures
            .push(StreamFailure { stream, error });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let result = self.drain().and_then(|()| self.finalize());
        self.guard(result)
    }

    fn drain(&mut self) -> Result<()> {
        self.state = SessionState::Draining;
        let packet_number = self.stats.packets_read;
        let indices: Vec<usize> = self.pipelines.keys().copied().collect();

        for &index in &indices {
            let Some(pipeline) = self.pipelines.get_mut(&index) else {
                continue;
            };
            let stream = self
                .input
                .streams
                .get_mut(index)
                .ok_or(PipelineError::StreamNotFound(index))?;
            if stream.state() < StreamState::Draining {
                stream.transition(StreamState::Draining)?;
            }
            let flushed = pipeline.process(
                stream,
                None,
                packet_number,
                &mut self.outputs,
                self.transforms.as_ref(),
            );
            match flushed {
                Ok(report) => self.absorb(report)?,
                Err(e) => self.contain(e)?,
            }
        }

        for &index in &indices {
            let Some(pipeline) = self.pipelines.get_mut(&index) else {
                continue;
            };
            let report = pipeline.flush_encoders(&mut self.outputs, packet_number)?;
            self.absorb(report)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        for container in &mut self.outputs {
            container.write_trailer()?;
        }
        for stream in &mut self.input.streams {
            let state = stream.state();
            if state > StreamState::Created && state < StreamState::Closed {
                stream.transition(StreamState::Closed)?;
            }
        }

        self.stats.timestamp_offset = self.offset.get();
        self.state = SessionState::Finalized;
        info!(
            "Transcode finished: {} packets read, {} frames decoded, {} packets written, {} stream failures",
            self.stats.packets_read,
            self.stats.frames_decoded,
            self.stats.packets_written,
            self.stats.stream_failures.len()
        );
        Ok(())
    }

    fn report_progress(&self) {
        let interval = self.config.progress_interval;
        if self.config.report_progress && interval > 0 && self.stats.packets_read % interval == 0 {
            info!(
                "Processed {} packets ({} frames decoded, {} packets written)",
                self.stats.packets_read, self.stats.frames_decoded, self.stats.packets_written
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_input_fails() {
        let result = SessionBuilder::default().build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::HeadersWritten.to_string(), "headers written");
        assert_eq!(SessionState::Aborted.to_string(), "aborted");
    }
}
