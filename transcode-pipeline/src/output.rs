//! Output containers and the streams they own.

use crate::error::{PipelineError, Result};
use crate::stream_map::ContainerId;
use tracing::{debug, info, trace};
use transcode_codecs::{EncoderConfig, VideoEncoder};
use transcode_containers::{MuxSettings, Muxer};
use transcode_core::error::Error as CoreError;
use transcode_core::{
    rescale, Frame, MediaKind, MediaStream, Packet, StreamState, Timestamp, VideoFormat,
};

/// One encoded output stream.
pub struct OutputStream {
    media: MediaStream,
    encoder: Box<dyn VideoEncoder>,
    config: EncoderConfig,
    /// Frames handed to the encoder, in encoder ticks.
    submitted: i64,
    failed: bool,
}

impl OutputStream {
    fn new(index: usize, config: EncoderConfig, encoder: Box<dyn VideoEncoder>) -> Self {
        let media = MediaStream::new(
            index,
            MediaKind::Video,
            config.time_base,
            config.codec_parameters(),
        );
        Self {
            media,
            encoder,
            config,
            submitted: 0,
            failed: false,
        }
    }

    /// Timing state of the stream.
    pub fn media(&self) -> &MediaStream {
        &self.media
    }

    /// Encoder configuration, resolved once the session has started.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Layout the encoder expects, once resolved.
    pub fn format(&self) -> Option<VideoFormat> {
        self.config.format()
    }

    /// True once an encode or transform failure stopped this stream.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Frames handed to the encoder so far.
    ///
    /// Runs ahead of `sync_pts` while the encoder holds frames back.
    pub fn frames_submitted(&self) -> i64 {
        self.submitted
    }

    /// Encode `frame` (or drain with `None`) into a new packet.
    ///
    /// The frame is stamped with the number of frames submitted before it,
    /// so buffering encoders still see strictly increasing timestamps.
    fn encode(
        &mut self,
        frame: Option<&mut Frame>,
        buf: &mut Vec<u8>,
    ) -> transcode_core::Result<Option<Packet<'static>>> {
        let enc_tb = self.encoder.time_base();
        buf.clear();
        let written = match frame {
            Some(frame) => {
                frame.pts = Timestamp::new(self.submitted, enc_tb);
                let written = self.encoder.encode(Some(&*frame), buf)?;
                self.submitted += 1;
                written
            }
            None => self.encoder.encode(None, buf)?,
        };
        if written == 0 {
            return Ok(None);
        }
        let data = buf.get(..written).ok_or_else(|| {
            CoreError::invalid_param(format!(
                "encoder reported {} bytes but wrote {}",
                written,
                buf.len()
            ))
        })?;

        let out_tb = self.media.time_base;
        let coded = self.encoder.coded_frame();
        let pts = match coded {
            Some(c) if c.has_pts() => rescale(c.pts, enc_tb.0, out_tb.0)?,
            _ => self.media.sync_pts(),
        };

        let mut packet = Packet::new(data.to_vec()).with_stream_index(self.media.index as u32);
        packet.pts = Timestamp::new(pts, out_tb);
        packet.dts = Timestamp::none_in(out_tb);
        packet.set_keyframe(coded.is_some_and(|c| c.key_frame));
        Ok(Some(packet))
    }
}

/// Result of handing one frame to an output stream.
#[derive(Debug)]
pub(crate) enum Emitted {
    /// A packet was written.
    Written,
    /// The encoder produced nothing (buffering, drained, or stream already failed).
    Nothing,
    /// The stream failed; it is now marked failed.
    Failed(PipelineError),
}

/// An output container: a muxer and the streams it owns.
pub struct OutputContainer {
    id: ContainerId,
    name: String,
    muxer: Box<dyn Muxer>,
    streams: Vec<OutputStream>,
    header_written: bool,
    trailer_written: bool,
    packets_written: u64,
}

impl OutputContainer {
    pub(crate) fn new(id: ContainerId, name: String, muxer: Box<dyn Muxer>) -> Self {
        Self {
            id,
            name,
            muxer,
            streams: Vec::new(),
            header_written: false,
            trailer_written: false,
            packets_written: 0,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format_name(&self) -> &str {
        self.muxer.format_name()
    }

    pub fn stream(&self, index: usize) -> Option<&OutputStream> {
        self.streams.get(index)
    }

    pub fn streams(&self) -> &[OutputStream] {
        &self.streams
    }

    pub(crate) fn stream_mut(&mut self, index: usize) -> Result<&mut OutputStream> {
        self.streams
            .get_mut(index)
            .ok_or(PipelineError::StreamNotFound(index))
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn trailer_written(&self) -> bool {
        self.trailer_written
    }

    /// Packets written into this container so far.
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Declare a stream; returns its index in the container.
    pub(crate) fn declare_stream(
        &mut self,
        config: EncoderConfig,
        encoder: Box<dyn VideoEncoder>,
    ) -> usize {
        let index = self.streams.len();
        self.streams.push(OutputStream::new(index, config, encoder));
        index
    }

    /// Resolve, open and register stream `index` for decoded frames of
    /// layout `input` coming from `source`.
    pub(crate) fn open_stream(
        &mut self,
        index: usize,
        input: &VideoFormat,
        source: &MediaStream,
    ) -> Result<()> {
        let id = self.id;
        let out = self.stream_mut(index)?;

        out.config = out.config.resolve(input).map_err(|e| {
            PipelineError::InvalidConfig(format!("stream {} of {}: {}", index, id, e))
        })?;
        out.media.time_base = out.config.time_base;
        out.media.codec = out.config.codec_parameters();
        if out.media.duration == 0 {
            out.media.duration = source.duration_in(out.media.time_base)?;
        }

        out.encoder.open(&out.config).map_err(|source| PipelineError::Open {
            target: format!("encoder for stream {} of {}", index, id),
            source,
        })?;
        out.media.configure(out.encoder.time_base())?;

        let params = out.media.codec.clone();
        let time_base = out.media.time_base;
        let muxer_index = self
            .muxer
            .add_stream(&params, time_base)
            .map_err(|source| PipelineError::Open {
                target: format!("stream {} of {}", index, id),
                source,
            })?;
        self.stream_mut(index)?.media.index = muxer_index;
        Ok(())
    }

    /// Apply muxer settings and write the header. Does nothing the second time.
    pub(crate) fn write_header(&mut self, settings: &MuxSettings) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let id = self.id;
        self.muxer
            .configure(settings)
            .and_then(|_| self.muxer.write_header())
            .map_err(|source| PipelineError::Header { container: id, source })?;
        self.header_written = true;
        for stream in &mut self.streams {
            stream.media.transition(StreamState::Streaming)?;
        }
        info!(
            "Wrote {} header for {} ({} streams)",
            self.muxer.format_name(),
            self.name,
            self.streams.len()
        );
        Ok(())
    }

    /// Encode `frame` for stream `index` and write the packet, if any.
    ///
    /// Encoder failures are contained in the returned [`Emitted::Failed`];
    /// write failures and encoder resource exhaustion are returned as errors.
    pub(crate) fn emit(
        &mut self,
        index: usize,
        frame: Option<&mut Frame>,
        buf: &mut Vec<u8>,
        packet_number: u64,
    ) -> Result<Emitted> {
        let id = self.id;
        let out = self.stream_mut(index)?;
        if out.failed {
            return Ok(Emitted::Nothing);
        }
        let packet = match out.encode(frame, buf) {
            Ok(Some(packet)) => packet,
            Ok(None) => return Ok(Emitted::Nothing),
            Err(CoreError::ResourceExhausted(reason)) => {
                return Err(PipelineError::Allocation(format!(
                    "encoder for stream {} of {}: {}",
                    index, id, reason
                )))
            }
            Err(e) => return Ok(Emitted::Failed(self.fail_stream(index, e.to_string()))),
        };
        let stream_index = out.media.index;
        let enc_seconds = out.media.sync_pts() as f64 * out.encoder.time_base().0.to_f64();

        self.muxer
            .write_packet(&packet)
            .map_err(|source| PipelineError::Write {
                container: id,
                stream_index,
                packet: packet_number,
                source,
            })?;
        self.packets_written += 1;

        let out = self.stream_mut(index)?;
        out.media.bump_sync();
        trace!(
            "{} stream {}: frame {} at {:.3}s, pts {}",
            id,
            stream_index,
            out.media.sync_pts(),
            enc_seconds,
            packet.pts.value
        );
        Ok(Emitted::Written)
    }

    /// Mark stream `index` failed and build the matching error.
    pub(crate) fn fail_stream(&mut self, index: usize, reason: String) -> PipelineError {
        let id = self.id;
        let stream_index = match self.streams.get_mut(index) {
            Some(out) => {
                out.failed = true;
                out.media.index
            }
            None => index,
        };
        debug!("Stopping stream {} of {}: {}", stream_index, id, reason);
        PipelineError::EncodeFailure {
            container: id,
            stream_index,
            reason,
        }
    }

    /// Drain stream `index`'s encoder, writing every delayed packet.
    ///
    /// Returns the number of packets written; an encoder failure is pushed
    /// onto `failures`.
    pub(crate) fn flush_stream(
        &mut self,
        index: usize,
        buf: &mut Vec<u8>,
        packet_number: u64,
        failures: &mut Vec<PipelineError>,
    ) -> Result<u64> {
        let out = self.stream_mut(index)?;
        if out.failed {
            return Ok(0);
        }
        if out.media.state() < StreamState::Draining {
            out.media.transition(StreamState::Draining)?;
        }
        let mut written = 0;
        loop {
            match self.emit(index, None, buf, packet_number)? {
                Emitted::Written => written += 1,
                Emitted::Nothing => return Ok(written),
                Emitted::Failed(e) => {
                    failures.push(e);
                    return Ok(written);
                }
            }
        }
    }

    /// Write the trailer and close every stream. Does nothing the second time.
    pub(crate) fn write_trailer(&mut self) -> Result<()> {
        if self.trailer_written {
            return Ok(());
        }
        let id = self.id;
        self.muxer
            .write_trailer()
            .map_err(|source| PipelineError::Trailer { container: id, source })?;
        self.trailer_written = true;
        for stream in &mut self.streams {
            if stream.media.state() < StreamState::Closed {
                stream.media.transition(StreamState::Closed)?;
            }
        }
        info!(
            "Finalized {}: {} packets written",
            self.name, self.packets_written
        );
        Ok(())
    }
}
