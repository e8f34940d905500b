//! Per-input-stream decode, transform, encode and mux.

use crate::error::{PipelineError, Result};
use crate::output::{Emitted, OutputContainer};
use crate::stream_map::OutputTarget;
use crate::transform::{Transform, TransformFactory};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;
use transcode_codecs::VideoDecoder;
use transcode_core::error::Error as CoreError;
use transcode_core::{Frame, MediaStream, Packet, VideoFormat, NO_TIMESTAMP};

/// Pictures a decoder may return for one payload without consuming any of it.
const MAX_STALLED_PICTURES: usize = 16;

/// Counters and contained failures from one pipeline call.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Pictures produced by the decoder.
    pub frames_decoded: u64,
    /// Packets written to output containers.
    pub packets_written: u64,
    /// Output streams that failed and were stopped.
    pub failures: Vec<PipelineError>,
    /// Set when decoding stopped for good during this call.
    pub decode_failure: Option<PipelineError>,
}

/// Decodes one input stream and feeds every output stream mapped from it.
///
/// The pipeline owns the stream's decoder, the frame it decodes into, the
/// encode buffer and one cached transform per output stream whose layout
/// differs from the decoded frames.
pub struct TranscodePipeline {
    input_index: usize,
    decoder: Box<dyn VideoDecoder>,
    targets: Vec<OutputTarget>,
    frame: Option<Frame>,
    encode_buffer: Vec<u8>,
    transforms: HashMap<OutputTarget, Box<dyn Transform>>,
    failed: bool,
    frames_decoded: u64,
}

impl TranscodePipeline {
    /// Create a pipeline for input stream `input_index`.
    pub fn new(
        input_index: usize,
        decoder: Box<dyn VideoDecoder>,
        targets: Vec<OutputTarget>,
        buffer_size: usize,
    ) -> Self {
        Self {
            input_index,
            decoder,
            targets,
            frame: None,
            encode_buffer: Vec::with_capacity(buffer_size),
            transforms: HashMap::new(),
            failed: false,
            frames_decoded: 0,
        }
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// Output streams fed by this pipeline, in mapping order.
    pub fn targets(&self) -> &[OutputTarget] {
        &self.targets
    }

    /// True once decoding stopped for good.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub(crate) fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Layout of decoded pictures.
    pub fn output_format(&self) -> VideoFormat {
        self.decoder.output_format()
    }

    /// Open the decoder and bind its tick base to `stream`.
    pub fn open(&mut self, stream: &mut MediaStream) -> Result<()> {
        self.decoder
            .open(&stream.codec)
            .map_err(|source| PipelineError::Open {
                target: format!("decoder for input stream {}", self.input_index),
                source,
            })?;
        stream.configure(self.decoder.time_base())?;
        debug!(
            "Input stream {}: decoder tick base {}, output {}",
            self.input_index,
            self.decoder.time_base(),
            self.decoder.output_format()
        );
        Ok(())
    }

    /// Decode `packet` (or drain the decoder with `None`) and deliver every
    /// picture to each output stream.
    ///
    /// A decoder failure stops the pipeline and is reported in
    /// [`StepReport::decode_failure`] next to the frames already delivered.
    /// Failures of a single output stream are collected in the report. Write
    /// failures and resource exhaustion are returned as errors.
    pub fn process(
        &mut self,
        stream: &mut MediaStream,
        packet: Option<&Packet<'_>>,
        packet_number: u64,
        outputs: &mut [OutputContainer],
        factory: &dyn TransformFactory,
    ) -> Result<StepReport> {
        let mut report = StepReport::default();
        if self.failed {
            return Ok(report);
        }
        if stream.next_pts == NO_TIMESTAMP {
            stream.next_pts = stream.pts;
        }

        let Self {
            input_index,
            decoder,
            targets,
            frame,
            encode_buffer,
            transforms,
            failed,
            frames_decoded,
        } = self;

        let data: &[u8] = packet.map(|p| p.data()).unwrap_or_default();
        let flushing = packet.is_none();
        let frame = frame
            .get_or_insert_with(|| Frame::with_format(decoder.output_format(), decoder.time_base()));

        let decode_failure = |reason: String| PipelineError::DecodeFailure {
            stream_index: *input_index,
            packet: packet_number,
            reason,
        };

        let mut offset = 0;
        let mut stalled = 0;
        while offset < data.len() || (flushing && stream.next_pts != stream.pts) {
            stream.pts = stream.next_pts;
            frame.reset();

            let remaining = &data[offset..];
            let status = match decoder.decode(frame, remaining) {
                Ok(status) => status,
                Err(CoreError::ResourceExhausted(reason)) => {
                    *failed = true;
                    return Err(PipelineError::Allocation(format!(
                        "decoder for input stream {}: {}",
                        input_index, reason
                    )));
                }
                Err(e) => {
                    *failed = true;
                    report.decode_failure = Some(decode_failure(e.to_string()));
                    break;
                }
            };
            let consumed = status.bytes_consumed.min(remaining.len());
            offset += consumed;

            if consumed == 0 && !remaining.is_empty() {
                stalled += 1;
                if !status.picture_produced || stalled > MAX_STALLED_PICTURES {
                    *failed = true;
                    report.decode_failure = Some(decode_failure(format!(
                        "decoder made no progress with {} bytes left",
                        remaining.len()
                    )));
                    break;
                }
            } else {
                stalled = 0;
            }

            if !status.picture_produced {
                if flushing {
                    break;
                }
                continue;
            }

            stream.advance_next_pts(status.duration)?;
            *frames_decoded += 1;
            report.frames_decoded += 1;

            for &target in targets.iter() {
                deliver(
                    frame,
                    target,
                    outputs,
                    transforms,
                    factory,
                    encode_buffer,
                    packet_number,
                    &mut report,
                )?;
            }
        }

        Ok(report)
    }

    /// Drain the encoder of every output stream fed by this pipeline.
    pub fn flush_encoders(
        &mut self,
        outputs: &mut [OutputContainer],
        packet_number: u64,
    ) -> Result<StepReport> {
        let mut report = StepReport::default();
        for &target in &self.targets {
            let container = container_mut(outputs, target)?;
            report.packets_written += container.flush_stream(
                target.stream,
                &mut self.encode_buffer,
                packet_number,
                &mut report.failures,
            )?;
        }
        Ok(report)
    }
}

fn container_mut(
    outputs: &mut [OutputContainer],
    target: OutputTarget,
) -> Result<&mut OutputContainer> {
    outputs
        .get_mut(target.container.index())
        .ok_or_else(|| {
            PipelineError::InvalidConfig(format!("unknown container {}", target.container))
        })
}

/// Transform `frame` for `target` if needed, then encode and write it.
#[allow(clippy::too_many_arguments)]
fn deliver(
    frame: &mut Frame,
    target: OutputTarget,
    outputs: &mut [OutputContainer],
    transforms: &mut HashMap<OutputTarget, Box<dyn Transform>>,
    factory: &dyn TransformFactory,
    buf: &mut Vec<u8>,
    packet_number: u64,
    report: &mut StepReport,
) -> Result<()> {
    let container = container_mut(outputs, target)?;
    let out = container.stream_mut(target.stream)?;
    if out.is_failed() {
        return Ok(());
    }

    let src = frame.video_format();
    let dst = out.format().unwrap_or(src);
    let mut converted: Frame;
    let input: &mut Frame = if src == dst {
        frame
    } else {
        let transform = match transforms.entry(target) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match factory.create(src, dst) {
                Ok(transform) => {
                    debug!("{}: {} transform {} -> {}", target, transform.name(), src, dst);
                    entry.insert(transform)
                }
                Err(e) => {
                    report.failures.push(container.fail_stream(target.stream, e.to_string()));
                    return Ok(());
                }
            },
        };
        converted = match transform.transform(frame) {
            Ok(converted) => converted,
            Err(e) => {
                report.failures.push(container.fail_stream(target.stream, e.to_string()));
                return Ok(());
            }
        };
        &mut converted
    };

    match container.emit(target.stream, Some(input), buf, packet_number)? {
        Emitted::Written => report.packets_written += 1,
        Emitted::Nothing => {}
        Emitted::Failed(e) => report.failures.push(e),
    }
    Ok(())
}
