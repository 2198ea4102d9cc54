//! One playing video stream: collator, frame parser, decode buffers and decoder.

use std::sync::mpsc::Receiver;

use pes_collator::{CodedFrame, Collator, CollatorStatistics, InputDescriptor, Status};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{Decoder, DecoderStatistics};
use crate::config::PlayerConfig;
use crate::decode::buffer::{DecodeBufferPool, DecodeBufferProvider};
use crate::decode::transform::{
    completion_channel, LoopbackTransform, TransformCompletion, TransformService,
};
use crate::error::StreamError;
use crate::frame_parser::{new_frame_parser, FrameParser};
use crate::types::{Codec, DecodedFrame};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatistics {
    pub collator: CollatorStatistics,
    pub decoder: DecoderStatistics,
    /// Frames committed for decode.
    pub parsed_frames: u64,
    /// Collated frames holding headers only.
    pub header_frames: u64,
    /// Frames lost to malformed or incomplete headers.
    pub parse_errors: u64,
}

pub struct Stream {
    codec: Codec,
    collator: Collator,
    parser: Box<dyn FrameParser>,
    pool: DecodeBufferPool,
    decoder: Decoder,
    /// Collated frames not yet parsed.
    pending: Vec<CodedFrame>,
    decoded: Vec<DecodedFrame>,
    statistics: StreamStatistics,
    last_status: Status,
}

impl Stream {
    /// Create a stream decoding through the loopback transform.
    pub fn new(config: &PlayerConfig) -> Self {
        let (sender, receiver) = completion_channel();
        Self::with_transform(config, Box::new(LoopbackTransform::new(sender)), receiver)
    }

    /// Create a stream decoding through `transform`, which posts to `completions`.
    pub fn with_transform(
        config: &PlayerConfig,
        transform: Box<dyn TransformService>,
        completions: Receiver<TransformCompletion>,
    ) -> Self {
        let parser = new_frame_parser(config.codec, &config.mjpeg, config.decode.decimation);
        let collator_config = config.collator.apply(parser.collator_config());
        info!(
            "Stream {} created ({}, {} decode buffers)",
            config.codec, collator_config.name, config.decode.buffer_count
        );

        Self {
            codec: config.codec,
            collator: Collator::new(collator_config, parser.header_handler()),
            parser,
            pool: DecodeBufferPool::new(config.decode.buffer_count),
            decoder: Decoder::new(transform, completions),
            pending: Vec::new(),
            decoded: Vec::new(),
            statistics: StreamStatistics::default(),
            last_status: Status::Success,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Feed one fragment of PES data.
    ///
    /// Malformed stream content costs the affected frame and is reported
    /// through the returned status; resource and transform failures are
    /// returned as errors and the frames not yet decoded are kept for
    /// [`resume`](Self::resume).
    pub fn input(
        &mut self,
        descriptor: &InputDescriptor,
        data: &[u8],
    ) -> Result<Status, StreamError> {
        let collated = self.collator.input(descriptor, data, &mut self.pending);
        // Frames completed before a collator error are still good.
        let processed = self.process_pending();
        let result = match collated {
            Err(err) if !err.is_malformed_stream() => Err(err.into()),
            Err(err) => processed.map(|_| Status::from(&err)),
            Ok(()) => processed,
        };
        self.finish(result)
    }

    /// End of input: emit the open frame, or drop it when `discard` is set.
    pub fn drain(&mut self, discard: bool) -> Result<Status, StreamError> {
        if discard {
            debug!("Drain with discard");
            self.collator.discard_accumulated_data();
            self.pending.clear();
        } else {
            self.collator.flush(&mut self.pending);
        }
        let processed = self.process_pending();
        self.finish(processed)
    }

    /// The next input does not follow on from the previous one.
    pub fn discontinuity(&mut self, surplus_data_injected: bool) -> Result<Status, StreamError> {
        self.collator
            .input_jump(surplus_data_injected, &mut self.pending);
        // Frames from before the jump are parsed with the old stream state.
        let processed = self.process_pending();
        if self.pending.is_empty() {
            self.parser.reset();
        } else {
            debug!(
                "{}: parser state kept for {} held frames",
                self.codec,
                self.pending.len()
            );
        }
        self.finish(processed)
    }

    /// Retry the frames held back by an earlier resource or transform error.
    ///
    /// No new input is collated; release decoded frames first so buffers are
    /// available.
    pub fn resume(&mut self) -> Result<Status, StreamError> {
        let processed = self.process_pending();
        self.finish(processed)
    }

    /// Collated frames waiting to be parsed.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Frames decoded so far, in completion order.
    pub fn take_decoded(&mut self) -> Vec<DecodedFrame> {
        std::mem::take(&mut self.decoded)
    }

    /// Give a decoded frame's buffer back to the pool.
    pub fn release(&mut self, frame: &DecodedFrame) {
        self.pool.release_buffer(frame.buffer.index);
    }

    pub fn statistics(&self) -> StreamStatistics {
        StreamStatistics {
            collator: self.collator.statistics(),
            decoder: self.decoder.statistics(),
            ..self.statistics
        }
    }

    /// Status of the most recent call.
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    pub fn buffer_pool(&self) -> &DecodeBufferPool {
        &self.pool
    }

    fn finish(&mut self, result: Result<Status, StreamError>) -> Result<Status, StreamError> {
        self.last_status = match &result {
            Ok(status) => *status,
            Err(err) => err.status(),
        };
        result
    }

    /// Parse and submit every pending frame, then collect completions.
    fn process_pending(&mut self) -> Result<Status, StreamError> {
        let submitted = self.submit_pending();
        self.decoded.extend(self.decoder.poll()?);
        submitted
    }

    fn submit_pending(&mut self) -> Result<Status, StreamError> {
        let mut status = Status::Success;
        let mut frames = std::mem::take(&mut self.pending).into_iter();

        while let Some(frame) = frames.next() {
            // Shallow copy: the data is shared `Bytes`.
            let retry = frame.clone();
            let parsed = match self.parser.parse_frame(frame, &mut self.pool) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => {
                    self.statistics.header_frames += 1;
                    continue;
                }
                Err(err) if err.is_resource_error() => {
                    debug!("{}: frame held until a buffer is free: {}", self.codec, err);
                    self.pending.push(retry);
                    self.pending.extend(frames);
                    return Err(err.into());
                }
                Err(err) => {
                    warn!("{}: frame dropped: {}", self.codec, err);
                    self.statistics.parse_errors += 1;
                    if status.is_success() {
                        status = Status::from(&err);
                    }
                    continue;
                }
            };

            self.statistics.parsed_frames += 1;
            if let Err(err) = self.decoder.decode(parsed, &mut self.pool) {
                warn!("{}: decode command rejected: {}", self.codec, err);
                self.pending.extend(frames);
                return Err(err.into());
            }
        }
        Ok(status)
    }
}
