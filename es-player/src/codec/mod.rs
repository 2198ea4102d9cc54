//! Decode dispatch.
//!
//! The [`Decoder`] turns committed frames into transform requests and
//! matches completions back to the frames they belong to.

pub mod command;

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};

use serde::Serialize;
use tracing::{debug, warn};

pub use command::{build_decode_command, CodecParameters, DecodeCommand, PlaneDestination};

use crate::decode::buffer::DecodeBufferProvider;
use crate::decode::transform::{TransformCompletion, TransformHandle, TransformService};
use crate::error::TransformError;
use crate::types::{DecodeQuality, DecodedFrame, ParsedFrame};

/// What the decoder remembers about a frame while the transform runs.
#[derive(Debug)]
struct DecodeContext {
    frame: ParsedFrame,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStatistics {
    pub submitted: u64,
    pub completed: u64,
    pub degraded: u64,
    pub rejected: u64,
    /// Completions whose handle was not in flight.
    pub unknown_completions: u64,
}

pub struct Decoder {
    transform: Box<dyn TransformService>,
    completions: Receiver<TransformCompletion>,
    in_flight: HashMap<TransformHandle, DecodeContext>,
    statistics: DecoderStatistics,
}

impl Decoder {
    /// `completions` must be the channel `transform` posts to.
    pub fn new(
        transform: Box<dyn TransformService>,
        completions: Receiver<TransformCompletion>,
    ) -> Self {
        Self {
            transform,
            completions,
            in_flight: HashMap::new(),
            statistics: DecoderStatistics::default(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn statistics(&self) -> DecoderStatistics {
        self.statistics
    }

    /// Submit `frame` for decode.
    ///
    /// On rejection the frame's decode buffer goes back to `provider`.
    pub fn decode(
        &mut self,
        frame: ParsedFrame,
        provider: &mut dyn DecodeBufferProvider,
    ) -> Result<TransformHandle, TransformError> {
        let command = build_decode_command(&frame);
        match self.transform.submit(&command) {
            Ok(handle) => {
                debug!(
                    "Submitted transform {} ({} bytes, buffer {})",
                    handle, command.source_length, frame.decode_buffer.index
                );
                self.statistics.submitted += 1;
                self.in_flight.insert(handle, DecodeContext { frame });
                Ok(handle)
            }
            Err(err) => {
                self.statistics.rejected += 1;
                provider.release_buffer(frame.decode_buffer.index);
                Err(err)
            }
        }
    }

    /// Collect every completion posted so far.
    ///
    /// Completions for unknown handles are counted and skipped. A lost
    /// service is reported only once the frames already collected have been
    /// handed out.
    pub fn poll(&mut self) -> Result<Vec<DecodedFrame>, TransformError> {
        let mut decoded = Vec::new();
        loop {
            match self.completions.try_recv() {
                Ok(completion) => match self.complete(completion) {
                    Ok(frame) => decoded.push(frame),
                    Err(err) => {
                        warn!("Completion ignored: {}", err);
                        self.statistics.unknown_completions += 1;
                    }
                },
                Err(TryRecvError::Empty) => return Ok(decoded),
                Err(TryRecvError::Disconnected)
                    if self.in_flight.is_empty() || !decoded.is_empty() =>
                {
                    return Ok(decoded)
                }
                Err(TryRecvError::Disconnected) => return Err(TransformError::Disconnected),
            }
        }
    }

    fn complete(&mut self, completion: TransformCompletion) -> Result<DecodedFrame, TransformError> {
        let DecodeContext { frame } = self
            .in_flight
            .remove(&completion.handle)
            .ok_or(TransformError::UnknownHandle(completion.handle.0))?;
        self.statistics.completed += 1;

        let quality = if completion.is_ok() {
            DecodeQuality::Full
        } else {
            self.statistics.degraded += 1;
            warn!(
                "Transform {} reported hardware error {:#x}{}",
                completion.handle,
                completion.status,
                completion
                    .return_parameters
                    .map(|p| format!(" ({} damaged macroblocks)", p.error_macroblocks))
                    .unwrap_or_default()
            );
            DecodeQuality::Degraded
        };

        Ok(DecodedFrame {
            playback_time: frame.coded.parameters.playback_time,
            decode_time: frame.coded.parameters.decode_time,
            key_frame: frame.key_frame,
            quality,
            hardware_status: completion.status,
            presentation: frame.presentation,
            buffer: frame.decode_buffer,
        })
    }
}
