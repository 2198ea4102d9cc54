//! PES video collator.
//!
//! Turns PES-wrapped elementary stream data, delivered in fragments of any
//! size, into whole coded frames. PES headers are stripped and their PTS/DTS
//! attached to the frame that owns them, padding packets are skipped, and
//! codec start codes are recorded in a per-frame list. A codec supplied
//! [`CollatedHeaderHandler`] (and/or the configured [`TerminateRule`]) decides
//! which codes start a new frame.
//!
//! All state survives between [`Collator::input`] calls, so a fragment may end
//! anywhere: inside a start code, inside a PES header or inside padding.
//!
//! [`TerminateRule`]: crate::config::TerminateRule

use bytes::Bytes;
use log::{debug, trace, warn};
use serde::Serialize;

use crate::buffer::{CodedFrameBuffer, StartCodeList};
use crate::config::{CollatorConfig, MarkerFamily};
use crate::error::Result;
use crate::pes::{
    self, PesHeader, PES_INITIAL_HEADER_SIZE, PES_PADDING_INITIAL_HEADER_SIZE,
    PES_PADDING_START_CODE, ZERO_START_CODE_HEADER_SIZE,
};
use crate::scanner::{find_next_start_code, scan_for_spanning_start_code};
use crate::types::{
    CodedFrame, CodedFrameParameters, FrameSink, InputDescriptor, StartCode, MPEG_START_CODE_SIZE,
};

/// Flags returned by a header handler for one start code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags {
    /// The code begins a new frame.
    pub partition_point: bool,
}

impl HeaderFlags {
    pub fn partition_point() -> Self {
        Self {
            partition_point: true,
        }
    }
}

/// Codec hooks consulted while collating.
pub trait CollatedHeaderHandler: Send {
    /// Extra bytes after the code that `present_collated_header` needs to see.
    fn required_presentation_length(&self, _code: u8) -> usize {
        0
    }

    /// Classify a start code; `header` holds the bytes following the code.
    fn present_collated_header(&mut self, code: u8, header: &[u8]) -> HeaderFlags;

    /// Forget any per-frame state (called on reset, flush and discard).
    fn reset_collated_header_state(&mut self) {}
}

/// Handler for codecs whose boundaries are fully described by configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredBoundaries;

impl CollatedHeaderHandler for ConfiguredBoundaries {
    fn present_collated_header(&mut self, _code: u8, _header: &[u8]) -> HeaderFlags {
        HeaderFlags::default()
    }
}

/// Kind of extended header being pulled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// `00 00 01 00`, possibly the lead-in of a PES header.
    ZeroStartCode,
    /// PES header of our stream.
    Pes,
    /// PES header of another video stream.
    ForeignPes,
    /// Padding packet header.
    Padding,
    /// Codec start code.
    Generic,
}

/// Collator state carried between input calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollatorState {
    /// Looking for the next code.
    Idle,
    /// A code has been seen; its header is accumulating at `start` in the frame buffer.
    AccumulatingHeader {
        kind: HeaderKind,
        start: usize,
        desired: usize,
    },
    /// Consuming padding (or a foreign packet) without scanning.
    Skipping { remaining: usize },
}

/// PTS/DTS pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Timestamps {
    pts: Option<u64>,
    dts: Option<u64>,
}

impl Timestamps {
    fn is_valid(&self) -> bool {
        self.pts.is_some()
    }
}

/// Timing taken from PES headers, with the shadow copy used for codes that
/// straddle a PES header.
#[derive(Debug, Clone, Copy, Default)]
struct PesTiming {
    current: Timestamps,
    spanning: Timestamps,
    /// Frame offset where the latest PES payload began, until its first code is seen.
    payload_start: Option<usize>,
}

impl PesTiming {
    fn on_pes_header(&mut self, parsed: Timestamps, payload_start: usize) {
        self.resolve_without_span();
        self.spanning = std::mem::take(&mut self.current);
        self.current = parsed;
        self.payload_start = Some(payload_start);
    }

    /// A code starting at frame offset `offset` was found. Returns true when the
    /// code began before the latest PES header.
    fn on_code(&mut self, offset: usize) -> bool {
        match self.payload_start {
            Some(start) if offset < start => {
                self.payload_start = None;
                true
            }
            Some(_) => {
                self.resolve_without_span();
                false
            }
            None => false,
        }
    }

    /// No code spanned the header: an unused shadow falls back into the current timing.
    fn resolve_without_span(&mut self) {
        if !self.current.is_valid() && self.spanning.is_valid() {
            self.current = self.spanning;
        }
        self.spanning = Timestamps::default();
        self.payload_start = None;
    }

    /// Timing for a frame that starts here.
    fn take_for_new_frame(&mut self, spans: bool) -> Timestamps {
        let timing = if self.current.is_valid() {
            self.current
        } else if spans {
            self.spanning
        } else {
            Timestamps::default()
        };
        *self = Self::default();
        timing
    }
}

/// Counters kept by the collator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollatorStatistics {
    pub frames: u64,
    pub pes_headers: u64,
    pub padding_packets: u64,
    pub foreign_packets: u64,
    pub discarded: u64,
    pub errors: u64,
}

/// Incremental PES video collator.
pub struct Collator {
    config: CollatorConfig,
    handler: Box<dyn CollatedHeaderHandler>,
    buffer: CodedFrameBuffer,
    start_codes: StartCodeList,
    /// Parameters of the frame being assembled.
    frame: CodedFrameParameters,
    state: CollatorState,
    timing: PesTiming,
    /// Dropping data until the next accepted PES header.
    discarding: bool,
    /// Deferred terminate seen; the next match ends the frame.
    pending_terminate: bool,
    statistics: CollatorStatistics,
}

impl std::fmt::Debug for Collator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collator")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("accumulated", &self.buffer.len())
            .field("start_codes", &self.start_codes.len())
            .field("discarding", &self.discarding)
            .finish()
    }
}

impl Collator {
    /// Create a collator with a codec header handler.
    pub fn new(config: CollatorConfig, handler: Box<dyn CollatedHeaderHandler>) -> Self {
        let buffer = CodedFrameBuffer::new(config.max_frame_size);
        let start_codes = StartCodeList::new(config.max_start_codes);
        Self {
            config,
            handler,
            buffer,
            start_codes,
            frame: CodedFrameParameters::default(),
            state: CollatorState::Idle,
            timing: PesTiming::default(),
            discarding: true,
            pending_terminate: false,
            statistics: CollatorStatistics::default(),
        }
    }

    /// Create a collator whose boundaries come from configuration alone.
    pub fn with_config(config: CollatorConfig) -> Self {
        Self::new(config, Box::new(ConfiguredBoundaries))
    }

    pub fn config(&self) -> &CollatorConfig {
        &self.config
    }

    pub fn state(&self) -> CollatorState {
        self.state
    }

    pub fn statistics(&self) -> CollatorStatistics {
        self.statistics
    }

    /// Bytes accumulated for the open frame.
    pub fn accumulated(&self) -> usize {
        self.buffer.len()
    }

    /// Consume one fragment of input.
    ///
    /// All of `data` is consumed. Complete frames are handed to `sink` in
    /// stream order. A malformed or oversized frame is discarded and processing
    /// carries on with the rest of the fragment; the first such error is
    /// returned once the fragment has been consumed.
    pub fn input(
        &mut self,
        descriptor: &InputDescriptor,
        data: &[u8],
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        self.act_on_input_descriptor(descriptor, sink);

        let mut remaining = data;
        let mut first_error = None;
        while !remaining.is_empty() || self.header_ready() {
            if let Err(err) = self.step(&mut remaining, sink) {
                warn!("{}: {}; discarding accumulated data", self.config.name, err);
                self.statistics.errors += 1;
                self.discard_accumulated_data();
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Emit the open frame, if any, as the last of a contiguous run.
    pub fn flush(&mut self, sink: &mut dyn FrameSink) {
        self.state = CollatorState::Idle;
        self.frame.followed_by_stream_terminate = true;
        self.emit_frame(sink, false);
        self.frame.followed_by_stream_terminate = false;
        self.pending_terminate = false;
        self.handler.reset_collated_header_state();
    }

    /// Handle a jump in the input.
    ///
    /// With surplus data injected the open frame is thrown away, otherwise it is
    /// flushed. Either way the next frame is marked as a discontinuity and all
    /// timing is forgotten.
    pub fn input_jump(&mut self, surplus_data_injected: bool, sink: &mut dyn FrameSink) {
        if surplus_data_injected {
            self.discard_accumulated_data();
        } else {
            self.flush(sink);
        }
        self.timing = PesTiming::default();
        self.frame.stream_discontinuity = true;
    }

    /// Drop the open frame and return to the initial state.
    ///
    /// Calling this repeatedly, or with nothing accumulated, has no further effect.
    pub fn discard_accumulated_data(&mut self) {
        if !self.buffer.is_empty() || !self.start_codes.is_empty() {
            self.statistics.discarded += 1;
        }
        self.buffer.clear();
        self.start_codes.clear();
        self.frame = CodedFrameParameters::default();
        self.state = CollatorState::Idle;
        self.timing = PesTiming::default();
        self.discarding = true;
        self.pending_terminate = false;
        self.handler.reset_collated_header_state();
    }

    fn act_on_input_descriptor(&mut self, descriptor: &InputDescriptor, sink: &mut dyn FrameSink) {
        if descriptor.discontinuity {
            self.input_jump(false, sink);
        }
        if let Some(pts) = descriptor.playback_time {
            self.timing.current = Timestamps {
                pts: Some(pts),
                dts: descriptor.decode_time,
            };
            if self.buffer.is_empty() {
                self.assign_current_timing();
            }
        }
    }

    fn header_ready(&self) -> bool {
        match self.state {
            CollatorState::AccumulatingHeader { start, desired, .. } => {
                self.buffer.len() - start >= desired
            }
            _ => false,
        }
    }

    /// Move `count` bytes from the input into the frame. The input advances
    /// even when the frame overflows.
    fn accumulate(&mut self, remaining: &mut &[u8], count: usize) -> Result<()> {
        let (bytes, rest) = remaining.split_at(count);
        *remaining = rest;
        self.buffer.append(bytes)
    }

    fn step(&mut self, remaining: &mut &[u8], sink: &mut dyn FrameSink) -> Result<()> {
        match self.state {
            CollatorState::AccumulatingHeader {
                kind,
                start,
                desired,
            } => {
                let current = self.buffer.len() - start;
                if current < desired {
                    let transfer = remaining.len().min(desired - current);
                    self.accumulate(remaining, transfer)?;
                    if current + transfer < desired {
                        return Ok(());
                    }
                }
                self.process_header(kind, start, desired, sink)
            }
            CollatorState::Skipping { remaining: skip } => {
                let count = skip.min(remaining.len());
                *remaining = &remaining[count..];
                self.state = if count == skip {
                    CollatorState::Idle
                } else {
                    CollatorState::Skipping {
                        remaining: skip - count,
                    }
                };
                Ok(())
            }
            CollatorState::Idle => self.scan(remaining),
        }
    }

    /// Look for the next code, accumulating everything up to and including it.
    fn scan(&mut self, remaining: &mut &[u8]) -> Result<()> {
        let size = match scan_for_spanning_start_code(self.buffer.tail(3), remaining, &self.config)
        {
            Some(spanning) if spanning.in_head > remaining.len() => {
                // Too little data to tell; keep it and wait.
                let count = remaining.len();
                return self.accumulate(remaining, count);
            }
            Some(spanning) => {
                self.accumulate(remaining, spanning.in_head)?;
                spanning.size
            }
            None => match find_next_start_code(remaining, &self.config) {
                Some(found) => {
                    self.accumulate(remaining, found.end())?;
                    found.size
                }
                None => {
                    let count = remaining.len();
                    return self.accumulate(remaining, count);
                }
            },
        };

        let start = self.buffer.len() - size;
        let code = self.buffer.as_slice()[self.buffer.len() - 1];
        trace!("{}: code {:02x} at {}", self.config.name, code, start);
        self.classify(code, start, size);
        Ok(())
    }

    fn classify(&mut self, code: u8, start: usize, size: usize) {
        let framing = size == MPEG_START_CODE_SIZE;
        let state = if framing && self.config.family == MarkerFamily::Mpeg && code == 0x00 {
            Some((HeaderKind::ZeroStartCode, ZERO_START_CODE_HEADER_SIZE))
        } else if framing && pes::is_pes_framing_code(code) {
            Some(self.framing_header(code))
        } else if self.discarding {
            // Still looking for a PES header: codec data is of no use yet.
            self.buffer.clear();
            self.start_codes.clear();
            None
        } else {
            Some((
                HeaderKind::Generic,
                size + self.handler.required_presentation_length(code),
            ))
        };

        self.state = match state {
            Some((kind, desired)) => CollatorState::AccumulatingHeader {
                kind,
                start,
                desired,
            },
            None => CollatorState::Idle,
        };
    }

    fn framing_header(&self, code: u8) -> (HeaderKind, usize) {
        if code == PES_PADDING_START_CODE {
            (HeaderKind::Padding, PES_PADDING_INITIAL_HEADER_SIZE)
        } else if self.config.accepts_stream_id(code) {
            (HeaderKind::Pes, PES_INITIAL_HEADER_SIZE)
        } else {
            (HeaderKind::ForeignPes, PES_PADDING_INITIAL_HEADER_SIZE)
        }
    }

    fn process_header(
        &mut self,
        kind: HeaderKind,
        start: usize,
        desired: usize,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        let current = self.buffer.len() - start;
        match kind {
            HeaderKind::ZeroStartCode => {
                let header = self.buffer.from_offset(start);
                if header[4] == 0x00 && header[5] == 0x01 && pes::is_pes_framing_code(header[6]) {
                    // `00 00 01 00 00 01 <id>`: the dangling lead-in stays in
                    // the frame and the real header starts three bytes in.
                    let (kind, desired) = self.framing_header(header[6]);
                    self.state = CollatorState::AccumulatingHeader {
                        kind,
                        start: start + 3,
                        desired,
                    };
                } else if self.discarding {
                    self.buffer.clear();
                    self.start_codes.clear();
                    self.state = CollatorState::Idle;
                } else {
                    self.state = CollatorState::AccumulatingHeader {
                        kind: HeaderKind::Generic,
                        start,
                        desired: MPEG_START_CODE_SIZE
                            + self.handler.required_presentation_length(0x00),
                    };
                }
                Ok(())
            }
            HeaderKind::Pes => {
                let size = pes::pes_header_size(self.buffer.from_offset(start))?;
                let desired = size.unwrap_or(current + 1);
                if current < desired {
                    self.state = CollatorState::AccumulatingHeader {
                        kind,
                        start,
                        desired,
                    };
                    return Ok(());
                }
                self.state = CollatorState::Idle;
                let header = self.buffer.wind_back(current);
                let parsed = PesHeader::parse(&header[..desired])?;
                self.on_pes_header(&parsed);
                self.buffer.append(&header[desired..])
            }
            HeaderKind::Padding | HeaderKind::ForeignPes => {
                let header = self.buffer.wind_back(current);
                let skip = pes::padding_skip_length(&header);
                let already = current - desired;
                if kind == HeaderKind::Padding {
                    self.statistics.padding_packets += 1;
                } else {
                    self.statistics.foreign_packets += 1;
                    debug!(
                        "{}: skipping packet of stream {:02x} ({} bytes)",
                        self.config.name, header[3], skip
                    );
                    if skip == 0 {
                        // Unbounded foreign packet: nothing to resynchronise on but the next header.
                        self.discarding = true;
                        self.state = CollatorState::Idle;
                        return Ok(());
                    }
                }
                self.state = match skip.saturating_sub(already) {
                    0 => CollatorState::Idle,
                    remaining => CollatorState::Skipping { remaining },
                };
                Ok(())
            }
            HeaderKind::Generic => {
                self.state = CollatorState::Idle;
                self.process_generic(start, current, sink)
            }
        }
    }

    fn on_pes_header(&mut self, header: &PesHeader) {
        self.statistics.pes_headers += 1;
        if self.discarding {
            self.buffer.clear();
            self.start_codes.clear();
            self.discarding = false;
        }

        trace!(
            "{}: PES {:02x} pts {:?} dts {:?}",
            self.config.name,
            header.stream_id,
            header.pts,
            header.dts
        );
        self.timing.on_pes_header(
            Timestamps {
                pts: header.pts,
                dts: header.dts,
            },
            self.buffer.len(),
        );

        if self.buffer.is_empty() && self.timing.current.is_valid() {
            self.assign_current_timing();
        }
    }

    fn assign_current_timing(&mut self) {
        let timing = std::mem::take(&mut self.timing.current);
        self.frame.playback_time = timing.pts;
        self.frame.decode_time = timing.dts;
    }

    fn process_generic(
        &mut self,
        start: usize,
        current: usize,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        let size = self.config.family.marker_size();
        let header = self.buffer.from_offset(start);
        let code = header[size - 1];
        let flags = self.handler.present_collated_header(code, &header[size..]);
        let spans = self.timing.on_code(start);

        let mut terminate = flags.partition_point;
        if let Some(rule) = self.config.terminate {
            if rule.matches(code) {
                if !rule.deferred || self.pending_terminate {
                    terminate = true;
                }
                self.pending_terminate = rule.deferred;
            }
        }

        if self.config.terminal_code == Some(code) {
            // The terminal code closes the frame it belongs to.
            self.start_codes.push(StartCode::new(start, code))?;
            self.frame.followed_by_stream_terminate = true;
            self.emit_frame(sink, spans);
            self.frame.followed_by_stream_terminate = false;
            self.pending_terminate = false;
            self.handler.reset_collated_header_state();
            return Ok(());
        }

        let start = if terminate {
            let code_bytes = self.buffer.wind_back(current);
            self.emit_frame(sink, spans);
            self.buffer.append(&code_bytes)?;
            0
        } else {
            if spans {
                self.timing.resolve_without_span();
            }
            start
        };
        self.start_codes.push(StartCode::new(start, code))
    }

    /// Hand the open frame to `sink` and start the next one.
    fn emit_frame(&mut self, sink: &mut dyn FrameSink, spans: bool) {
        if self.buffer.is_empty() {
            self.start_codes.clear();
            return;
        }

        if self.config.insert_frame_terminate_code {
            self.insert_frame_terminate_code();
        }

        let data: Bytes = self.buffer.take();
        let start_codes = self.start_codes.take();
        let parameters = std::mem::take(&mut self.frame);
        debug!(
            "{}: frame of {} bytes, {} codes, pts {:?}",
            self.config.name,
            data.len(),
            start_codes.len(),
            parameters.playback_time
        );
        self.statistics.frames += 1;
        sink.accept(CodedFrame {
            data,
            start_codes,
            parameters,
        });

        let timing = self.timing.take_for_new_frame(spans);
        self.frame.playback_time = timing.pts;
        self.frame.decode_time = timing.dts;
    }

    fn insert_frame_terminate_code(&mut self) {
        let Some(terminal) = self.config.terminal_code else {
            return;
        };
        if self.start_codes.as_slice().last().map(|c| c.code) == Some(terminal) {
            return;
        }
        let marker: &[u8] = match self.config.family {
            MarkerFamily::Mpeg => &[0x00, 0x00, 0x01, terminal],
            MarkerFamily::Jpeg => &[0xFF, terminal],
        };
        if let Err(err) = self.buffer.append(marker) {
            warn!("{}: failed to add terminal code: {}", self.config.name, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerminateRule;
    use crate::error::CollatorError;
    use crate::pes::build_pes_packet;

    /// Picture-boundary handler shaped like the MPEG-2 one.
    #[derive(Default)]
    struct PictureBoundaries {
        picture_seen: bool,
    }

    impl CollatedHeaderHandler for PictureBoundaries {
        fn present_collated_header(&mut self, code: u8, _header: &[u8]) -> HeaderFlags {
            let boundary = matches!(code, 0xB3 | 0xB8 | 0x00) && self.picture_seen;
            if boundary {
                self.picture_seen = false;
            }
            if code == 0x00 {
                self.picture_seen = true;
            }
            HeaderFlags {
                partition_point: boundary,
            }
        }

        fn reset_collated_header_state(&mut self) {
            self.picture_seen = false;
        }
    }

    fn mpeg_collator() -> Collator {
        Collator::new(
            CollatorConfig::mpeg2_video(),
            Box::new(PictureBoundaries::default()),
        )
    }

    /// Sequence header (optional), picture, first slice and a second slice.
    fn es_frame(sequence: bool) -> Vec<u8> {
        let mut data = Vec::new();
        if sequence {
            data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB3]);
            data.extend_from_slice(&[0x16, 0x00, 0xF0, 0x15, 0xFF, 0xFF, 0xE0, 0x18]);
        }
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, 0xFF, 0xF8]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x01, 0x11, 0x22, 0x33, 0x44]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x02, 0x55, 0x66]);
        data
    }

    fn two_frame_stream() -> Vec<u8> {
        let mut stream = build_pes_packet(0xE0, Some(9000), None, &es_frame(true));
        stream.extend(build_pes_packet(0xE0, Some(12600), Some(9000), &es_frame(false)));
        stream
    }

    fn collate_in_chunks(collator: &mut Collator, stream: &[u8], chunk: usize) -> Vec<CodedFrame> {
        let mut frames = Vec::new();
        for fragment in stream.chunks(chunk) {
            collator
                .input(&InputDescriptor::default(), fragment, &mut frames)
                .unwrap();
        }
        collator.flush(&mut frames);
        frames
    }

    #[test]
    fn test_collates_frames_at_picture_boundaries() {
        let mut collator = mpeg_collator();
        let stream = two_frame_stream();
        let frames = collate_in_chunks(&mut collator, &stream, stream.len());

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0].data[..], &es_frame(true)[..]);
        assert_eq!(
            frames[0].start_codes,
            vec![
                StartCode::new(0, 0xB3),
                StartCode::new(12, 0x00),
                StartCode::new(20, 0x01)
            ]
        );
        assert_eq!(frames[0].parameters.playback_time, Some(9000));
        assert_eq!(frames[0].parameters.decode_time, None);
        assert!(!frames[0].parameters.followed_by_stream_terminate);

        assert_eq!(&frames[1].data[..], &es_frame(false)[..]);
        assert_eq!(
            frames[1].start_codes,
            vec![StartCode::new(0, 0x00), StartCode::new(8, 0x01)]
        );
        assert_eq!(frames[1].parameters.playback_time, Some(12600));
        assert_eq!(frames[1].parameters.decode_time, Some(9000));
        assert!(frames[1].parameters.followed_by_stream_terminate);

        let statistics = collator.statistics();
        assert_eq!(statistics.frames, 2);
        assert_eq!(statistics.pes_headers, 2);
    }

    #[test]
    fn test_fragmentation_invariance() {
        let mut stream = two_frame_stream();
        stream.extend(build_pes_packet(0xBE, None, None, &[0xFF; 20]));
        stream.extend(build_pes_packet(0xE0, None, None, &es_frame(false)));
        stream.extend(build_pes_packet(0xE0, Some(19800), None, &es_frame(true)));

        let whole = collate_in_chunks(&mut mpeg_collator(), &stream, stream.len());
        assert_eq!(whole.len(), 4);
        for chunk in [1, 2, 3, 4, 5, 7, 11, 13, 64] {
            let frames = collate_in_chunks(&mut mpeg_collator(), &stream, chunk);
            assert_eq!(frames, whole, "chunk size {}", chunk);
        }

        // Irregular sizes.
        let mut collator = mpeg_collator();
        let mut frames = Vec::new();
        let mut rest = &stream[..];
        for size in [1, 9, 2, 17, 3, 3, 40, 1, 1, 6].iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let (fragment, tail) = rest.split_at((*size).min(rest.len()));
            collator
                .input(&InputDescriptor::default(), fragment, &mut frames)
                .unwrap();
            rest = tail;
        }
        collator.flush(&mut frames);
        assert_eq!(frames, whole);
    }

    #[test]
    fn test_start_code_split_across_inputs() {
        let mut payload = es_frame(true);
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, 0xFF, 0xF8, 0x77]);
        let packet = build_pes_packet(0xE0, Some(9000), None, &payload);
        let boundary = packet.len() - 9;

        let expected = collate_in_chunks(&mut mpeg_collator(), &packet, packet.len());
        assert_eq!(expected.len(), 2);
        assert_eq!(expected[1].start_codes, vec![StartCode::new(0, 0x00)]);

        for split in 1..=3 {
            let mut collator = mpeg_collator();
            let mut frames = Vec::new();
            let at = boundary + split;
            collator
                .input(&InputDescriptor::default(), &packet[..at], &mut frames)
                .unwrap();
            collator
                .input(&InputDescriptor::default(), &packet[at..], &mut frames)
                .unwrap();
            collator.flush(&mut frames);
            assert_eq!(frames, expected, "split {}/{}", split, 4 - split);
        }
    }

    #[test]
    fn test_spanning_code_keeps_earlier_timestamp() {
        // Packet 1 continues the open frame and ends with the first two bytes
        // of the next picture code; packet 2 completes it.
        let tail = [0x10, 0x20, 0x00, 0x00];
        let head = [0x01, 0x00, 0x00, 0x0F, 0xFF, 0xF8, 0x30];

        let build = |second_pts: Option<u64>| {
            let mut stream = build_pes_packet(0xE0, Some(1000), None, &es_frame(true));
            stream.extend(build_pes_packet(0xE0, Some(2000), None, &tail));
            stream.extend(build_pes_packet(0xE0, second_pts, None, &head));
            stream
        };

        for (second_pts, expected) in [(None, 2000), (Some(3000), 3000)] {
            let stream = build(second_pts);
            for chunk in [1, 5, stream.len()] {
                let frames = collate_in_chunks(&mut mpeg_collator(), &stream, chunk);
                assert_eq!(frames.len(), 2);
                assert_eq!(frames[0].parameters.playback_time, Some(1000));
                assert!(frames[0].data.ends_with(&[0x10, 0x20]));
                assert_eq!(&frames[1].data[..4], &[0x00, 0x00, 0x01, 0x00]);
                assert_eq!(frames[1].parameters.playback_time, Some(expected));
            }
        }
    }

    #[test]
    fn test_unused_timestamp_carries_to_next_frame() {
        // Packet 2 holds no frame start, so its PTS waits for the next one.
        let mut stream = build_pes_packet(0xE0, Some(1000), None, &es_frame(true));
        stream.extend(build_pes_packet(0xE0, Some(2000), None, &[0x42; 6]));
        stream.extend(build_pes_packet(0xE0, None, None, &es_frame(false)));

        let frames = collate_in_chunks(&mut mpeg_collator(), &stream, stream.len());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].parameters.playback_time, Some(1000));
        assert_eq!(frames[1].parameters.playback_time, Some(2000));
    }

    #[test]
    fn test_dts_without_pts_discards_and_recovers() {
        let mut bad = build_pes_packet(0xE0, None, None, &[]);
        // PTS_DTS_flags = 01 with one timestamp worth of header data.
        bad[7] = 0x40;
        bad[8] = 5;
        bad.extend_from_slice(&[0x11, 0x00, 0x01, 0x00, 0x01]);
        let length = bad.len() - 6;
        bad[4] = (length >> 8) as u8;
        bad[5] = length as u8;

        let mut stream = build_pes_packet(0xE0, Some(9000), None, &es_frame(true));
        stream.extend(bad);
        stream.extend(build_pes_packet(0xE0, Some(12600), None, &es_frame(true)));

        let mut collator = mpeg_collator();
        let mut frames = Vec::new();
        let result = collator.input(&InputDescriptor::default(), &stream, &mut frames);
        assert_eq!(result, Err(CollatorError::DtsWithoutPts));
        collator.flush(&mut frames);

        // The frame open at the error is gone; the next one is intact.
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], &es_frame(true)[..]);
        assert_eq!(frames[0].parameters.playback_time, Some(12600));
        assert_eq!(collator.statistics().errors, 1);
    }

    #[test]
    fn test_ignored_codes_kept_verbatim() {
        let mut payload = es_frame(true);
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0xAF, 0x01, 0x02]);
        let stream = build_pes_packet(0xE0, Some(9000), None, &payload);
        let frames = collate_in_chunks(&mut mpeg_collator(), &stream, 3);

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], &payload[..]);
        assert!(frames[0]
            .start_codes
            .iter()
            .all(|code| code.code == 0xB3 || code.code <= 0x01));
    }

    #[test]
    fn test_discard_is_idempotent() {
        let mut collator = mpeg_collator();
        collator.discard_accumulated_data();
        collator.discard_accumulated_data();
        assert_eq!(collator.state(), CollatorState::Idle);
        assert_eq!(collator.statistics().discarded, 0);

        let stream = two_frame_stream();
        let mut frames = Vec::new();
        collator
            .input(&InputDescriptor::default(), &stream[..30], &mut frames)
            .unwrap();
        collator.discard_accumulated_data();
        collator.discard_accumulated_data();
        assert_eq!(collator.accumulated(), 0);
        assert_eq!(collator.statistics().discarded, 1);

        let fresh = collate_in_chunks(&mut collator, &stream, 7);
        assert_eq!(fresh, collate_in_chunks(&mut mpeg_collator(), &stream, 7));
    }

    #[test]
    fn test_data_before_first_pes_header_is_dropped() {
        let mut stream = es_frame(true);
        stream.extend(two_frame_stream());
        let frames = collate_in_chunks(&mut mpeg_collator(), &stream, 4);
        assert_eq!(frames, collate_in_chunks(&mut mpeg_collator(), &two_frame_stream(), 4));
    }

    #[test]
    fn test_padding_is_skipped() {
        let mut stream = build_pes_packet(0xE0, Some(9000), None, &es_frame(true)[..20]);
        // Padding that looks like start codes must not be scanned.
        stream.extend(build_pes_packet(0xBE, None, None, &[0x00, 0x00, 0x01, 0xB3, 0xFF]));
        stream.extend(build_pes_packet(0xE0, None, None, &es_frame(true)[20..]));

        let mut collator = mpeg_collator();
        let frames = collate_in_chunks(&mut collator, &stream, 2);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], &es_frame(true)[..]);
        assert_eq!(collator.statistics().padding_packets, 1);
    }

    #[test]
    fn test_foreign_stream_is_skipped() {
        let mut config = CollatorConfig::mpeg2_video();
        config.stream_identifier_mask = 0xFF;
        config.stream_identifier_code = 0xE0;
        let mut collator = Collator::new(config, Box::new(PictureBoundaries::default()));

        let mut stream = build_pes_packet(0xE0, Some(9000), None, &es_frame(true));
        stream.extend(build_pes_packet(0xE1, Some(1), None, &es_frame(true)));
        let frames = collate_in_chunks(&mut collator, &stream, 5);

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], &es_frame(true)[..]);
        assert_eq!(collator.statistics().foreign_packets, 1);
    }

    #[test]
    fn test_zero_code_followed_by_pes_header() {
        // The payload ends in a bare prefix whose code byte arrives after the
        // next PES header.
        let mut first = es_frame(true);
        first.extend_from_slice(&[0x00, 0x00, 0x01]);
        let mut stream = build_pes_packet(0xE0, Some(9000), None, &first);
        stream.extend(build_pes_packet(0xE0, Some(12600), None, &[0x00, 0x00, 0x0F, 0xFF, 0xF8]));

        for chunk in [1, 3, stream.len()] {
            let frames = collate_in_chunks(&mut mpeg_collator(), &stream, chunk);
            assert_eq!(frames.len(), 2, "chunk size {}", chunk);
            assert_eq!(&frames[0].data[..], &es_frame(true)[..]);
            assert_eq!(
                &frames[1].data[..],
                &[0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, 0xFF, 0xF8]
            );
            assert_eq!(frames[1].parameters.playback_time, Some(12600));
        }
    }

    #[test]
    fn test_terminal_code_ends_frame() {
        let mut payload = es_frame(true);
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0xB7]);
        let stream = build_pes_packet(0xE0, Some(9000), None, &payload);

        let mut collator = mpeg_collator();
        let mut frames = Vec::new();
        collator
            .input(&InputDescriptor::default(), &stream, &mut frames)
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].data[..], &payload[..]);
        assert_eq!(frames[0].start_codes.last(), Some(&StartCode::new(34, 0xB7)));
        assert!(frames[0].parameters.followed_by_stream_terminate);
        assert_eq!(collator.accumulated(), 0);
    }

    #[test]
    fn test_deferred_terminate() {
        let mut collator = Collator::with_config(CollatorConfig::mjpeg());
        let image = |fill: u8| vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x02, fill, fill, 0xFF, 0xD0, fill];

        let mut payload = image(0x11);
        payload.extend(image(0x22));
        payload.extend(image(0x33));
        payload.extend_from_slice(&[0xFF, 0xD9]);
        let stream = build_pes_packet(0xE0, Some(500), None, &payload);

        let mut frames = Vec::new();
        for fragment in stream.chunks(3) {
            collator
                .input(&InputDescriptor::default(), fragment, &mut frames)
                .unwrap();
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0].data[..], &image(0x11)[..]);
        assert_eq!(
            frames[0].start_codes,
            vec![StartCode::new(0, 0xD8), StartCode::new(2, 0xC0)]
        );
        assert_eq!(frames[0].parameters.playback_time, Some(500));
        assert_eq!(&frames[2].data[..11], &image(0x33)[..]);
        assert_eq!(frames[2].start_codes.last(), Some(&StartCode::new(11, 0xD9)));
    }

    #[test]
    fn test_frame_terminate_insertion() {
        let mut config = CollatorConfig::mpeg2_video();
        config.insert_frame_terminate_code = true;
        let mut collator = Collator::new(config, Box::new(PictureBoundaries::default()));

        let frames = collate_in_chunks(&mut collator, &two_frame_stream(), 9);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].data.ends_with(&[0x00, 0x00, 0x01, 0xB7]));
        assert_eq!(frames[0].start_codes.len(), 3);
    }

    #[test]
    fn test_terminate_rule_without_handler() {
        let mut config = CollatorConfig::mpeg2_video();
        config.terminate = Some(TerminateRule {
            code: 0xB3,
            mask: 0xFF,
            deferred: false,
        });
        let mut collator = Collator::with_config(config);
        let mut payload = es_frame(true);
        payload.extend(es_frame(true));
        let stream = build_pes_packet(0xE0, Some(9000), None, &payload);

        let frames = collate_in_chunks(&mut collator, &stream, 6);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].parameters.playback_time, None);
    }

    #[test]
    fn test_overflow_discards_frame() {
        let mut config = CollatorConfig::mpeg2_video();
        config.max_frame_size = 16;
        let mut collator = Collator::new(config, Box::new(PictureBoundaries::default()));

        let stream = build_pes_packet(0xE0, Some(9000), None, &es_frame(true));
        let mut frames = Vec::new();
        let result = collator.input(&InputDescriptor::default(), &stream, &mut frames);
        assert!(matches!(result, Err(CollatorError::BufferOverflow { max: 16, .. })));
        assert!(frames.is_empty());
    }

    #[test]
    fn test_input_jump_marks_discontinuity() {
        let mut collator = mpeg_collator();
        let stream = two_frame_stream();
        let mut frames = Vec::new();
        collator
            .input(&InputDescriptor::default(), &stream, &mut frames)
            .unwrap();
        assert_eq!(frames.len(), 1);

        let descriptor = InputDescriptor {
            discontinuity: true,
            ..InputDescriptor::default()
        };
        collator.input(&descriptor, &stream, &mut frames).unwrap();
        collator.flush(&mut frames);

        assert_eq!(frames.len(), 4);
        assert!(frames[1].parameters.followed_by_stream_terminate);
        assert!(frames[2].parameters.stream_discontinuity);
        assert!(!frames[3].parameters.stream_discontinuity);
    }

    #[test]
    fn test_descriptor_playback_time_overrides() {
        let mut collator = mpeg_collator();
        let stream = build_pes_packet(0xE0, None, None, &es_frame(true));
        let mut frames = Vec::new();
        collator
            .input(&InputDescriptor::with_playback_time(4242), &stream, &mut frames)
            .unwrap();
        collator.flush(&mut frames);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].parameters.playback_time, Some(4242));
    }
}
