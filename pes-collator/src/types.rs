//! Values exchanged between the collator and its consumers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// MPEG-style start code prefix (`00 00 01`).
pub const START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];
/// Size of an MPEG-style start code including the code byte.
pub const MPEG_START_CODE_SIZE: usize = 4;
/// Size of a JPEG-style marker (`FF xx`).
pub const JPEG_MARKER_SIZE: usize = 2;
/// PTS/DTS clock rate.
pub const PTS_CLOCK_HZ: u64 = 90_000;
/// PTS/DTS values wrap at 33 bits.
pub const PTS_MASK: u64 = (1 << 33) - 1;

/// One marker recorded inside a coded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCode {
    /// Offset of the first marker byte within the frame.
    pub offset: usize,
    /// Code byte (the byte following the prefix).
    pub code: u8,
}

impl StartCode {
    pub fn new(offset: usize, code: u8) -> Self {
        Self { offset, code }
    }
}

/// Per-frame side information produced by the collator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedFrameParameters {
    /// Presentation time (90 kHz), if the stream carried one for this frame.
    pub playback_time: Option<u64>,
    /// Decode time (90 kHz), if the stream carried one for this frame.
    pub decode_time: Option<u64>,
    /// The frame follows a jump in the input.
    pub stream_discontinuity: bool,
    /// The frame is provably the last of a contiguous run.
    pub followed_by_stream_terminate: bool,
}

impl CodedFrameParameters {
    /// Whether a presentation time is attached.
    pub fn playback_time_valid(&self) -> bool {
        self.playback_time.is_some()
    }

    /// Whether a decode time is attached.
    pub fn decode_time_valid(&self) -> bool {
        self.decode_time.is_some()
    }
}

/// A fully collated frame: coded bytes, the markers found in them and the timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedFrame {
    pub data: Bytes,
    pub start_codes: Vec<StartCode>,
    pub parameters: CodedFrameParameters,
}

impl CodedFrame {
    /// Length of the coded data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Side-channel metadata supplied with an input fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputDescriptor {
    /// Presentation time extracted by the caller (overrides the running value).
    pub playback_time: Option<u64>,
    /// Decode time extracted by the caller.
    pub decode_time: Option<u64>,
    /// The fragment does not follow on from the previous one.
    pub discontinuity: bool,
}

impl InputDescriptor {
    /// Descriptor carrying a caller supplied presentation time.
    pub fn with_playback_time(pts: u64) -> Self {
        Self {
            playback_time: Some(pts & PTS_MASK),
            ..Self::default()
        }
    }
}

/// Receiver of collated frames.
pub trait FrameSink {
    fn accept(&mut self, frame: CodedFrame);
}

impl FrameSink for Vec<CodedFrame> {
    fn accept(&mut self, frame: CodedFrame) {
        self.push(frame);
    }
}
