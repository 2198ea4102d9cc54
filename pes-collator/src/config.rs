//! Collator configuration.
//!
//! Each codec supplies one immutable [`CollatorConfig`] value. Supporting a new
//! codec means writing a new value, not new control flow.

use serde::{Deserialize, Serialize};

/// Default maximum size of one coded frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;
/// Default capacity of the per-frame start-code list.
pub const DEFAULT_MAX_START_CODES: usize = 1024;

/// The byte pattern that introduces codec markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerFamily {
    /// `00 00 01 <code>` start codes.
    Mpeg,
    /// `FF <marker>` markers; PES framing still uses `00 00 01 <id>`.
    Jpeg,
}

impl MarkerFamily {
    /// Length of one codec marker including its code byte.
    pub fn marker_size(self) -> usize {
        match self {
            MarkerFamily::Mpeg => crate::types::MPEG_START_CODE_SIZE,
            MarkerFamily::Jpeg => crate::types::JPEG_MARKER_SIZE,
        }
    }
}

/// Inclusive range of code bytes that never structure a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRange {
    pub start: u8,
    pub end: u8,
}

impl IgnoreRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// A range covering exactly one code.
    pub const fn single(code: u8) -> Self {
        Self {
            start: code,
            end: code,
        }
    }

    pub fn contains(&self, code: u8) -> bool {
        (self.start..=self.end).contains(&code)
    }
}

/// Mask/value terminate-code comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateRule {
    pub code: u8,
    pub mask: u8,
    /// Terminate on the next matching code rather than this one.
    #[serde(default)]
    pub deferred: bool,
}

impl TerminateRule {
    pub fn matches(&self, code: u8) -> bool {
        code & self.mask == self.code & self.mask
    }
}

/// Immutable per-codec collator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollatorConfig {
    /// Name used in log messages.
    pub name: String,
    /// Marker family of the elementary stream.
    pub family: MarkerFamily,
    /// Code bytes that are accumulated as payload.
    pub ignore_ranges: Vec<IgnoreRange>,
    /// PES stream ids are accepted when `id & mask == code`.
    pub stream_identifier_mask: u8,
    pub stream_identifier_code: u8,
    /// Direct terminate-code comparison, in addition to the header handler.
    pub terminate: Option<TerminateRule>,
    /// Code that ends a frame including itself.
    pub terminal_code: Option<u8>,
    /// Append a terminal code to every flushed frame.
    pub insert_frame_terminate_code: bool,
    /// Largest coded frame accepted.
    pub max_frame_size: usize,
    /// Capacity of the start-code list.
    pub max_start_codes: usize,
}

impl Default for CollatorConfig {
    fn default() -> Self {
        Self::mpeg2_video()
    }
}

impl CollatorConfig {
    /// MPEG-2 video elementary stream carried in PES.
    pub fn mpeg2_video() -> Self {
        Self {
            name: "Pes-Mpeg2-Video".to_string(),
            family: MarkerFamily::Mpeg,
            // Slices after the first carry no frame structure.
            ignore_ranges: vec![IgnoreRange::new(0x02, 0xAF)],
            stream_identifier_mask: 0xF0,
            stream_identifier_code: 0xE0,
            terminate: None,
            terminal_code: Some(0xB7),
            insert_frame_terminate_code: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_start_codes: DEFAULT_MAX_START_CODES,
        }
    }

    /// Motion JPEG carried in PES.
    pub fn mjpeg() -> Self {
        let mut ignore_ranges = vec![IgnoreRange::single(0x00), IgnoreRange::single(0xFF)];
        // RST0..RST7 sit inside entropy coded data.
        ignore_ranges.extend((0xD0..=0xD7).map(IgnoreRange::single));

        Self {
            name: "Pes-Mjpeg-Video".to_string(),
            family: MarkerFamily::Jpeg,
            ignore_ranges,
            stream_identifier_mask: 0xF0,
            stream_identifier_code: 0xE0,
            terminate: Some(TerminateRule {
                code: 0xD8,
                mask: 0xFF,
                deferred: true,
            }),
            terminal_code: Some(0xD9),
            insert_frame_terminate_code: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_start_codes: DEFAULT_MAX_START_CODES,
        }
    }

    /// Whether `code` falls in one of the ignore ranges.
    pub fn is_ignored(&self, code: u8) -> bool {
        self.ignore_ranges.iter().any(|range| range.contains(code))
    }

    /// Whether a video PES stream id belongs to this stream.
    pub fn accepts_stream_id(&self, id: u8) -> bool {
        id & self.stream_identifier_mask == self.stream_identifier_code
    }
}
