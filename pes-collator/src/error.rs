//! Error and status types for PES collation.

use thiserror::Error;

/// Errors raised by the bit cursor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitError {
    /// A read or skip ran past the end of the underlying bytes.
    #[error("Bit cursor exhausted: requested {requested} bits, {available} available")]
    Exhausted { requested: usize, available: usize },

    /// More than 32 bits were requested in a single read.
    #[error("Invalid bit count: {0}")]
    InvalidWidth(u32),
}

/// Errors raised while collating a PES stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollatorError {
    /// PES header could not be interpreted.
    #[error("Malformed PES header: {0}")]
    MalformedPes(&'static str),

    /// PES header flags a DTS without a PTS.
    #[error("Malformed PES header: DTS present without PTS")]
    DtsWithoutPts,

    /// PES header data does not fit inside the declared packet.
    #[error("PES header length {header_data_length} inconsistent with packet length {packet_length}")]
    PesHeaderLength {
        header_data_length: usize,
        packet_length: usize,
    },

    /// Coded frame grew past the configured maximum.
    #[error("Coded frame buffer overflow: {size} bytes (max: {max})")]
    BufferOverflow { size: usize, max: usize },

    /// Start-code list is full.
    #[error("Start code list full ({0} entries)")]
    StartCodeListFull(usize),

    /// A header was shorter than its syntax requires.
    #[error("Truncated header: {0}")]
    Truncated(#[from] BitError),
}

impl CollatorError {
    /// Returns true for errors caused by the content of the stream itself.
    ///
    /// Anything else is a resource error (the stream may be fine, our limits are not).
    pub fn is_malformed_stream(&self) -> bool {
        !matches!(
            self,
            CollatorError::BufferOverflow { .. } | CollatorError::StartCodeListFull(_)
        )
    }
}

/// Per-call status code shared by the collator, frame parser and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    /// Operation succeeded.
    Success = 0x0000,
    /// Unknown error occurred.
    Unknown = 0x0001,

    /// PES header could not be interpreted.
    MalformedPes = 0x0101,
    /// PES header flags a DTS without a PTS.
    DtsWithoutPts = 0x0102,
    /// PES header length does not fit the packet.
    PesHeaderLength = 0x0103,
    /// Coded frame exceeded the maximum size.
    BufferOverflow = 0x0104,
    /// Start-code list exceeded its capacity.
    StartCodeListFull = 0x0105,
    /// Header shorter than its syntax.
    Truncated = 0x0106,

    /// No stream-level header has been parsed.
    NoStreamParameters = 0x0201,
    /// The frame-level header is missing or incomplete.
    PartialFrameParameters = 0x0202,
    /// Start-of-frame declares too many components.
    TooManyComponents = 0x0203,
    /// Start-of-frame seen before start-of-image.
    StartOfFrameBeforeStartOfImage = 0x0204,
    /// Header field holds an illegal value.
    HeaderSyntax = 0x0205,

    /// No decode buffer could be obtained.
    DecodeBufferUnavailable = 0x0301,
    /// Transform service refused or lost a request.
    TransformFailed = 0x0302,
}

impl From<u16> for Status {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Status::Success,
            0x0101 => Status::MalformedPes,
            0x0102 => Status::DtsWithoutPts,
            0x0103 => Status::PesHeaderLength,
            0x0104 => Status::BufferOverflow,
            0x0105 => Status::StartCodeListFull,
            0x0106 => Status::Truncated,
            0x0201 => Status::NoStreamParameters,
            0x0202 => Status::PartialFrameParameters,
            0x0203 => Status::TooManyComponents,
            0x0204 => Status::StartOfFrameBeforeStartOfImage,
            0x0205 => Status::HeaderSyntax,
            0x0301 => Status::DecodeBufferUnavailable,
            0x0302 => Status::TransformFailed,
            _ => Status::Unknown,
        }
    }
}

impl From<Status> for u16 {
    fn from(value: Status) -> Self {
        value as u16
    }
}

impl Status {
    /// Returns true if this status indicates success.
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Human readable name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::Unknown => "Unknown",
            Status::MalformedPes => "MalformedPes",
            Status::DtsWithoutPts => "DtsWithoutPts",
            Status::PesHeaderLength => "PesHeaderLength",
            Status::BufferOverflow => "BufferOverflow",
            Status::StartCodeListFull => "StartCodeListFull",
            Status::Truncated => "Truncated",
            Status::NoStreamParameters => "NoStreamParameters",
            Status::PartialFrameParameters => "PartialFrameParameters",
            Status::TooManyComponents => "TooManyComponents",
            Status::StartOfFrameBeforeStartOfImage => "StartOfFrameBeforeStartOfImage",
            Status::HeaderSyntax => "HeaderSyntax",
            Status::DecodeBufferUnavailable => "DecodeBufferUnavailable",
            Status::TransformFailed => "TransformFailed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&CollatorError> for Status {
    fn from(err: &CollatorError) -> Self {
        match err {
            CollatorError::MalformedPes(_) => Status::MalformedPes,
            CollatorError::DtsWithoutPts => Status::DtsWithoutPts,
            CollatorError::PesHeaderLength { .. } => Status::PesHeaderLength,
            CollatorError::BufferOverflow { .. } => Status::BufferOverflow,
            CollatorError::StartCodeListFull(_) => Status::StartCodeListFull,
            CollatorError::Truncated(_) => Status::Truncated,
        }
    }
}

/// Result alias for collator operations.
pub type Result<T> = std::result::Result<T, CollatorError>;
