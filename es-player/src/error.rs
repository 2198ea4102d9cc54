//! Error types for frame parsing, decode buffers and transforms.

use pes_collator::{BitError, CollatorError, Status};
use thiserror::Error;

use crate::types::PixelFormat;

/// Errors from the decode buffer provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Every buffer is in use.
    #[error("Out of decode buffers ({0} in use)")]
    OutOfMemory(usize),

    /// The provider cannot produce this format.
    #[error("Unsupported decode buffer format: {0:?}")]
    UnsupportedFormat(PixelFormat),
}

/// Errors raised while parsing and committing one frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameParserError {
    /// Commit attempted before any stream header was seen.
    #[error("No stream parameters")]
    NoStreamParameters,

    /// Commit attempted without a complete frame header.
    #[error("Partial frame parameters")]
    PartialFrameParameters,

    /// Start-of-frame declares more components than supported.
    #[error("Too many components: {count} (max: {max})")]
    TooManyComponents { count: usize, max: usize },

    /// Start-of-frame seen before start-of-image.
    #[error("Start of frame before start of image")]
    StartOfFrameBeforeStartOfImage,

    /// A header field holds an illegal value.
    #[error("Header syntax error: {0}")]
    HeaderSyntax(&'static str),

    /// No decode buffer could be obtained.
    #[error("Decode buffer unavailable: {0}")]
    DecodeBufferUnavailable(#[from] BufferError),

    /// A header was shorter than its syntax requires.
    #[error("Truncated header: {0}")]
    Truncated(#[from] BitError),
}

impl FrameParserError {
    /// Resource errors are reported to the caller; everything else only costs the frame.
    pub fn is_resource_error(&self) -> bool {
        matches!(self, FrameParserError::DecodeBufferUnavailable(_))
    }
}

impl From<&FrameParserError> for Status {
    fn from(err: &FrameParserError) -> Self {
        match err {
            FrameParserError::NoStreamParameters => Status::NoStreamParameters,
            FrameParserError::PartialFrameParameters => Status::PartialFrameParameters,
            FrameParserError::TooManyComponents { .. } => Status::TooManyComponents,
            FrameParserError::StartOfFrameBeforeStartOfImage => {
                Status::StartOfFrameBeforeStartOfImage
            }
            FrameParserError::HeaderSyntax(_) => Status::HeaderSyntax,
            FrameParserError::DecodeBufferUnavailable(_) => Status::DecodeBufferUnavailable,
            FrameParserError::Truncated(_) => Status::Truncated,
        }
    }
}

/// Errors from the transform service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The command was refused.
    #[error("Transform rejected: {0}")]
    Rejected(String),

    /// A completion arrived for a handle that is not in flight.
    #[error("Unknown transform handle: {0}")]
    UnknownHandle(u64),

    /// The completion channel is gone.
    #[error("Transform service disconnected")]
    Disconnected,
}

/// Errors surfaced by a [`Stream`](crate::stream::Stream).
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Collator error: {0}")]
    Collator(#[from] CollatorError),

    #[error("Frame parser error: {0}")]
    Parser(#[from] FrameParserError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Status code reported for this error.
    pub fn status(&self) -> Status {
        match self {
            StreamError::Collator(err) => Status::from(err),
            StreamError::Parser(err) => Status::from(err),
            StreamError::Transform(_) => Status::TransformFailed,
            StreamError::Config(_) | StreamError::Io(_) => Status::Unknown,
        }
    }
}
