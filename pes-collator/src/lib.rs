//! Incremental PES video collation.
//!
//! This crate turns a PES-wrapped video elementary stream, delivered in
//! fragments of arbitrary size, into whole coded frames ready for a frame
//! parser.
//!
//! # Data Flow
//!
//! ```text
//!  fragments ──> Collator ──┬─> PES header ──> PTS/DTS ──┐
//!                           ├─> padding ──> skipped      │
//!                           └─> ES bytes ──> scanner     │
//!                                               │        │
//!                              start codes ──> CodedFrameBuffer
//!                                               │
//!                                  partition ──> CodedFrame ──> FrameSink
//! ```
//!
//! # Example
//!
//! ```rust
//! use pes_collator::pes::build_pes_packet;
//! use pes_collator::{Collator, CollatorConfig, CodedFrame, InputDescriptor};
//!
//! // A sequence header, then a sequence end code.
//! let payload = [0x00, 0x00, 0x01, 0xB3, 0x16, 0x00, 0xF0, 0x15, 0x00, 0x00, 0x01, 0xB7];
//! let packet = build_pes_packet(0xE0, Some(90_000), None, &payload);
//!
//! let mut collator = Collator::with_config(CollatorConfig::mpeg2_video());
//! let mut frames: Vec<CodedFrame> = Vec::new();
//! for fragment in packet.chunks(5) {
//!     collator.input(&InputDescriptor::default(), fragment, &mut frames).unwrap();
//! }
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(&frames[0].data[..], &payload[..]);
//! assert_eq!(frames[0].parameters.playback_time, Some(90_000));
//! ```

pub mod bits;
pub mod buffer;
pub mod collator;
pub mod config;
pub mod error;
pub mod pes;
pub mod scanner;
pub mod types;

pub use bits::BitCursor;
pub use collator::{
    CollatedHeaderHandler, Collator, CollatorState, CollatorStatistics, ConfiguredBoundaries,
    HeaderFlags, HeaderKind,
};
pub use config::{CollatorConfig, IgnoreRange, MarkerFamily, TerminateRule};
pub use error::{BitError, CollatorError, Result, Status};
pub use types::{
    CodedFrame, CodedFrameParameters, FrameSink, InputDescriptor, StartCode, PTS_CLOCK_HZ,
};
