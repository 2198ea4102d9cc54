//! Video elementary stream playback on top of [`pes_collator`].
//!
//! A [`Stream`](stream::Stream) owns the whole pipeline for one video
//! stream:
//!
//! ```text
//!  PES fragments ──> Collator ──> CodedFrame ──> FrameParser ──> ParsedFrame
//!                                                    │               │
//!                                  DecodeBufferPool <┘               │
//!                                                                    v
//!        DecodedFrame <── completions <── TransformService <── DecodeCommand
//! ```
//!
//! Two codecs are supported: Motion JPEG ([`frame_parser::mjpeg`]) and
//! MPEG-2 video ([`frame_parser::mpeg2`]).

pub mod codec;
pub mod config;
pub mod decode;
pub mod error;
pub mod frame_parser;
pub mod logging;
pub mod stream;
pub mod types;

pub use config::PlayerConfig;
pub use error::StreamError;
pub use stream::{Stream, StreamStatistics};
pub use types::{Codec, DecodedFrame};
