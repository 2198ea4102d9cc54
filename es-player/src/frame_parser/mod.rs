//! Frame parsers.
//!
//! A frame parser walks the start-code list of one collated frame, decodes
//! the codec headers it finds and, once a frame header is complete, commits
//! the frame for decode. Committing checks that both stream and frame
//! parameters are present, derives the presentation description, notifies
//! the buffer provider of format changes and obtains a decode buffer.

pub mod mjpeg;
pub mod mpeg2;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::Arc;

use pes_collator::{CodedFrame, CollatedHeaderHandler, CollatorConfig};
use tracing::debug;

use crate::decode::buffer::DecodeBufferProvider;
use crate::error::FrameParserError;
use crate::types::{
    Codec, Decimation, FrameParameters, ParsedFrame, PixelFormat, PresentationDescription,
    StreamParameters,
};

pub use mjpeg::{MjpegConfig, MjpegFrameParser};
pub use mpeg2::Mpeg2FrameParser;

pub type Result<T> = std::result::Result<T, FrameParserError>;

/// Codec specific header decode and commit.
pub trait FrameParser: Send {
    fn codec(&self) -> Codec;

    /// Collator configuration matching this codec's marker syntax.
    fn collator_config(&self) -> CollatorConfig;

    /// Collate-time hooks deciding where frames start.
    fn header_handler(&self) -> Box<dyn CollatedHeaderHandler>;

    /// Parse one collated frame.
    ///
    /// Returns `Ok(None)` when the frame held headers only.
    fn parse_frame(
        &mut self,
        frame: CodedFrame,
        provider: &mut dyn DecodeBufferProvider,
    ) -> Result<Option<ParsedFrame>>;

    /// Forget all stream and frame state.
    fn reset(&mut self);
}

/// Create the parser for `codec`.
pub fn new_frame_parser(
    codec: Codec,
    mjpeg: &MjpegConfig,
    decimation: Decimation,
) -> Box<dyn FrameParser> {
    match codec {
        Codec::Mjpeg => Box::new(MjpegFrameParser::new(mjpeg.clone(), decimation)),
        Codec::Mpeg2 => Box::new(Mpeg2FrameParser::new(decimation)),
    }
}

/// Parameter bookkeeping shared by the codec parsers.
///
/// Stream parameters are reference counted: committed frames keep the
/// version they were decoded with, and a later update copies on write.
/// Frame parameters belong to the frame being parsed and are moved into
/// the [`ParsedFrame`] at commit.
#[derive(Debug, Default)]
pub struct ParserState {
    stream_parameters: Option<Arc<StreamParameters>>,
    updated_since_last_frame: bool,
    frame_parameters: Option<FrameParameters>,
    last_format: Option<PixelFormat>,
    decimation: Decimation,
}

impl ParserState {
    pub fn new(decimation: Decimation) -> Self {
        Self {
            decimation,
            ..Self::default()
        }
    }

    pub fn stream_parameters(&self) -> Option<&StreamParameters> {
        self.stream_parameters.as_deref()
    }

    /// Install new stream parameters; identical repeats are not an update.
    pub fn set_stream_parameters(&mut self, parameters: StreamParameters) {
        if self.stream_parameters.as_deref() == Some(&parameters) {
            return;
        }
        debug!("New stream parameters: {:?}", parameters);
        self.stream_parameters = Some(Arc::new(parameters));
        self.updated_since_last_frame = true;
    }

    pub fn updated_since_last_frame(&self) -> bool {
        self.updated_since_last_frame
    }

    pub fn frame_parameters(&self) -> Option<&FrameParameters> {
        self.frame_parameters.as_ref()
    }

    pub fn frame_parameters_mut(&mut self) -> Option<&mut FrameParameters> {
        self.frame_parameters.as_mut()
    }

    pub fn set_frame_parameters(&mut self, parameters: FrameParameters) {
        self.frame_parameters = Some(parameters);
    }

    /// Drop the frame parameters of an abandoned frame.
    pub fn discard_frame(&mut self) {
        self.frame_parameters = None;
    }

    pub fn reset(&mut self) {
        self.stream_parameters = None;
        self.updated_since_last_frame = false;
        self.frame_parameters = None;
        self.last_format = None;
    }

    /// Commit `coded` for decode.
    ///
    /// `describe` derives the presentation from the stream and frame
    /// parameters. The frame parameters are consumed whatever the outcome.
    pub fn commit<F>(
        &mut self,
        coded: CodedFrame,
        data_offset: usize,
        key_frame: bool,
        describe: F,
        provider: &mut dyn DecodeBufferProvider,
    ) -> Result<ParsedFrame>
    where
        F: FnOnce(&StreamParameters, &FrameParameters) -> Result<PresentationDescription>,
    {
        let frame_parameters = self.frame_parameters.take();
        let stream_parameters = self
            .stream_parameters
            .clone()
            .ok_or(FrameParserError::NoStreamParameters)?;
        let frame_parameters = frame_parameters.ok_or(FrameParserError::PartialFrameParameters)?;

        let presentation = describe(&stream_parameters, &frame_parameters)?;
        let format = presentation.pixel_format;
        if let Some(previous) = self.last_format.filter(|&previous| previous != format) {
            provider.notify_format_switch(previous, format);
        }
        self.last_format = Some(format);

        let dimensions = presentation.dimensions.decimated(self.decimation);
        let decode_buffer = provider.request_buffer(dimensions, format)?;

        Ok(ParsedFrame {
            coded,
            data_offset,
            key_frame,
            presentation,
            stream_parameters,
            new_stream_parameters: std::mem::take(&mut self.updated_since_last_frame),
            frame_parameters,
            decimation: self.decimation,
            decode_buffer,
        })
    }
}
