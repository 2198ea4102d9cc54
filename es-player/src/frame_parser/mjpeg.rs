//! Motion JPEG frame parser.
//!
//! Each collated frame is one JPEG image. The parser picks out:
//!
//! ```text
//! FF D8              start of image; decode starts here
//! FF E0  "AVI1" p    field indicator (0 progressive, 1 first field, 2 second field)
//! FF E3  sig\0 s d   stream parameters: time_scale:32, time_delta:32
//! FF C0 / FF C1      start of frame; commits the frame
//! ```
//!
//! Every other marker is skipped.

use pes_collator::types::JPEG_MARKER_SIZE;
use pes_collator::{BitCursor, CodedFrame, CollatedHeaderHandler, CollatorConfig, ConfiguredBoundaries};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{FrameParser, ParserState, Result};
use crate::decode::buffer::DecodeBufferProvider;
use crate::error::FrameParserError;
use crate::types::{
    Codec, ColorSpace, Decimation, Dimensions, FrameParameters, FrameRate, ParsedFrame,
    PixelFormat, PresentationDescription, ScanType, StreamParameters,
};

pub const MARKER_START_OF_IMAGE: u8 = 0xD8;
pub const MARKER_END_OF_IMAGE: u8 = 0xD9;
pub const MARKER_START_OF_FRAME_BASELINE: u8 = 0xC0;
pub const MARKER_START_OF_FRAME_EXTENDED: u8 = 0xC1;
pub const MARKER_APP0: u8 = 0xE0;

/// APPn marker carrying the stream parameters unless configured otherwise.
pub const DEFAULT_METADATA_MARKER: u8 = 0xE3;
pub const DEFAULT_METADATA_SIGNATURE: &str = "STMicroelectronics";
/// Hard maximum of components in a start-of-frame header.
pub const MAX_COMPONENTS: usize = 4;

const AVI1_IDENTIFIER: &[u8] = b"AVI1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MjpegConfig {
    /// APPn marker holding the stream parameters.
    pub metadata_marker: u8,
    /// Signature that must open the metadata block.
    pub signature: String,
    pub max_components: usize,
}

impl Default for MjpegConfig {
    fn default() -> Self {
        Self {
            metadata_marker: DEFAULT_METADATA_MARKER,
            signature: DEFAULT_METADATA_SIGNATURE.to_string(),
            max_components: MAX_COMPONENTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MjpegStreamParameters {
    pub time_scale: u32,
    pub time_delta: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MjpegComponent {
    pub id: u8,
    pub horizontal_sampling: u8,
    pub vertical_sampling: u8,
    pub quantization_table: u8,
}

/// Field carried by the image, from the AVI1 APP0 block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldIndicator {
    #[default]
    Progressive,
    FirstField,
    SecondField,
}

impl FieldIndicator {
    fn from_polarity(polarity: u8) -> Self {
        match polarity {
            1 => FieldIndicator::FirstField,
            2 => FieldIndicator::SecondField,
            _ => FieldIndicator::Progressive,
        }
    }
}

/// Start-of-frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MjpegFrameHeader {
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<MjpegComponent>,
    pub field: FieldIndicator,
}

impl MjpegFrameHeader {
    /// Pixel format implied by the component sampling factors.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        match self.components.as_slice() {
            [_] => Ok(PixelFormat::Monochrome),
            [luma, cb, cr] => {
                if (cb.horizontal_sampling, cb.vertical_sampling) != (1, 1)
                    || (cr.horizontal_sampling, cr.vertical_sampling) != (1, 1)
                {
                    return Err(FrameParserError::HeaderSyntax("unsupported chroma sampling"));
                }
                match (luma.horizontal_sampling, luma.vertical_sampling) {
                    (2, 2) => Ok(PixelFormat::Yuv420),
                    (2, 1) => Ok(PixelFormat::Yuv422),
                    (1, 1) => Ok(PixelFormat::Yuv444),
                    _ => Err(FrameParserError::HeaderSyntax("unsupported luma sampling")),
                }
            }
            _ => Err(FrameParserError::HeaderSyntax("unsupported component layout")),
        }
    }
}

/// Read a start-of-frame segment (the bytes after the marker).
pub fn read_start_of_frame(segment: &[u8], max_components: usize) -> Result<MjpegFrameHeader> {
    let mut bits = BitCursor::new(segment);
    let _length = bits.get(16)?;
    let precision = bits.get(8)? as u8;
    let height = bits.get(16)? as u16;
    let width = bits.get(16)? as u16;
    let count = bits.get(8)? as usize;

    if count > max_components {
        return Err(FrameParserError::TooManyComponents {
            count,
            max: max_components,
        });
    }
    if count == 0 {
        return Err(FrameParserError::HeaderSyntax("no components"));
    }

    let mut components = Vec::with_capacity(count);
    for _ in 0..count {
        components.push(MjpegComponent {
            id: bits.get(8)? as u8,
            horizontal_sampling: bits.get(4)? as u8,
            vertical_sampling: bits.get(4)? as u8,
            quantization_table: bits.get(8)? as u8,
        });
    }

    Ok(MjpegFrameHeader {
        precision,
        height,
        width,
        components,
        field: FieldIndicator::Progressive,
    })
}

/// Collate-time boundaries for MJPEG come entirely from the collator configuration.
pub fn collator_config() -> CollatorConfig {
    CollatorConfig::mjpeg()
}

pub struct MjpegFrameParser {
    config: MjpegConfig,
    state: ParserState,
    field: FieldIndicator,
}

impl MjpegFrameParser {
    pub fn new(config: MjpegConfig, decimation: Decimation) -> Self {
        Self {
            config,
            state: ParserState::new(decimation),
            field: FieldIndicator::Progressive,
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    fn read_metadata(&mut self, segment: &[u8]) -> Result<()> {
        let payload = segment.get(2..).unwrap_or(&[]);
        let Some(end) = payload.iter().position(|&b| b == 0) else {
            return Ok(());
        };
        if &payload[..end] != self.config.signature.as_bytes() {
            // Other writers use the same APPn marker.
            trace!("Ignoring APP{:X} block with foreign signature", self.config.metadata_marker & 0x0F);
            return Ok(());
        }

        let mut bits = BitCursor::new(&payload[end + 1..]);
        let time_scale = bits.get(32)?;
        let time_delta = bits.get(32)?;
        self.state
            .set_stream_parameters(StreamParameters::Mjpeg(MjpegStreamParameters {
                time_scale,
                time_delta,
            }));
        Ok(())
    }

    fn read_field_indicator(&mut self, segment: &[u8]) {
        let payload = segment.get(2..).unwrap_or(&[]);
        if payload.starts_with(AVI1_IDENTIFIER) {
            if let Some(&polarity) = payload.get(AVI1_IDENTIFIER.len()) {
                self.field = FieldIndicator::from_polarity(polarity);
            }
        }
    }
}

fn describe(
    stream: &StreamParameters,
    frame: &FrameParameters,
) -> Result<PresentationDescription> {
    let StreamParameters::Mjpeg(stream) = stream else {
        return Err(FrameParserError::NoStreamParameters);
    };
    let FrameParameters::Mjpeg(header) = frame else {
        return Err(FrameParserError::PartialFrameParameters);
    };

    let dimensions = Dimensions::new(header.width as u32, header.height as u32);
    if dimensions.is_empty() {
        return Err(FrameParserError::HeaderSyntax("zero picture size"));
    }

    let scan = match header.field {
        FieldIndicator::Progressive => ScanType::Progressive,
        FieldIndicator::FirstField => ScanType::Interlaced {
            top_field_first: true,
        },
        FieldIndicator::SecondField => ScanType::Interlaced {
            top_field_first: false,
        },
    };

    Ok(PresentationDescription {
        dimensions,
        pixel_format: header.pixel_format()?,
        frame_rate: FrameRate::new(stream.time_scale, stream.time_delta),
        scan,
        color_space: ColorSpace::Bt601,
    })
}

impl FrameParser for MjpegFrameParser {
    fn codec(&self) -> Codec {
        Codec::Mjpeg
    }

    fn collator_config(&self) -> CollatorConfig {
        collator_config()
    }

    fn header_handler(&self) -> Box<dyn CollatedHeaderHandler> {
        Box::new(ConfiguredBoundaries)
    }

    fn parse_frame(
        &mut self,
        frame: CodedFrame,
        provider: &mut dyn DecodeBufferProvider,
    ) -> Result<Option<ParsedFrame>> {
        self.field = FieldIndicator::Progressive;
        let mut start_of_image = None;
        let mut commit_at = None;

        for code in &frame.start_codes {
            let segment = frame
                .data
                .get(code.offset + JPEG_MARKER_SIZE..)
                .unwrap_or(&[]);
            match code.code {
                MARKER_START_OF_IMAGE => start_of_image = Some(code.offset),
                MARKER_START_OF_FRAME_BASELINE | MARKER_START_OF_FRAME_EXTENDED => {
                    let Some(offset) = start_of_image else {
                        self.state.discard_frame();
                        return Err(FrameParserError::StartOfFrameBeforeStartOfImage);
                    };
                    let mut header = read_start_of_frame(segment, self.config.max_components)?;
                    header.field = self.field;
                    self.state.set_frame_parameters(FrameParameters::Mjpeg(header));
                    commit_at = Some(offset);
                    break;
                }
                marker if marker == self.config.metadata_marker => self.read_metadata(segment)?,
                MARKER_APP0 => self.read_field_indicator(segment),
                _ => {}
            }
        }

        let Some(data_offset) = commit_at else {
            debug!("MJPEG frame without start of frame ({} bytes)", frame.len());
            return Ok(None);
        };

        self.state
            .commit(frame, data_offset, true, describe, provider)
            .map(Some)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.field = FieldIndicator::Progressive;
    }
}
