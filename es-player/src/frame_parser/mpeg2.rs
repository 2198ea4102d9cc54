//! MPEG-2 video frame parser.
//!
//! A collated frame holds at most one picture, optionally preceded by a
//! sequence header and a group of pictures header:
//!
//! ```text
//! B3 sequence header   B5/1 sequence extension   B8 group of pictures
//! 00 picture header    B5/8 picture coding extension
//! 01 first slice       (02..AF are folded into the frame by the collator)
//! B7 sequence end
//! ```
//!
//! The frame is committed at the first slice; everything before it is header.

use pes_collator::types::MPEG_START_CODE_SIZE;
use pes_collator::{BitCursor, CodedFrame, CollatedHeaderHandler, CollatorConfig, HeaderFlags};
use tracing::{debug, trace};

use super::{FrameParser, ParserState, Result};
use crate::decode::buffer::DecodeBufferProvider;
use crate::error::FrameParserError;
use crate::types::{
    Codec, ColorSpace, Decimation, Dimensions, FrameParameters, FrameRate, ParsedFrame,
    PixelFormat, PresentationDescription, ScanType, StreamParameters,
};

pub const PICTURE_START_CODE: u8 = 0x00;
pub const FIRST_SLICE_START_CODE: u8 = 0x01;
pub const SEQUENCE_HEADER_CODE: u8 = 0xB3;
pub const EXTENSION_START_CODE: u8 = 0xB5;
pub const SEQUENCE_END_CODE: u8 = 0xB7;
pub const GROUP_START_CODE: u8 = 0xB8;

const SEQUENCE_EXTENSION_ID: u32 = 0x1;
const PICTURE_CODING_EXTENSION_ID: u32 = 0x8;

/// `frame_rate_code` 1..=8 as (time_scale, time_delta).
const FRAME_RATES: [(u32, u32); 8] = [
    (24000, 1001),
    (24, 1),
    (25, 1),
    (30000, 1001),
    (30, 1),
    (50, 1),
    (60000, 1001),
    (60, 1),
];

/// Collate-time boundaries: a sequence, group or picture header starts a new
/// frame once the current one already holds a picture.
#[derive(Debug, Default)]
pub struct Mpeg2HeaderHandler {
    picture_seen: bool,
}

impl CollatedHeaderHandler for Mpeg2HeaderHandler {
    fn present_collated_header(&mut self, code: u8, _header: &[u8]) -> HeaderFlags {
        let boundary = matches!(
            code,
            SEQUENCE_HEADER_CODE | GROUP_START_CODE | PICTURE_START_CODE
        ) && self.picture_seen;
        if boundary {
            self.picture_seen = false;
        }
        if code == PICTURE_START_CODE {
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    pub horizontal_size: u16,
    pub vertical_size: u16,
    pub aspect_ratio_information: u8,
    pub frame_rate_code: u8,
    pub bit_rate_value: u32,
    pub vbv_buffer_size_value: u16,
    pub constrained_parameters: bool,
    pub intra_quantiser_matrix: Option<[u8; 64]>,
    pub non_intra_quantiser_matrix: Option<[u8; 64]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceExtension {
    pub profile_and_level: u8,
    pub progressive_sequence: bool,
    pub chroma_format: u8,
    pub horizontal_size_extension: u8,
    pub vertical_size_extension: u8,
    pub bit_rate_extension: u16,
    pub vbv_buffer_size_extension: u8,
    pub low_delay: bool,
    pub frame_rate_extension_n: u8,
    pub frame_rate_extension_d: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOfPictures {
    pub time_code: u32,
    pub closed_gop: bool,
    pub broken_link: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureCodingType {
    Intra,
    Predictive,
    Bidirectional,
    DcIntra,
}

impl TryFrom<u32> for PictureCodingType {
    type Error = FrameParserError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(PictureCodingType::Intra),
            2 => Ok(PictureCodingType::Predictive),
            3 => Ok(PictureCodingType::Bidirectional),
            4 => Ok(PictureCodingType::DcIntra),
            _ => Err(FrameParserError::HeaderSyntax("picture_coding_type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureHeader {
    pub temporal_reference: u16,
    pub coding_type: PictureCodingType,
    pub vbv_delay: u16,
    /// (full_pel_forward_vector, forward_f_code) of P and B pictures.
    pub forward: Option<(bool, u8)>,
    /// (full_pel_backward_vector, backward_f_code) of B pictures.
    pub backward: Option<(bool, u8)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureStructure {
    TopField,
    BottomField,
    Frame,
}

impl TryFrom<u32> for PictureStructure {
    type Error = FrameParserError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(PictureStructure::TopField),
            2 => Ok(PictureStructure::BottomField),
            3 => Ok(PictureStructure::Frame),
            _ => Err(FrameParserError::HeaderSyntax("picture_structure")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureCodingExtension {
    pub f_codes: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub picture_structure: PictureStructure,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub chroma_420_type: bool,
    pub progressive_frame: bool,
}

/// Sequence header plus its extension; MPEG-1 streams have no extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mpeg2StreamParameters {
    pub sequence: SequenceHeader,
    pub extension: Option<SequenceExtension>,
}

impl Mpeg2StreamParameters {
    pub fn dimensions(&self) -> Dimensions {
        let (width_ext, height_ext) = self
            .extension
            .map_or((0, 0), |ext| {
                (ext.horizontal_size_extension, ext.vertical_size_extension)
            });
        Dimensions::new(
            self.sequence.horizontal_size as u32 | (width_ext as u32) << 12,
            self.sequence.vertical_size as u32 | (height_ext as u32) << 12,
        )
    }

    pub fn frame_rate(&self) -> Option<FrameRate> {
        let index = (self.sequence.frame_rate_code as usize).checked_sub(1)?;
        let &(scale, delta) = FRAME_RATES.get(index)?;
        let (n, d) = self.extension.map_or((0, 0), |ext| {
            (ext.frame_rate_extension_n, ext.frame_rate_extension_d)
        });
        FrameRate::new(scale * (n as u32 + 1), delta * (d as u32 + 1))
    }

    pub fn pixel_format(&self) -> Result<PixelFormat> {
        match self.extension.map(|ext| ext.chroma_format) {
            None | Some(1) => Ok(PixelFormat::Yuv420),
            Some(2) => Ok(PixelFormat::Yuv422),
            Some(3) => Ok(PixelFormat::Yuv444),
            Some(_) => Err(FrameParserError::HeaderSyntax("chroma_format")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mpeg2PictureParameters {
    pub header: PictureHeader,
    pub coding_extension: Option<PictureCodingExtension>,
    /// Group of pictures header preceding this picture, if any.
    pub gop: Option<GroupOfPictures>,
}

impl Mpeg2PictureParameters {
    pub fn is_key_frame(&self) -> bool {
        self.header.coding_type == PictureCodingType::Intra
    }
}

fn read_quantiser_matrix(bits: &mut BitCursor) -> Result<Option<[u8; 64]>> {
    if !bits.get_flag()? {
        return Ok(None);
    }
    let mut matrix = [0u8; 64];
    for value in matrix.iter_mut() {
        *value = bits.get(8)? as u8;
    }
    Ok(Some(matrix))
}

pub fn read_sequence_header(body: &[u8]) -> Result<SequenceHeader> {
    let mut bits = BitCursor::new(body);
    let horizontal_size = bits.get(12)? as u16;
    let vertical_size = bits.get(12)? as u16;
    let aspect_ratio_information = bits.get(4)? as u8;
    let frame_rate_code = bits.get(4)? as u8;
    let bit_rate_value = bits.get(18)?;
    let _marker = bits.get(1)?;
    let vbv_buffer_size_value = bits.get(10)? as u16;
    let constrained_parameters = bits.get_flag()?;
    let intra_quantiser_matrix = read_quantiser_matrix(&mut bits)?;
    let non_intra_quantiser_matrix = read_quantiser_matrix(&mut bits)?;

    if !(1..=8).contains(&frame_rate_code) {
        return Err(FrameParserError::HeaderSyntax("frame_rate_code"));
    }
    if horizontal_size == 0 || vertical_size == 0 {
        return Err(FrameParserError::HeaderSyntax("zero picture size"));
    }

    Ok(SequenceHeader {
        horizontal_size,
        vertical_size,
        aspect_ratio_information,
        frame_rate_code,
        bit_rate_value,
        vbv_buffer_size_value,
        constrained_parameters,
        intra_quantiser_matrix,
        non_intra_quantiser_matrix,
    })
}

fn read_sequence_extension(bits: &mut BitCursor) -> Result<SequenceExtension> {
    let profile_and_level = bits.get(8)? as u8;
    let progressive_sequence = bits.get_flag()?;
    let chroma_format = bits.get(2)? as u8;
    let horizontal_size_extension = bits.get(2)? as u8;
    let vertical_size_extension = bits.get(2)? as u8;
    let bit_rate_extension = bits.get(12)? as u16;
    let _marker = bits.get(1)?;
    let vbv_buffer_size_extension = bits.get(8)? as u8;
    let low_delay = bits.get_flag()?;
    let frame_rate_extension_n = bits.get(2)? as u8;
    let frame_rate_extension_d = bits.get(5)? as u8;

    Ok(SequenceExtension {
        profile_and_level,
        progressive_sequence,
        chroma_format,
        horizontal_size_extension,
        vertical_size_extension,
        bit_rate_extension,
        vbv_buffer_size_extension,
        low_delay,
        frame_rate_extension_n,
        frame_rate_extension_d,
    })
}

fn read_picture_coding_extension(bits: &mut BitCursor) -> Result<PictureCodingExtension> {
    let mut f_codes = [[0u8; 2]; 2];
    for row in f_codes.iter_mut() {
        for f_code in row.iter_mut() {
            *f_code = bits.get(4)? as u8;
        }
    }

    Ok(PictureCodingExtension {
        f_codes,
        intra_dc_precision: bits.get(2)? as u8,
        picture_structure: PictureStructure::try_from(bits.get(2)?)?,
        top_field_first: bits.get_flag()?,
        frame_pred_frame_dct: bits.get_flag()?,
        concealment_motion_vectors: bits.get_flag()?,
        q_scale_type: bits.get_flag()?,
        intra_vlc_format: bits.get_flag()?,
        alternate_scan: bits.get_flag()?,
        repeat_first_field: bits.get_flag()?,
        chroma_420_type: bits.get_flag()?,
        progressive_frame: bits.get_flag()?,
    })
}

fn read_group_of_pictures(body: &[u8]) -> Result<GroupOfPictures> {
    let mut bits = BitCursor::new(body);
    Ok(GroupOfPictures {
        time_code: bits.get(25)?,
        closed_gop: bits.get_flag()?,
        broken_link: bits.get_flag()?,
    })
}

pub fn read_picture_header(body: &[u8]) -> Result<PictureHeader> {
    let mut bits = BitCursor::new(body);
    let temporal_reference = bits.get(10)? as u16;
    let coding_type = PictureCodingType::try_from(bits.get(3)?)?;
    let vbv_delay = bits.get(16)? as u16;

    let mut header = PictureHeader {
        temporal_reference,
        coding_type,
        vbv_delay,
        forward: None,
        backward: None,
    };
    if matches!(
        coding_type,
        PictureCodingType::Predictive | PictureCodingType::Bidirectional
    ) {
        header.forward = Some((bits.get_flag()?, bits.get(3)? as u8));
    }
    if coding_type == PictureCodingType::Bidirectional {
        header.backward = Some((bits.get_flag()?, bits.get(3)? as u8));
    }
    Ok(header)
}

fn describe(
    stream: &StreamParameters,
    frame: &FrameParameters,
) -> Result<PresentationDescription> {
    let StreamParameters::Mpeg2(stream) = stream else {
        return Err(FrameParserError::NoStreamParameters);
    };
    let FrameParameters::Mpeg2(picture) = frame else {
        return Err(FrameParserError::PartialFrameParameters);
    };

    let scan = match (stream.extension, picture.coding_extension) {
        (None, _) => ScanType::Progressive,
        // MPEG-2 pictures must carry a coding extension.
        (Some(_), None) => return Err(FrameParserError::PartialFrameParameters),
        (Some(sequence), Some(coding)) => match coding.picture_structure {
            PictureStructure::TopField => ScanType::Interlaced {
                top_field_first: true,
            },
            PictureStructure::BottomField => ScanType::Interlaced {
                top_field_first: false,
            },
            PictureStructure::Frame
                if sequence.progressive_sequence || coding.progressive_frame =>
            {
                ScanType::Progressive
            }
            PictureStructure::Frame => ScanType::Interlaced {
                top_field_first: coding.top_field_first,
            },
        },
    };

    let dimensions = stream.dimensions();
    Ok(PresentationDescription {
        dimensions,
        pixel_format: stream.pixel_format()?,
        frame_rate: stream.frame_rate(),
        scan,
        color_space: ColorSpace::for_height(dimensions.height),
    })
}

pub struct Mpeg2FrameParser {
    state: ParserState,
}

impl Mpeg2FrameParser {
    pub fn new(decimation: Decimation) -> Self {
        Self {
            state: ParserState::new(decimation),
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Decode the headers of `frame`; returns the first slice offset.
    fn read_headers(&mut self, frame: &CodedFrame) -> Result<Option<usize>> {
        let mut pending_sequence: Option<Mpeg2StreamParameters> = None;
        let mut gop = None;

        for code in &frame.start_codes {
            let body = frame
                .data
                .get(code.offset + MPEG_START_CODE_SIZE..)
                .unwrap_or(&[]);
            match code.code {
                SEQUENCE_HEADER_CODE => {
                    pending_sequence = Some(Mpeg2StreamParameters {
                        sequence: read_sequence_header(body)?,
                        extension: None,
                    });
                }
                EXTENSION_START_CODE => {
                    let mut bits = BitCursor::new(body);
                    match bits.get(4)? {
                        SEQUENCE_EXTENSION_ID => match pending_sequence.as_mut() {
                            Some(sequence) => {
                                sequence.extension = Some(read_sequence_extension(&mut bits)?)
                            }
                            None => trace!("Sequence extension without sequence header"),
                        },
                        PICTURE_CODING_EXTENSION_ID => {
                            let extension = read_picture_coding_extension(&mut bits)?;
                            match self.state.frame_parameters_mut() {
                                Some(FrameParameters::Mpeg2(picture)) => {
                                    picture.coding_extension = Some(extension)
                                }
                                _ => trace!("Picture coding extension without picture header"),
                            }
                        }
                        id => trace!("Skipping extension {:#x}", id),
                    }
                }
                GROUP_START_CODE => gop = Some(read_group_of_pictures(body)?),
                PICTURE_START_CODE => {
                    self.publish(&mut pending_sequence);
                    let header = read_picture_header(body)?;
                    self.state
                        .set_frame_parameters(FrameParameters::Mpeg2(Mpeg2PictureParameters {
                            header,
                            coding_extension: None,
                            gop: gop.take(),
                        }));
                }
                FIRST_SLICE_START_CODE => {
                    self.publish(&mut pending_sequence);
                    return Ok(Some(code.offset));
                }
                SEQUENCE_END_CODE => debug!("Sequence end"),
                _ => {}
            }
        }

        self.publish(&mut pending_sequence);
        Ok(None)
    }

    fn publish(&mut self, pending: &mut Option<Mpeg2StreamParameters>) {
        if let Some(sequence) = pending.take() {
            self.state
                .set_stream_parameters(StreamParameters::Mpeg2(sequence));
        }
    }
}

impl FrameParser for Mpeg2FrameParser {
    fn codec(&self) -> Codec {
        Codec::Mpeg2
    }

    fn collator_config(&self) -> CollatorConfig {
        CollatorConfig::mpeg2_video()
    }

    fn header_handler(&self) -> Box<dyn CollatedHeaderHandler> {
        Box::new(Mpeg2HeaderHandler::default())
    }

    fn parse_frame(
        &mut self,
        frame: CodedFrame,
        provider: &mut dyn DecodeBufferProvider,
    ) -> Result<Option<ParsedFrame>> {
        let data_offset = match self.read_headers(&frame) {
            Ok(Some(offset)) => offset,
            Ok(None) => {
                if self.state.frame_parameters().is_some() {
                    debug!("Picture without slices ({} bytes)", frame.len());
                    self.state.discard_frame();
                }
                return Ok(None);
            }
            Err(err) => {
                self.state.discard_frame();
                return Err(err);
            }
        };

        let key_frame = matches!(
            self.state.frame_parameters(),
            Some(FrameParameters::Mpeg2(picture)) if picture.is_key_frame()
        );
        self.state
            .commit(frame, data_offset, key_frame, describe, provider)
            .map(Some)
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::buffer::DecodeBufferPool;
    use crate::frame_parser::fixtures::*;

    fn parse_all(es: &[u8]) -> (Mpeg2FrameParser, Vec<Result<Option<ParsedFrame>>>) {
        let mut parser = Mpeg2FrameParser::new(Decimation::IDENTITY);
        let mut pool = DecodeBufferPool::new(8);
        let results = collate(&parser, es)
            .into_iter()
            .map(|frame| parser.parse_frame(frame, &mut pool))
            .collect();
        (parser, results)
    }

    #[test]
    fn test_header_handler_partitions_after_picture() {
        let mut handler = Mpeg2HeaderHandler::default();
        assert!(!handler.present_collated_header(SEQUENCE_HEADER_CODE, &[]).partition_point);
        assert!(!handler.present_collated_header(PICTURE_START_CODE, &[]).partition_point);
        assert!(!handler.present_collated_header(EXTENSION_START_CODE, &[]).partition_point);
        assert!(handler.present_collated_header(GROUP_START_CODE, &[]).partition_point);
        assert!(!handler.present_collated_header(PICTURE_START_CODE, &[]).partition_point);
        assert!(handler.present_collated_header(PICTURE_START_CODE, &[]).partition_point);

        handler.reset_collated_header_state();
        assert!(!handler.present_collated_header(SEQUENCE_HEADER_CODE, &[]).partition_point);
    }

    #[test]
    fn test_parse_sequence_and_intra_picture() {
        let mut es = mpeg2_sequence();
        es.extend(gop_header(true));
        es.extend(mpeg2_picture(0, 1));
        es.extend(sequence_end());
        let (parser, results) = parse_all(&es);

        assert_eq!(results.len(), 1);
        let parsed = results.into_iter().next().unwrap().unwrap().unwrap();
        let slice_offset = mpeg2_sequence().len()
            + gop_header(true).len()
            + picture_header(0, 1).len()
            + picture_coding_extension(3, false, true).len();
        assert_eq!(parsed.data_offset, slice_offset);
        assert!(parsed.key_frame);
        assert!(parsed.new_stream_parameters);
        assert!(parsed.coded.parameters.followed_by_stream_terminate);
        assert_eq!(parsed.playback_time(), Some(FIXTURE_PTS));
        assert_eq!(parsed.presentation.dimensions, Dimensions::new(720, 480));
        assert_eq!(parsed.presentation.pixel_format, PixelFormat::Yuv420);
        assert_eq!(
            parsed.presentation.frame_rate,
            Some(FrameRate {
                time_scale: 30000,
                time_delta: 1001
            })
        );
        assert_eq!(parsed.presentation.scan, ScanType::Progressive);
        assert_eq!(parsed.presentation.color_space, ColorSpace::Bt601);

        let FrameParameters::Mpeg2(picture) = &parsed.frame_parameters else {
            panic!("expected MPEG-2 picture parameters");
        };
        assert_eq!(picture.header.coding_type, PictureCodingType::Intra);
        assert_eq!(picture.gop.map(|gop| gop.closed_gop), Some(true));
        assert!(parser.state().frame_parameters().is_none());
    }

    #[test]
    fn test_picture_sequence() {
        let mut es = mpeg2_sequence();
        es.extend(mpeg2_picture(0, 1));
        es.extend(mpeg2_picture(3, 2));
        es.extend(mpeg2_picture(1, 3));
        let (_, results) = parse_all(&es);

        assert_eq!(results.len(), 3);
        let frames: Vec<ParsedFrame> = results
            .into_iter()
            .map(|result| result.unwrap().unwrap())
            .collect();
        assert_eq!(
            frames.iter().map(|f| f.key_frame).collect::<Vec<_>>(),
            vec![true, false, false]
        );
        assert!(frames[0].new_stream_parameters);
        assert!(!frames[1].new_stream_parameters);
        assert!(!frames[2].new_stream_parameters);
        assert_eq!(frames[1].data_offset, picture_header(3, 2).len() + 9);

        let FrameParameters::Mpeg2(b_picture) = &frames[2].frame_parameters else {
            panic!("expected MPEG-2 picture parameters");
        };
        assert_eq!(b_picture.header.temporal_reference, 1);
        assert_eq!(b_picture.header.forward, Some((false, 7)));
        assert_eq!(b_picture.header.backward, Some((false, 7)));
    }

    #[test]
    fn test_picture_before_sequence_header() {
        let (_, results) = parse_all(&mpeg2_picture(0, 1));
        assert_eq!(
            results[0].as_ref().unwrap_err(),
            &FrameParserError::NoStreamParameters
        );
    }

    #[test]
    fn test_missing_picture_coding_extension() {
        let mut es = mpeg2_sequence();
        es.extend(picture_header(0, 1));
        es.extend(slice(0x01));
        let (parser, results) = parse_all(&es);
        assert_eq!(
            results[0].as_ref().unwrap_err(),
            &FrameParserError::PartialFrameParameters
        );
        assert!(parser.state().stream_parameters().is_some());
    }

    #[test]
    fn test_mpeg1_sequence_without_extension() {
        let mut es = sequence_header(352, 288, 3);
        es.extend(picture_header(0, 1));
        es.extend(slice(0x01));
        let (_, results) = parse_all(&es);

        let parsed = results.into_iter().next().unwrap().unwrap().unwrap();
        assert_eq!(parsed.presentation.dimensions, Dimensions::new(352, 288));
        assert_eq!(parsed.presentation.pixel_format, PixelFormat::Yuv420);
        assert_eq!(parsed.presentation.scan, ScanType::Progressive);
        assert_eq!(
            parsed.presentation.frame_rate,
            Some(FrameRate {
                time_scale: 25,
                time_delta: 1
            })
        );
    }

    #[test]
    fn test_invalid_frame_rate_code() {
        let mut es = sequence_header(720, 480, 9);
        es.extend(mpeg2_picture(0, 1));
        let (parser, results) = parse_all(&es);
        assert_eq!(
            results[0].as_ref().unwrap_err(),
            &FrameParserError::HeaderSyntax("frame_rate_code")
        );
        assert!(parser.state().stream_parameters().is_none());
    }

    #[test]
    fn test_interlaced_pictures() {
        let picture = |structure, top_field_first| {
            let mut es = sequence_header(1920, 1088, 4);
            es.extend(sequence_extension(false, 2));
            es.extend(picture_header(0, 1));
            es.extend(picture_coding_extension(structure, top_field_first, false));
            es.extend(slice(0x01));
            let (_, results) = parse_all(&es);
            results.into_iter().next().unwrap().unwrap().unwrap()
        };

        let frame = picture(3, true);
        assert_eq!(
            frame.presentation.scan,
            ScanType::Interlaced {
                top_field_first: true
            }
        );
        assert_eq!(frame.presentation.pixel_format, PixelFormat::Yuv422);
        assert_eq!(frame.presentation.color_space, ColorSpace::Bt709);

        let field = picture(2, false);
        assert_eq!(
            field.presentation.scan,
            ScanType::Interlaced {
                top_field_first: false
            }
        );
    }

    #[test]
    fn test_sequence_header_quantiser_matrix() {
        let mut bits = BitWriter::default();
        bits.put(720, 12)
            .put(576, 12)
            .put(3, 4)
            .put(3, 4)
            .put(5000, 18)
            .put(1, 1)
            .put(112, 10)
            .put(0, 1)
            .put(1, 1);
        for i in 0..64 {
            bits.put(8 + i, 8);
        }
        bits.put(0, 1);
        let header = read_sequence_header(&bits.finish()).unwrap();

        assert_eq!(header.horizontal_size, 720);
        assert_eq!(header.vertical_size, 576);
        assert_eq!(header.bit_rate_value, 5000);
        let matrix = header.intra_quantiser_matrix.unwrap();
        assert_eq!(matrix[0], 8);
        assert_eq!(matrix[63], 71);
        assert!(header.non_intra_quantiser_matrix.is_none());
    }

    #[test]
    fn test_truncated_picture_header() {
        assert!(matches!(
            read_picture_header(&[0x00, 0x0F]),
            Err(FrameParserError::Truncated(_))
        ));
        assert_eq!(
            read_picture_header(&[0x00, 0x38, 0x00, 0x00]).unwrap_err(),
            FrameParserError::HeaderSyntax("picture_coding_type")
        );
    }

    #[test]
    fn test_frame_rate_extension() {
        let mut es = sequence_header(720, 480, 4);
        es.extend(sequence_extension(true, 1));
        let sequence = read_sequence_header(&es[4..]).unwrap();
        let mut parameters = Mpeg2StreamParameters {
            sequence,
            extension: None,
        };
        assert_eq!(parameters.frame_rate(), FrameRate::new(30000, 1001));

        let mut bits = BitCursor::new(&es[16..]);
        assert_eq!(bits.get(4).unwrap(), SEQUENCE_EXTENSION_ID);
        let mut extension = read_sequence_extension(&mut bits).unwrap();
        extension.frame_rate_extension_n = 1;
        parameters.extension = Some(extension);
        assert_eq!(parameters.frame_rate(), FrameRate::new(60000, 1001));
    }
}
