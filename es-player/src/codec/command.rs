//! Decode command assembly.
//!
//! A [`DecodeCommand`] is the request shape of the transform service: where
//! the coded data is, where each decoded plane goes, and the codec
//! parameters the decoder needs that are not in the coded data it is given.

use bytes::Bytes;

use crate::decode::buffer::ComponentRole;
use crate::frame_parser::mjpeg::{FieldIndicator, MjpegComponent};
use crate::frame_parser::mpeg2::{PictureCodingType, PictureStructure};
use crate::types::{
    Decimation, Dimensions, FrameParameters, ParsedFrame, PixelFormat, StreamParameters,
};

/// Memory organisation of the destination planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Line by line, macroblock aligned strides.
    Raster,
}

/// One decoded plane's destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDestination {
    pub role: ComponentRole,
    pub buffer_index: usize,
    pub offset: usize,
    pub stride: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecParameters {
    Mjpeg {
        components: Vec<MjpegComponent>,
        field: FieldIndicator,
    },
    Mpeg2 {
        /// The stream has no sequence extension.
        mpeg1: bool,
        temporal_reference: u16,
        coding_type: PictureCodingType,
        picture_structure: PictureStructure,
        top_field_first: bool,
        progressive_frame: bool,
        intra_dc_precision: u8,
        f_codes: [[u8; 2]; 2],
        q_scale_type: bool,
        intra_vlc_format: bool,
        alternate_scan: bool,
        concealment_motion_vectors: bool,
        intra_quantiser_matrix: Option<[u8; 64]>,
        non_intra_quantiser_matrix: Option<[u8; 64]>,
    },
}

/// Request submitted to the transform service for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeCommand {
    /// Coded frame data; the decoder reads `source_offset..+source_length`.
    pub source: Bytes,
    pub source_offset: usize,
    pub source_length: usize,
    /// Coded picture size.
    pub dimensions: Dimensions,
    pub pixel_format: PixelFormat,
    /// Picture size after decimation.
    pub output_dimensions: Dimensions,
    pub addressing_mode: AddressingMode,
    pub destinations: Vec<PlaneDestination>,
    pub decimation: Decimation,
    pub codec: CodecParameters,
}

/// Build the transform request for a committed frame.
pub fn build_decode_command(frame: &ParsedFrame) -> DecodeCommand {
    let buffer = &frame.decode_buffer;
    let destinations = buffer
        .planes
        .iter()
        .map(|plane| PlaneDestination {
            role: plane.role,
            buffer_index: buffer.index,
            offset: plane.offset,
            stride: plane.stride,
            size: plane.size,
        })
        .collect();

    let dimensions = frame.presentation.dimensions;
    DecodeCommand {
        source: frame.coded.data.clone(),
        source_offset: frame.data_offset,
        source_length: frame.coded.len().saturating_sub(frame.data_offset),
        dimensions,
        pixel_format: frame.presentation.pixel_format,
        output_dimensions: dimensions.decimated(frame.decimation),
        addressing_mode: AddressingMode::Raster,
        destinations,
        decimation: frame.decimation,
        codec: codec_parameters(frame),
    }
}

fn codec_parameters(frame: &ParsedFrame) -> CodecParameters {
    match &frame.frame_parameters {
        FrameParameters::Mjpeg(header) => CodecParameters::Mjpeg {
            components: header.components.clone(),
            field: header.field,
        },
        FrameParameters::Mpeg2(picture) => {
            let (mpeg1, intra, non_intra) = match frame.stream_parameters.as_ref() {
                StreamParameters::Mpeg2(stream) => (
                    stream.extension.is_none(),
                    stream.sequence.intra_quantiser_matrix,
                    stream.sequence.non_intra_quantiser_matrix,
                ),
                StreamParameters::Mjpeg(_) => (true, None, None),
            };
            let header = &picture.header;
            let f_code = |vector: Option<(bool, u8)>| vector.map_or(0x0F, |(_, code)| code);

            match &picture.coding_extension {
                Some(coding) => CodecParameters::Mpeg2 {
                    mpeg1,
                    temporal_reference: header.temporal_reference,
                    coding_type: header.coding_type,
                    picture_structure: coding.picture_structure,
                    top_field_first: coding.top_field_first,
                    progressive_frame: coding.progressive_frame,
                    intra_dc_precision: coding.intra_dc_precision,
                    f_codes: coding.f_codes,
                    q_scale_type: coding.q_scale_type,
                    intra_vlc_format: coding.intra_vlc_format,
                    alternate_scan: coding.alternate_scan,
                    concealment_motion_vectors: coding.concealment_motion_vectors,
                    intra_quantiser_matrix: intra,
                    non_intra_quantiser_matrix: non_intra,
                },
                // MPEG-1: f-codes come from the picture header.
                None => CodecParameters::Mpeg2 {
                    mpeg1,
                    temporal_reference: header.temporal_reference,
                    coding_type: header.coding_type,
                    picture_structure: PictureStructure::Frame,
                    top_field_first: false,
                    progressive_frame: true,
                    intra_dc_precision: 0,
                    f_codes: [
                        [f_code(header.forward), f_code(header.forward)],
                        [f_code(header.backward), f_code(header.backward)],
                    ],
                    q_scale_type: false,
                    intra_vlc_format: false,
                    alternate_scan: false,
                    concealment_motion_vectors: false,
                    intra_quantiser_matrix: intra,
                    non_intra_quantiser_matrix: non_intra,
                },
            }
        }
    }
}
