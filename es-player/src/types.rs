//! Frame and presentation types shared by the parsers and the decode stage.

use std::sync::Arc;

use pes_collator::CodedFrame;
use serde::{Deserialize, Serialize};

use crate::decode::buffer::DecodeBuffer;
use crate::frame_parser::mjpeg::{MjpegFrameHeader, MjpegStreamParameters};
use crate::frame_parser::mpeg2::{Mpeg2PictureParameters, Mpeg2StreamParameters};

/// Video codecs the player understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Mjpeg,
    Mpeg2,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Mjpeg => "mjpeg",
            Codec::Mpeg2 => "mpeg2",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout of a decoded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuv420,
    Yuv422,
    Yuv444,
    Monochrome,
}

impl PixelFormat {
    /// Chroma subsampling as (horizontal, vertical) divisors.
    pub fn chroma_divisors(self) -> Option<(u32, u32)> {
        match self {
            PixelFormat::Yuv420 => Some((2, 2)),
            PixelFormat::Yuv422 => Some((2, 1)),
            PixelFormat::Yuv444 => Some((1, 1)),
            PixelFormat::Monochrome => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size after decimation, rounded up.
    pub fn decimated(self, decimation: Decimation) -> Self {
        Self {
            width: self.width.div_ceil(decimation.horizontal.max(1) as u32),
            height: self.height.div_ceil(decimation.vertical.max(1) as u32),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Horizontal and vertical decimation factors applied by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decimation {
    pub horizontal: u8,
    pub vertical: u8,
}

impl Default for Decimation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Decimation {
    pub const IDENTITY: Decimation = Decimation {
        horizontal: 1,
        vertical: 1,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Frame rate as a rational `time_scale / time_delta` frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub time_scale: u32,
    pub time_delta: u32,
}

impl FrameRate {
    /// `None` when the delta is zero (rate unknown).
    pub fn new(time_scale: u32, time_delta: u32) -> Option<Self> {
        (time_delta != 0).then_some(Self {
            time_scale,
            time_delta,
        })
    }

    pub fn as_f64(&self) -> f64 {
        self.time_scale as f64 / self.time_delta as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    Progressive,
    Interlaced { top_field_first: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Bt601,
    Bt709,
}

impl ColorSpace {
    /// Colour space conventionally implied by the picture height.
    pub fn for_height(height: u32) -> Self {
        if height > 576 {
            ColorSpace::Bt709
        } else {
            ColorSpace::Bt601
        }
    }
}

/// How the decoded picture is meant to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationDescription {
    pub dimensions: Dimensions,
    pub pixel_format: PixelFormat,
    /// `None` when the stream does not say.
    pub frame_rate: Option<FrameRate>,
    pub scan: ScanType,
    pub color_space: ColorSpace,
}

/// Stream level parameters, shared by every frame until the next stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamParameters {
    Mjpeg(MjpegStreamParameters),
    Mpeg2(Mpeg2StreamParameters),
}

/// Frame level parameters, owned by one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameParameters {
    Mjpeg(MjpegFrameHeader),
    Mpeg2(Mpeg2PictureParameters),
}

/// Result of a successful commit: everything the decode stage needs.
#[derive(Debug)]
pub struct ParsedFrame {
    pub coded: CodedFrame,
    /// Offset of the first byte the decoder must see.
    pub data_offset: usize,
    pub key_frame: bool,
    pub presentation: PresentationDescription,
    pub stream_parameters: Arc<StreamParameters>,
    /// The stream parameters changed since the previous committed frame.
    pub new_stream_parameters: bool,
    pub frame_parameters: FrameParameters,
    pub decimation: Decimation,
    pub decode_buffer: DecodeBuffer,
}

impl ParsedFrame {
    pub fn playback_time(&self) -> Option<u64> {
        self.coded.parameters.playback_time
    }

    /// Coded bytes handed to the decoder.
    pub fn decode_data(&self) -> &[u8] {
        self.coded.data.get(self.data_offset..).unwrap_or(&[])
    }
}

/// Decode quality reported with a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DecodeQuality {
    /// Hardware reported an error; the picture may be damaged.
    Degraded,
    Full,
}

/// A frame returned by the transform service.
#[derive(Debug)]
pub struct DecodedFrame {
    pub playback_time: Option<u64>,
    pub decode_time: Option<u64>,
    pub key_frame: bool,
    pub quality: DecodeQuality,
    /// Hardware status word, zero on success.
    pub hardware_status: u32,
    pub presentation: PresentationDescription,
    pub buffer: DecodeBuffer,
}
