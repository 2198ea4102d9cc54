//! Elementary stream builders for parser tests.

use pes_collator::pes::build_pes_packet;
use pes_collator::{CodedFrame, Collator, InputDescriptor};

use super::FrameParser;

/// PTS given to every stream collated by [`collate`].
pub(crate) const FIXTURE_PTS: u64 = 1800;

/// MSB-first bit writer.
#[derive(Default)]
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    pub(crate) fn put(&mut self, value: u32, bits: u32) -> &mut Self {
        for i in (0..bits).rev() {
            if self.used == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (7 - self.used);
            }
            self.used = (self.used + 1) % 8;
        }
        self
    }

    pub(crate) fn finish(&mut self) -> Vec<u8> {
        self.used = 0;
        std::mem::take(&mut self.bytes)
    }
}

fn start_code(code: u8, body: Vec<u8>) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x01, code];
    data.extend(body);
    data
}

/// Wrap `es` in one PES packet and collate it with `parser`'s configuration.
pub(crate) fn collate<P: FrameParser + ?Sized>(parser: &P, es: &[u8]) -> Vec<CodedFrame> {
    let mut collator = Collator::new(parser.collator_config(), parser.header_handler());
    let stream = build_pes_packet(0xE0, Some(FIXTURE_PTS), None, es);
    let mut frames = Vec::new();
    collator
        .input(&InputDescriptor::default(), &stream, &mut frames)
        .unwrap();
    collator.flush(&mut frames);
    frames
}

pub(crate) fn sequence_header(width: u32, height: u32, frame_rate_code: u32) -> Vec<u8> {
    let body = BitWriter::default()
        .put(width & 0xFFF, 12)
        .put(height & 0xFFF, 12)
        .put(2, 4)
        .put(frame_rate_code, 4)
        .put(0x3FFFF, 18)
        .put(1, 1)
        .put(112, 10)
        .put(0, 1)
        .put(0, 1)
        .put(0, 1)
        .finish();
    start_code(0xB3, body)
}

pub(crate) fn sequence_extension(progressive_sequence: bool, chroma_format: u32) -> Vec<u8> {
    let body = BitWriter::default()
        .put(1, 4)
        .put(0x48, 8)
        .put(progressive_sequence as u32, 1)
        .put(chroma_format, 2)
        .put(0, 2)
        .put(0, 2)
        .put(0, 12)
        .put(1, 1)
        .put(0, 8)
        .put(0, 1)
        .put(0, 2)
        .put(0, 5)
        .finish();
    start_code(0xB5, body)
}

pub(crate) fn gop_header(closed: bool) -> Vec<u8> {
    let body = BitWriter::default()
        .put(0x0800, 25)
        .put(closed as u32, 1)
        .put(0, 1)
        .finish();
    start_code(0xB8, body)
}

pub(crate) fn picture_header(temporal_reference: u32, coding_type: u32) -> Vec<u8> {
    let mut bits = BitWriter::default();
    bits.put(temporal_reference, 10).put(coding_type, 3).put(0xFFFF, 16);
    if coding_type == 2 || coding_type == 3 {
        bits.put(0, 1).put(7, 3);
    }
    if coding_type == 3 {
        bits.put(0, 1).put(7, 3);
    }
    start_code(0x00, bits.finish())
}

pub(crate) fn picture_coding_extension(
    structure: u32,
    top_field_first: bool,
    progressive_frame: bool,
) -> Vec<u8> {
    let body = BitWriter::default()
        .put(8, 4)
        .put(0xFFFF, 16)
        .put(0, 2)
        .put(structure, 2)
        .put(top_field_first as u32, 1)
        .put(1, 1)
        .put(0, 5)
        .put(progressive_frame as u32, 1)
        .put(progressive_frame as u32, 1)
        .put(0, 1)
        .finish();
    start_code(0xB5, body)
}

pub(crate) fn slice(number: u8) -> Vec<u8> {
    start_code(number, vec![0x11, 0x22, 0x33, 0x44])
}

pub(crate) fn sequence_end() -> Vec<u8> {
    start_code(0xB7, Vec::new())
}

/// Progressive frame picture: header, coding extension and two slices.
pub(crate) fn mpeg2_picture(temporal_reference: u32, coding_type: u32) -> Vec<u8> {
    let mut data = picture_header(temporal_reference, coding_type);
    data.extend(picture_coding_extension(3, false, true));
    data.extend(slice(0x01));
    data.extend(slice(0x02));
    data
}

/// 720x480 4:2:0 progressive sequence at 30000/1001.
pub(crate) fn mpeg2_sequence() -> Vec<u8> {
    let mut data = sequence_header(720, 480, 4);
    data.extend(sequence_extension(true, 1));
    data
}

pub(crate) struct JpegImage {
    pub width: u16,
    pub height: u16,
    /// (horizontal, vertical) sampling per component.
    pub sampling: Vec<(u8, u8)>,
    /// AVI1 field polarity, if an APP0 block is wanted.
    pub polarity: Option<u8>,
    pub signature: &'static str,
    pub time_scale: u32,
    pub time_delta: u32,
}

impl Default for JpegImage {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            sampling: vec![(2, 2), (1, 1), (1, 1)],
            polarity: None,
            signature: "STMicroelectronics",
            time_scale: 25,
            time_delta: 1,
        }
    }
}

fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() + 2) as u16;
    let mut data = vec![0xFF, marker];
    data.extend_from_slice(&length.to_be_bytes());
    data.extend_from_slice(payload);
    data
}

/// One JPEG image from SOI to EOI.
pub(crate) fn jpeg_image(image: &JpegImage) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];

    if let Some(polarity) = image.polarity {
        let mut avi1 = b"AVI1".to_vec();
        avi1.push(polarity);
        data.extend(segment(0xE0, &avi1));
    }

    let mut metadata = image.signature.as_bytes().to_vec();
    metadata.push(0);
    metadata.extend_from_slice(&image.time_scale.to_be_bytes());
    metadata.extend_from_slice(&image.time_delta.to_be_bytes());
    data.extend(segment(0xE3, &metadata));

    let mut frame = vec![8];
    frame.extend_from_slice(&image.height.to_be_bytes());
    frame.extend_from_slice(&image.width.to_be_bytes());
    frame.push(image.sampling.len() as u8);
    for (i, &(h, v)) in image.sampling.iter().enumerate() {
        frame.extend_from_slice(&[i as u8 + 1, (h << 4) | v, (i > 0) as u8]);
    }
    data.extend(segment(0xC0, &frame));

    data.extend(segment(
        0xDA,
        &[0x03, 0x01, 0x00, 0x02, 0x11, 0x03, 0x11, 0x00, 0x3F, 0x00],
    ));
    // Entropy coded data with a stuffed byte and a restart marker.
    data.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD0, 0x78]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}
