//! PES header layout (ISO/IEC 13818-1) and timestamp extraction.
//!
//! ```text
//! +----------+----+--------+-------+-------+--------+-----------------+
//! | 00 00 01 | id | length | flags | flags | hdrlen | optional fields |
//! +----------+----+--------+-------+-------+--------+-----------------+
//! |  3 bytes | 1  |   2    |   1   |   1   |   1    |  hdrlen bytes   |
//! ```
//!
//! PTS and DTS are 33-bit values split 3/15/15 with a marker bit after each
//! group, preceded by a 4-bit prefix.

use crate::bits::BitCursor;
use crate::error::{BitError, CollatorError, Result};
use crate::types::PTS_MASK;

/// Padding stream id.
pub const PES_PADDING_START_CODE: u8 = 0xBE;
/// Bytes needed before the full PES header size is known.
pub const PES_INITIAL_HEADER_SIZE: usize = 9;
/// Bytes needed to read a padding packet's length.
pub const PES_PADDING_INITIAL_HEADER_SIZE: usize = 6;
/// Lookahead for `00 00 01 00 00 01 <id>`.
pub const ZERO_START_CODE_HEADER_SIZE: usize = 7;
/// Longest run of stuffing bytes in an MPEG-1 packet header.
const MAX_MPEG1_STUFFING: usize = 16;

/// Video stream ids `E0..=EF`.
pub fn is_video_stream_id(code: u8) -> bool {
    code & 0xF0 == 0xE0
}

/// Codes that frame the elementary stream rather than belong to it.
pub fn is_pes_framing_code(code: u8) -> bool {
    is_video_stream_id(code) || code == PES_PADDING_START_CODE
}

/// `PES_packet_length` of a header holding at least 6 bytes.
pub fn packet_length(header: &[u8]) -> usize {
    ((header[4] as usize) << 8) | header[5] as usize
}

/// Bytes of padding that follow a padding packet header.
pub fn padding_skip_length(header: &[u8]) -> usize {
    packet_length(header)
}

/// Whether the header uses the MPEG-2 layout (`10xx xxxx` in byte 6).
pub fn is_mpeg2_layout(header: &[u8]) -> bool {
    header[6] & 0xC0 == 0x80
}

/// Full size of the PES header, or `None` while more bytes are needed to tell.
pub fn pes_header_size(header: &[u8]) -> Result<Option<usize>> {
    if header.len() < 7 {
        return Ok(None);
    }
    if is_mpeg2_layout(header) {
        if header.len() < PES_INITIAL_HEADER_SIZE {
            return Ok(None);
        }
        return Ok(Some(PES_INITIAL_HEADER_SIZE + header[8] as usize));
    }

    let mut bits = BitCursor::new(header);
    bits.set_pointer(6);
    match skip_mpeg1_fields(&mut bits) {
        Ok(_) => Ok(Some(bits.byte_position())),
        Err(CollatorError::Truncated(BitError::Exhausted { .. })) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Fields of a parsed PES packet header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// `PES_packet_length`; zero means unbounded.
    pub packet_length: usize,
    /// Total header size including the start code.
    pub header_size: usize,
    /// Payload bytes following the header, when the packet is bounded.
    pub payload_length: Option<usize>,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub data_alignment: bool,
    /// Header used the MPEG-1 system stream layout.
    pub mpeg1: bool,
}

impl PesHeader {
    /// Parse a complete PES header.
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < 7 || header[..3] != [0x00, 0x00, 0x01] {
            return Err(CollatorError::MalformedPes("missing start code prefix"));
        }

        let packet_length = packet_length(header);
        let mut parsed = PesHeader {
            stream_id: header[3],
            packet_length,
            ..Self::default()
        };

        if is_mpeg2_layout(header) {
            if header.len() < PES_INITIAL_HEADER_SIZE {
                return Err(CollatorError::MalformedPes("header shorter than 9 bytes"));
            }
            let flags = header[7];
            let header_data_length = header[8] as usize;
            if packet_length != 0 && header_data_length + 3 > packet_length {
                return Err(CollatorError::PesHeaderLength {
                    header_data_length,
                    packet_length,
                });
            }

            let timestamp_bytes = match flags & 0xC0 {
                0x80 => 5,
                0xC0 => 10,
                0x40 => return Err(CollatorError::DtsWithoutPts),
                _ => 0,
            };
            if timestamp_bytes > header_data_length {
                return Err(CollatorError::MalformedPes("timestamps exceed header data length"));
            }

            parsed.data_alignment = header[6] & 0x04 != 0;
            parsed.header_size = PES_INITIAL_HEADER_SIZE + header_data_length;

            let mut bits = BitCursor::new(header);
            bits.set_pointer(PES_INITIAL_HEADER_SIZE);
            if flags & 0x80 != 0 {
                parsed.pts = Some(read_timestamp(&mut bits, true)?);
            }
            if flags & 0xC0 == 0xC0 {
                parsed.dts = Some(read_timestamp(&mut bits, true)?);
            }
        } else {
            let mut bits = BitCursor::new(header);
            bits.set_pointer(6);
            let (pts, dts) = skip_mpeg1_fields(&mut bits)?;
            parsed.mpeg1 = true;
            parsed.pts = pts;
            parsed.dts = dts;
            parsed.header_size = bits.byte_position();
        }

        if packet_length != 0 {
            parsed.payload_length = (packet_length + 6).checked_sub(parsed.header_size);
            if parsed.payload_length.is_none() {
                return Err(CollatorError::PesHeaderLength {
                    header_data_length: parsed.header_size,
                    packet_length,
                });
            }
        }

        Ok(parsed)
    }
}

/// Read one 33-bit timestamp. `prefixed` skips the leading 4-bit code.
fn read_timestamp(bits: &mut BitCursor<'_>, prefixed: bool) -> Result<u64> {
    if prefixed {
        bits.flush_unseen(4)?;
    }
    let mut value = (bits.get(3)? as u64) << 30;
    bits.flush_unseen(1)?;
    value |= (bits.get(15)? as u64) << 15;
    bits.flush_unseen(1)?;
    value |= bits.get(15)? as u64;
    bits.flush_unseen(1)?;
    Ok(value & PTS_MASK)
}

/// Walk the MPEG-1 packet header fields after the length, returning PTS/DTS.
fn skip_mpeg1_fields(bits: &mut BitCursor<'_>) -> Result<(Option<u64>, Option<u64>)> {
    let mut stuffing = 0;
    while bits.show(8)? == 0xFF {
        stuffing += 1;
        if stuffing > MAX_MPEG1_STUFFING {
            return Err(CollatorError::MalformedPes("too many stuffing bytes"));
        }
        bits.flush_unseen(8)?;
    }

    // STD buffer scale and size.
    if bits.show(2)? == 0b01 {
        bits.flush_unseen(16)?;
    }

    match bits.get(4)? {
        0b0010 => {
            let pts = read_timestamp(bits, false)?;
            Ok((Some(pts), None))
        }
        0b0011 => {
            let pts = read_timestamp(bits, false)?;
            let dts = read_timestamp(bits, true)?;
            Ok((Some(pts), Some(dts)))
        }
        0b0000 => {
            if bits.get(4)? != 0b1111 {
                return Err(CollatorError::MalformedPes("bad MPEG-1 no-timestamp marker"));
            }
            Ok((None, None))
        }
        0b0001 => Err(CollatorError::DtsWithoutPts),
        _ => Err(CollatorError::MalformedPes("bad MPEG-1 timestamp flags")),
    }
}

/// Encode a timestamp field (used to build streams in tests and tools).
pub fn encode_timestamp(prefix: u8, value: u64) -> [u8; 5] {
    let value = value & PTS_MASK;
    [
        (prefix << 4) | (((value >> 30) as u8 & 0x07) << 1) | 1,
        (value >> 22) as u8,
        (((value >> 15) as u8 & 0x7F) << 1) | 1,
        (value >> 7) as u8,
        ((value as u8 & 0x7F) << 1) | 1,
    ]
}

/// Build a complete MPEG-2 layout PES packet around `payload`.
pub fn build_pes_packet(stream_id: u8, pts: Option<u64>, dts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut optional = Vec::new();
    let mut flags = 0u8;
    match (pts, dts) {
        (Some(pts), Some(dts)) => {
            flags = 0xC0;
            optional.extend_from_slice(&encode_timestamp(0b0011, pts));
            optional.extend_from_slice(&encode_timestamp(0b0001, dts));
        }
        (Some(pts), None) => {
            flags = 0x80;
            optional.extend_from_slice(&encode_timestamp(0b0010, pts));
        }
        _ => {}
    }

    let packet_length = 3 + optional.len() + payload.len();
    let length_field = if packet_length > 0xFFFF { 0 } else { packet_length };

    let mut packet = vec![
        0x00,
        0x00,
        0x01,
        stream_id,
        (length_field >> 8) as u8,
        length_field as u8,
        0x80,
        flags,
        optional.len() as u8,
    ];
    packet.extend_from_slice(&optional);
    packet.extend_from_slice(payload);
    packet
}
