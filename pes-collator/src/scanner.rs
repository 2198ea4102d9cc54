//! Start-code scanning.
//!
//! Two marker families are recognised:
//!
//! ```text
//! MPEG:  00 00 01 <code>        every code not in an ignore range
//! JPEG:  FF <marker>            every marker not in an ignore range
//!        00 00 01 <pes id>      PES framing only (video ids and padding)
//! ```
//!
//! Scanning works on one window at a time. Codes split across two windows are
//! picked up by [`scan_for_spanning_start_code`], which looks at the tail of
//! the bytes already accumulated together with the head of the new window.

use crate::config::{CollatorConfig, MarkerFamily};
use crate::pes::is_pes_framing_code;
use crate::types::{JPEG_MARKER_SIZE, MPEG_START_CODE_SIZE};

/// A code found inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMatch {
    /// Offset of the first prefix byte.
    pub offset: usize,
    /// Total size of the code, prefix included.
    pub size: usize,
}

impl CodeMatch {
    /// Offset just past the code byte.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// A code straddling the boundary between accumulated and new bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanning {
    /// Bytes of the code lying in the new window.
    pub in_head: usize,
    /// Size of the whole code.
    pub size: usize,
}

/// Find the first structuring code in `window`.
///
/// Returns `None` when the window is shorter than one marker or holds no
/// qualifying code. Codes in the ignore ranges are stepped over.
pub fn find_next_start_code(window: &[u8], config: &CollatorConfig) -> Option<CodeMatch> {
    if window.len() < config.family.marker_size() {
        return None;
    }

    match config.family {
        MarkerFamily::Mpeg => (0..=window.len() - MPEG_START_CODE_SIZE)
            .find(|&i| {
                has_prefix(&window[i..]) && qualifies_mpeg(window[i + 3], config)
            })
            .map(|offset| CodeMatch {
                offset,
                size: MPEG_START_CODE_SIZE,
            }),
        MarkerFamily::Jpeg => {
            for i in 0..window.len() - 1 {
                if window[i] == 0xFF && !config.is_ignored(window[i + 1]) {
                    return Some(CodeMatch {
                        offset: i,
                        size: JPEG_MARKER_SIZE,
                    });
                }
                if i + MPEG_START_CODE_SIZE <= window.len()
                    && has_prefix(&window[i..])
                    && is_pes_framing_code(window[i + 3])
                {
                    return Some(CodeMatch {
                        offset: i,
                        size: MPEG_START_CODE_SIZE,
                    });
                }
            }
            None
        }
    }
}

/// Check whether a code straddles the boundary between `tail` (already
/// accumulated) and `head` (newly arrived).
///
/// When `head` is too short to tell, a code is assumed to be present and
/// `in_head` exceeds `head.len()`; the caller then keeps the bytes and waits
/// for more data.
pub fn scan_for_spanning_start_code(
    tail: &[u8],
    head: &[u8],
    config: &CollatorConfig,
) -> Option<Spanning> {
    if head.is_empty() {
        return None;
    }

    if let Some(in_head) = split_prefix(tail, head) {
        let code = head.get(in_head - 1).copied();
        if code.map_or(true, |code| qualifies_framing(code, config)) {
            return Some(Spanning {
                in_head,
                size: MPEG_START_CODE_SIZE,
            });
        }
    }

    if config.family == MarkerFamily::Jpeg
        && tail.last() == Some(&0xFF)
        && !config.is_ignored(head[0])
    {
        return Some(Spanning {
            in_head: 1,
            size: JPEG_MARKER_SIZE,
        });
    }

    None
}

/// How many bytes of a `00 00 01 xx` code lie in `head` when its prefix
/// started in `tail`.
fn split_prefix(tail: &[u8], head: &[u8]) -> Option<usize> {
    // Three prefix bytes seen, the code byte is the first new byte.
    if tail.ends_with(&[0x00, 0x00, 0x01]) {
        return Some(1);
    }
    // Two seen, need 01 next.
    if tail.ends_with(&[0x00, 0x00]) && head[0] == 0x01 {
        return Some(2);
    }
    // One seen, need 00 01 next; a lone 00 is assumed to be the start of it.
    if tail.ends_with(&[0x00]) && head[0] == 0x00 && head.get(1).map_or(true, |&b| b == 0x01) {
        return Some(3);
    }
    None
}

fn has_prefix(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0x00 && bytes[1] == 0x00 && bytes[2] == 0x01
}

fn qualifies_mpeg(code: u8, config: &CollatorConfig) -> bool {
    is_pes_framing_code(code) || !config.is_ignored(code)
}

/// Whether the code byte of a `00 00 01 xx` code makes it a real code.
fn qualifies_framing(code: u8, config: &CollatorConfig) -> bool {
    match config.family {
        MarkerFamily::Mpeg => qualifies_mpeg(code, config),
        MarkerFamily::Jpeg => is_pes_framing_code(code),
    }
}
