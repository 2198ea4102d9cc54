//! Decode buffer provider contract and a fixed-size pooled implementation.

use tracing::{debug, info};

use crate::error::BufferError;
use crate::types::{Dimensions, PixelFormat};

/// Plane alignment, in pixels, of every decode buffer.
const MACROBLOCK_SIZE: u32 = 16;

/// Which component a plane carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    PrimaryLuma,
    /// Interleaved Cb/Cr.
    PrimaryChroma,
}

/// Placement of one plane inside a decode buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub role: ComponentRole,
    /// Byte offset from the start of the buffer.
    pub offset: usize,
    pub stride: usize,
    pub size: usize,
}

/// A destination for one decoded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeBuffer {
    /// Slot index within the provider.
    pub index: usize,
    pub format: PixelFormat,
    pub dimensions: Dimensions,
    pub planes: Vec<PlaneLayout>,
}

impl DecodeBuffer {
    /// Layout of the plane with `role`, if the format has one.
    pub fn plane(&self, role: ComponentRole) -> Option<&PlaneLayout> {
        self.planes.iter().find(|plane| plane.role == role)
    }

    /// Total bytes covered by the planes.
    pub fn size(&self) -> usize {
        self.planes.iter().map(|plane| plane.size).sum()
    }
}

/// Supplier of decode buffers.
pub trait DecodeBufferProvider: Send {
    /// Obtain a buffer for a picture of `dimensions` in `format`.
    fn request_buffer(
        &mut self,
        dimensions: Dimensions,
        format: PixelFormat,
    ) -> Result<DecodeBuffer, BufferError>;

    /// Called before the first request in `next` when `previous` was in use.
    fn notify_format_switch(&mut self, previous: PixelFormat, next: PixelFormat);

    /// Return a buffer once the picture in it is no longer needed.
    fn release_buffer(&mut self, index: usize);
}

/// Compute the plane layout of a macroblock aligned buffer.
pub fn plane_layout(dimensions: Dimensions, format: PixelFormat) -> Vec<PlaneLayout> {
    let width = dimensions.width.next_multiple_of(MACROBLOCK_SIZE) as usize;
    let height = dimensions.height.next_multiple_of(MACROBLOCK_SIZE) as usize;

    let luma = PlaneLayout {
        role: ComponentRole::PrimaryLuma,
        offset: 0,
        stride: width,
        size: width * height,
    };

    match format.chroma_divisors() {
        None => vec![luma],
        Some((horizontal, vertical)) => {
            // Two chroma samples per interleaved pair.
            let stride = width * 2 / horizontal as usize;
            let rows = height / vertical as usize;
            vec![
                luma,
                PlaneLayout {
                    role: ComponentRole::PrimaryChroma,
                    offset: luma.size,
                    stride,
                    size: stride * rows,
                },
            ]
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    in_use: bool,
    format: Option<PixelFormat>,
}

/// Fixed number of decode buffers handed out round robin.
#[derive(Debug)]
pub struct DecodeBufferPool {
    slots: Vec<Slot>,
    supported: Vec<PixelFormat>,
    last_format_switch: Option<(PixelFormat, PixelFormat)>,
    format_switch_count: u64,
    next: usize,
}

impl DecodeBufferPool {
    /// Create a pool of `count` buffers accepting every pixel format.
    pub fn new(count: usize) -> Self {
        Self::with_formats(
            count,
            vec![
                PixelFormat::Yuv420,
                PixelFormat::Yuv422,
                PixelFormat::Yuv444,
                PixelFormat::Monochrome,
            ],
        )
    }

    /// Create a pool restricted to `supported` formats.
    pub fn with_formats(count: usize, supported: Vec<PixelFormat>) -> Self {
        Self {
            slots: vec![Slot::default(); count],
            supported,
            last_format_switch: None,
            format_switch_count: 0,
            next: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Buffers currently handed out.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }

    /// Buffers of `format` still handed out.
    pub fn in_use_with_format(&self, format: PixelFormat) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.in_use && slot.format == Some(format))
            .count()
    }

    /// Most recent format switch notified, as `(previous, next)`.
    pub fn last_format_switch(&self) -> Option<(PixelFormat, PixelFormat)> {
        self.last_format_switch
    }

    pub fn format_switch_count(&self) -> u64 {
        self.format_switch_count
    }
}

impl DecodeBufferProvider for DecodeBufferPool {
    fn request_buffer(
        &mut self,
        dimensions: Dimensions,
        format: PixelFormat,
    ) -> Result<DecodeBuffer, BufferError> {
        if !self.supported.contains(&format) {
            return Err(BufferError::UnsupportedFormat(format));
        }

        let count = self.slots.len();
        let index = (0..count)
            .map(|i| (self.next + i) % count)
            .find(|&i| !self.slots[i].in_use)
            .ok_or(BufferError::OutOfMemory(self.in_use()))?;

        self.slots[index] = Slot {
            in_use: true,
            format: Some(format),
        };
        self.next = (index + 1) % count;
        debug!(
            "Decode buffer {} allocated for {}x{} {:?}",
            index, dimensions.width, dimensions.height, format
        );

        Ok(DecodeBuffer {
            index,
            format,
            dimensions,
            planes: plane_layout(dimensions, format),
        })
    }

    fn notify_format_switch(&mut self, previous: PixelFormat, next: PixelFormat) {
        info!(
            "Decode format switch {:?} -> {:?} ({} buffers of the old format in flight)",
            previous,
            next,
            self.in_use_with_format(previous)
        );
        self.last_format_switch = Some((previous, next));
        self.format_switch_count += 1;
    }

    fn release_buffer(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.in_use = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_layout_420() {
        let planes = plane_layout(Dimensions::new(720, 480), PixelFormat::Yuv420);
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].stride, 720);
        assert_eq!(planes[0].size, 720 * 480);
        assert_eq!(planes[1].offset, 720 * 480);
        assert_eq!(planes[1].stride, 720);
        assert_eq!(planes[1].size, 720 * 240);
    }

    #[test]
    fn test_plane_layout_alignment_and_monochrome() {
        let planes = plane_layout(Dimensions::new(100, 50), PixelFormat::Monochrome);
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].stride, 112);
        assert_eq!(planes[0].size, 112 * 64);

        let planes = plane_layout(Dimensions::new(16, 16), PixelFormat::Yuv444);
        assert_eq!(planes[1].stride, 32);
        assert_eq!(planes[1].size, 32 * 16);
    }

    #[test]
    fn test_pool_exhaustion_and_release() {
        let mut pool = DecodeBufferPool::new(2);
        let dimensions = Dimensions::new(64, 64);
        let first = pool.request_buffer(dimensions, PixelFormat::Yuv420).unwrap();
        let second = pool.request_buffer(dimensions, PixelFormat::Yuv420).unwrap();
        assert_ne!(first.index, second.index);
        assert_eq!(
            pool.request_buffer(dimensions, PixelFormat::Yuv420),
            Err(BufferError::OutOfMemory(2))
        );

        pool.release_buffer(first.index);
        let third = pool.request_buffer(dimensions, PixelFormat::Yuv420).unwrap();
        assert_eq!(third.index, first.index);
        assert!(third.plane(ComponentRole::PrimaryChroma).is_some());
    }

    #[test]
    fn test_pool_rejects_unsupported_format() {
        let mut pool = DecodeBufferPool::with_formats(4, vec![PixelFormat::Yuv420]);
        assert_eq!(
            pool.request_buffer(Dimensions::new(16, 16), PixelFormat::Yuv422),
            Err(BufferError::UnsupportedFormat(PixelFormat::Yuv422))
        );
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_format_switch_recorded() {
        let mut pool = DecodeBufferPool::new(2);
        pool.request_buffer(Dimensions::new(16, 16), PixelFormat::Yuv420)
            .unwrap();
        pool.notify_format_switch(PixelFormat::Yuv420, PixelFormat::Yuv422);
        assert_eq!(
            pool.last_format_switch(),
            Some((PixelFormat::Yuv420, PixelFormat::Yuv422))
        );
        assert_eq!(pool.in_use_with_format(PixelFormat::Yuv420), 1);
    }

    #[test]
    fn test_format_switches_keep_only_latest() {
        let mut pool = DecodeBufferPool::new(2);
        for _ in 0..1000 {
            pool.notify_format_switch(PixelFormat::Yuv420, PixelFormat::Yuv422);
            pool.notify_format_switch(PixelFormat::Yuv422, PixelFormat::Yuv420);
        }
        assert_eq!(pool.format_switch_count(), 2000);
        assert_eq!(
            pool.last_format_switch(),
            Some((PixelFormat::Yuv422, PixelFormat::Yuv420))
        );
    }
}
