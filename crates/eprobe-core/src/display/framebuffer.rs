//! Packed 1-bit framebuffer for bistable panels.
//!
//! All screen drawing targets this RAM buffer. The panel driver then receives
//! either the whole buffer (full refresh) or a byte-aligned window of it
//! (partial refresh). The memory layout matches the panel RAM: rows are
//! padded to whole bytes, the most significant bit is the leftmost pixel, a
//! set bit is white paper and a cleared bit is black ink.

use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// `BinaryColor::On` is ink, `BinaryColor::Off` is paper.
pub struct FrameBuffer {
    bits: Vec<u8>,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    /// Allocate a white framebuffer of `size`.
    pub fn new(size: Size) -> Self {
        let stride = Self::stride_of(size.width);
        Self {
            bits: vec![0xFF; stride * size.height as usize],
            width: size.width,
            height: size.height,
        }
    }

    const fn stride_of(width: u32) -> usize {
        width.div_ceil(8) as usize
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        Self::stride_of(self.width)
    }

    /// Raw panel-ordered buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn pixel(&self, point: Point) -> Option<BinaryColor> {
        let (x, y) = self.index_of(point)?;
        let byte = self.bits[y * self.stride() + x / 8];
        let paper = byte & (0x80 >> (x % 8)) != 0;
        Some(if paper {
            BinaryColor::Off
        } else {
            BinaryColor::On
        })
    }

    fn index_of(&self, point: Point) -> Option<(usize, usize)> {
        let x = usize::try_from(point.x).ok()?;
        let y = usize::try_from(point.y).ok()?;
        (x < self.width as usize && y < self.height as usize).then_some((x, y))
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let idx = y * self.stride() + x / 8;
        let mask = 0x80 >> (x % 8);
        match color {
            BinaryColor::On => self.bits[idx] &= !mask,
            BinaryColor::Off => self.bits[idx] |= mask,
        }
    }

    /// Widen `area` horizontally to whole bytes and clip it to the buffer.
    ///
    /// Panel controllers address RAM in bytes along x, so partial windows
    /// must start and end on a byte boundary.
    pub fn align_window(&self, area: &Rectangle) -> Rectangle {
        let bounds = self.bounding_box();
        let clipped = bounds.intersection(area);
        if clipped.is_zero_sized() {
            return Rectangle::zero();
        }
        let x0 = clipped.top_left.x & !7;
        let x1 = (clipped.top_left.x + clipped.size.width as i32 + 7) & !7;
        let x1 = x1.min(self.width as i32);
        Rectangle::new(
            Point::new(x0, clipped.top_left.y),
            Size::new((x1 - x0) as u32, clipped.size.height),
        )
    }

    /// Copy the byte-aligned window covering `area` into `out`.
    ///
    /// Returns the aligned rectangle actually copied; `out` then holds its
    /// rows back to back in panel order.
    pub fn copy_window(&self, area: &Rectangle, out: &mut Vec<u8>) -> Rectangle {
        let window = self.align_window(area);
        out.clear();
        if window.is_zero_sized() {
            return window;
        }
        let stride = self.stride();
        let first = window.top_left.x as usize / 8;
        let len = Self::stride_of(window.size.width);
        let y0 = window.top_left.y as usize;
        for y in y0..y0 + window.size.height as usize {
            let row = y * stride + first;
            out.extend_from_slice(&self.bits[row..row + len]);
        }
        window
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if let Some((x, y)) = self.index_of(coord) {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = self.bounding_box().intersection(area);
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => 0x00,
            BinaryColor::Off => 0xFF,
        };
        self.bits.fill(fill);
        Ok(())
    }
}
