// Frame - immutable RGBA video frame shared between the source and the detector

use std::sync::Arc;

use crate::calibration::Roi;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// One captured video frame, RGBA8 row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Frame {
    /// Wrap raw RGBA bytes
    ///
    /// Returns None when the buffer length does not match `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Uniform frame of a single colour
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * BYTES_PER_PIXEL);
        for _ in 0..count {
            pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Copy of this frame with `block` painted in `rgb`
    pub fn with_block(&self, block: Roi, rgb: [u8; 3]) -> Self {
        let block = block.clamp_to(self.width, self.height);
        let mut pixels = self.pixels.to_vec();
        for y in block.y..block.bottom() {
            for x in block.x..block.right() {
                let idx = self.index(x, y);
                pixels[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            pixels: pixels.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB at (x, y); caller keeps coordinates in bounds
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = self.index(x, y);
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }
}
