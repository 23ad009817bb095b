//! Shared RGB output buffer.
//!
//! Workers write disjoint pixel ranges (one tile each) while the UI may read
//! the whole buffer at any time for a progressive preview. Every byte is an
//! `AtomicU8` accessed with relaxed ordering, so concurrent access needs no
//! lock; a reader may see a pixel half-written, which only shows up as a
//! momentary colour glitch in the preview.

use std::sync::atomic::{AtomicU8, Ordering};

use sable_math::Vec3;

/// Clamp a value to the [0, 1] range.
#[inline]
pub fn clamp_01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Clamp to [0, 1] and quantize to 8-bit RGB. No gamma is applied.
pub fn color_to_rgb(color: Vec3) -> [u8; 3] {
    let quantize = |c: f32| {
        // NaN maps to black
        if c.is_nan() {
            0
        } else {
            (255.0 * clamp_01(c)).round() as u8
        }
    };
    [quantize(color.x), quantize(color.y), quantize(color.z)]
}

/// Inverse of `color_to_rgb` up to quantization.
pub fn rgb_to_color(rgb: [u8; 3]) -> Vec3 {
    Vec3::new(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32) / 255.0
}

/// `width * height * 3` bytes, row-major, zero-initialised.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bytes: Box<[AtomicU8]>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 3;
        Self {
            width,
            height,
            bytes: (0..len).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn offset(&self, i: u32, j: u32) -> usize {
        debug_assert!(i < self.width && j < self.height, "pixel ({i}, {j}) out of bounds");
        (i as usize + j as usize * self.width as usize) * 3
    }

    pub fn set(&self, i: u32, j: u32, rgb: [u8; 3]) {
        let offset = self.offset(i, j);
        for (byte, value) in self.bytes[offset..offset + 3].iter().zip(rgb) {
            byte.store(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, i: u32, j: u32) -> [u8; 3] {
        let offset = self.offset(i, j);
        let mut rgb = [0; 3];
        for (value, byte) in rgb.iter_mut().zip(&self.bytes[offset..offset + 3]) {
            *value = byte.load(Ordering::Relaxed);
        }
        rgb
    }

    /// Colour stored at a pixel, clamped to `[0, 1]` by construction.
    pub fn color(&self, i: u32, j: u32) -> Vec3 {
        rgb_to_color(self.get(i, j))
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }
}
