//! In-memory textures sampled by material channels.
//!
//! Decoding image files is the asset importer's job; by the time a scene
//! snapshot reaches the raytracer every texture is plain linear RGBA floats.

use sable_math::{Vec2, Vec3};

/// Row-major linear RGBA texture.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    /// `[R, G, B, A]` per texel, top row first
    pub pixels: Vec<[f32; 4]>,
}

impl Texture {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// 1x1 texture of a single colour.
    pub fn solid_color(color: Vec3) -> Self {
        Self::new(1, 1, vec![[color.x, color.y, color.z, 1.0]])
    }

    /// Two-colour checkerboard with `cells` squares per side.
    pub fn checker(cells: u32, a: Vec3, b: Vec3) -> Self {
        let cells = cells.max(1);
        let mut pixels = Vec::with_capacity((cells * cells) as usize);
        for y in 0..cells {
            for x in 0..cells {
                let c = if (x + y) % 2 == 0 { a } else { b };
                pixels.push([c.x, c.y, c.z, 1.0]);
            }
        }
        Self::new(cells, cells, pixels)
    }

    /// Nearest texel lookup with wrapping; (0, 0) is the bottom-left corner.
    pub fn sample_nearest(&self, uv: Vec2) -> Vec3 {
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.rem_euclid(1.0);
        let x = ((u * self.width as f32) as u32).min(self.width.saturating_sub(1));
        let y = (((1.0 - v) * self.height as f32) as u32).min(self.height.saturating_sub(1));
        self.texel(x, y)
    }

    /// Bilinear lookup with wrapping; (0, 0) is the bottom-left corner.
    pub fn sample(&self, uv: Vec2) -> Vec3 {
        if self.width == 0 || self.height == 0 {
            return Vec3::ZERO;
        }
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.rem_euclid(1.0);

        let x = u * (self.width as f32 - 1.0);
        let y = (1.0 - v) * (self.height as f32 - 1.0);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x.fract();
        let fy = y.fract();

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), fx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    fn texel(&self, x: u32, y: u32) -> Vec3 {
        let idx = (y * self.width + x) as usize;
        self.pixels
            .get(idx)
            .map_or(Vec3::ZERO, |p| Vec3::new(p[0], p[1], p[2]))
    }
}
