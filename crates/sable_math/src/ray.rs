use crate::Vec3;

/// A half-line starting at `origin` and travelling along `direction`.
///
/// The direction is expected to be unit length by shading code, but nothing
/// here enforces it: intersection routines work with any non-zero direction
/// and report `t` in units of `direction`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Builds a ray from `origin` towards `target` with a unit direction.
    pub fn towards(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, (target - origin).normalize_or_zero())
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Point along the ray: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }
}
