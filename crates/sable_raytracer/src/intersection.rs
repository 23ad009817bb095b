//! Ray-surface hit records.

use sable_core::Material;
use sable_math::{Vec2, Vec3};

use crate::object::TraceObject;

/// What a ray is being traced for. Decides which objects it can see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RayType {
    Camera,
    Shadow,
    Reflection,
    Refraction,
    Diffuse,
}

/// Record of the nearest ray-object intersection found so far.
#[derive(Clone, Debug)]
pub struct Intersection<'a> {
    /// Object that was hit
    pub object: Option<&'a TraceObject>,
    /// Ray parameter of the hit; `MISS_T` until something is hit
    pub t: f32,
    /// World-space hit point
    pub point: Vec3,
    /// Interpolated shading normal (unit length, not flipped towards the ray)
    pub normal: Vec3,
    /// Geometric normal of the hit surface (unit length)
    pub true_normal: Vec3,
    /// Surface parameterisation at the hit
    pub uv: Vec2,
}

impl<'a> Intersection<'a> {
    /// Sentinel `t` of an intersection that has not hit anything.
    pub const MISS_T: f32 = f32::INFINITY;

    pub fn miss() -> Self {
        Self {
            object: None,
            t: Self::MISS_T,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
            true_normal: Vec3::ZERO,
            uv: Vec2::ZERO,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.object.is_some()
    }

    /// Material of the hit object; `None` on a miss or for light flares.
    pub fn material(&self) -> Option<&'a Material> {
        self.object.and_then(|object| object.material())
    }

    /// True when the ray arrived on the side the geometric normal faces.
    pub fn front_face(&self, direction: Vec3) -> bool {
        direction.dot(self.true_normal) < 0.0
    }
}

impl Default for Intersection<'_> {
    fn default() -> Self {
        Self::miss()
    }
}
