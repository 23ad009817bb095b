//! Sable math - vector types and the geometric primitives shared by the
//! scene snapshot and the raytracer.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Mat4Ext;

/// Offset used to push secondary ray origins off a surface and to reject
/// self-intersections near `t = 0`.
pub const RAY_EPSILON: f32 = 1e-4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glam_reexport() {
        let v = Vec3::new(1.0, 2.0, 3.0) + Vec3::ONE;
        assert_eq!(v, Vec3::new(2.0, 3.0, 4.0));
    }
}
