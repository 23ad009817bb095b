// Transform helpers on top of glam::Mat4.
//
// glam already provides transform_point3 / transform_vector3 / inverse.

use glam::{Mat3, Mat4, Vec3};

use crate::Aabb;

pub trait Mat4Ext {
    /// Bounding box of the 8 transformed corners of `aabb`.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transpose of the inverse of the upper 3x3; maps surface normals so
    /// they stay perpendicular under non-uniform scale.
    fn normal_matrix(&self) -> Mat3;

    /// True when the matrix is the identity within `epsilon`.
    fn is_near_identity(&self, epsilon: f32) -> bool;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        let (lo, hi) = (aabb.min(), aabb.max());
        let corners: Vec<Vec3> = (0..8)
            .map(|i| {
                let corner = Vec3::new(
                    if i & 1 == 0 { lo.x } else { hi.x },
                    if i & 2 == 0 { lo.y } else { hi.y },
                    if i & 4 == 0 { lo.z } else { hi.z },
                );
                self.transform_point3(corner)
            })
            .collect();
        Aabb::from_point_cloud(&corners)
    }

    fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(*self).inverse().transpose()
    }

    fn is_near_identity(&self, epsilon: f32) -> bool {
        self.abs_diff_eq(Mat4::IDENTITY, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_transform_aabb_translation() {
        let m = Mat4::from_translation(Vec3::new(5.0, 0.0, -2.0));
        let moved = m.transform_aabb(&Aabb::from_points(Vec3::ZERO, Vec3::ONE));
        assert!((moved.min() - Vec3::new(5.0, 0.0, -2.0)).length() < 1e-4);
        assert!((moved.max() - Vec3::new(6.0, 1.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_box() {
        let m = Mat4::from_rotation_z(FRAC_PI_2 / 2.0);
        let rotated = m.transform_aabb(&Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0)));
        let half = std::f32::consts::SQRT_2;
        assert!((rotated.x.max - half).abs() < 1e-4);
        assert!((rotated.z.max - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_transform_aabb_empty_stays_empty() {
        let m = Mat4::from_scale(Vec3::splat(3.0));
        assert!(m.transform_aabb(&Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        // Plane x + y = 0 has normal (1, 1, 0)/sqrt2. Stretch x by 2: the
        // surface becomes x/2 + y = 0, whose normal is (1, 2, 0)/sqrt5.
        let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = (m.normal_matrix() * Vec3::new(1.0, 1.0, 0.0)).normalize();
        let expected = Vec3::new(1.0, 2.0, 0.0).normalize();
        assert!((n - expected).length() < 1e-5);
    }

    #[test]
    fn test_is_near_identity() {
        assert!(Mat4::IDENTITY.is_near_identity(1e-6));
        assert!(!Mat4::from_translation(Vec3::X).is_near_identity(1e-6));
    }
}
