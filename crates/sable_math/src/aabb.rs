use std::ops::AddAssign;

use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box, one `Interval` per axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Contains nothing; the identity for `+=`.
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        let mut aabb = Self { x, y, z };
        aabb.pad_to_minimums();
        aabb
    }

    /// Box spanning two corner points, in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self::new(
            Interval::new(a.x.min(b.x), a.x.max(b.x)),
            Interval::new(a.y.min(b.y), a.y.max(b.y)),
            Interval::new(a.z.min(b.z), a.z.max(b.z)),
        )
    }

    /// Tightest box around a set of points. Empty input gives `EMPTY`.
    pub fn from_point_cloud(points: &[Vec3]) -> Self {
        let Some(first) = points.first() else {
            return Aabb::EMPTY;
        };
        let (min, max) = points
            .iter()
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Aabb::from_points(min, max)
    }

    pub fn surrounding(a: &Aabb, b: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&a.x, &b.x),
            y: Interval::surrounding(&a.y, &b.y),
            z: Interval::surrounding(&a.z, &b.z),
        }
    }

    /// Interval for an axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, axis: usize) -> Interval {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Total area of the six faces. Zero for an empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max() - self.min();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// True when `other` lies entirely inside this box. An empty box is
    /// contained by everything.
    pub fn contains(&self, other: &Aabb) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..3).all(|axis| {
            let outer = self.axis_interval(axis);
            let inner = other.axis_interval(axis);
            outer.min <= inner.min && inner.max <= outer.max
        })
    }

    /// Slab test. Returns the parameter at which the ray enters the box,
    /// clamped to `ray_t.min`, or `None` if the ray misses within `ray_t`.
    pub fn intersect(&self, ray: &Ray, mut ray_t: Interval) -> Option<f32> {
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let inv_d = 1.0 / ray.direction[axis];
            let mut t0 = (slab.min - ray.origin[axis]) * inv_d;
            let mut t1 = (slab.max - ray.origin[axis]) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // NaN from 0 * inf (origin on a slab plane, parallel ray) keeps
            // the previous bound thanks to f32::max/min semantics.
            ray_t.min = ray_t.min.max(t0);
            ray_t.max = ray_t.max.min(t1);
            if ray_t.max < ray_t.min {
                return None;
            }
        }
        Some(ray_t.min)
    }

    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> bool {
        self.intersect(ray, ray_t).is_some()
    }

    /// Pad thin axes so flat primitives (axis-aligned triangles, quads)
    /// still produce a box with volume.
    fn pad_to_minimums(&mut self) {
        let delta = 0.0001;
        if self.x.size() < delta {
            self.x = self.x.expand(delta);
        }
        if self.y.size() < delta {
            self.y = self.y.expand(delta);
        }
        if self.z.size() < delta {
            self.z = self.z.expand(delta);
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

impl AddAssign<Aabb> for Aabb {
    fn add_assign(&mut self, rhs: Aabb) {
        *self = Aabb::surrounding(self, &rhs);
    }
}

impl AddAssign<&Aabb> for Aabb {
    fn add_assign(&mut self, rhs: &Aabb) {
        *self = Aabb::surrounding(self, rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_aabb_from_points_any_order() {
        let aabb = Aabb::from_points(Vec3::new(4.0, 0.0, 2.0), Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(aabb.min(), Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(aabb.max(), Vec3::new(4.0, 3.0, 2.0));
    }

    #[test]
    fn test_aabb_add_assign_is_union() {
        let mut acc = Aabb::EMPTY;
        acc += Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        acc += &Aabb::from_points(Vec3::splat(3.0), Vec3::splat(4.0));
        assert_eq!(acc.min(), Vec3::ZERO);
        assert_eq!(acc.max(), Vec3::splat(4.0));
    }

    #[test]
    fn test_aabb_surface_area() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert!((aabb.surface_area() - 22.0).abs() < 1e-4);
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn test_aabb_contains() {
        let outer = unit_box();
        let inner = Aabb::from_points(Vec3::splat(-0.5), Vec3::splat(0.5));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(inner.contains(&Aabb::EMPTY));
    }

    #[test]
    fn test_aabb_intersect_entry_distance() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let t = unit_box().intersect(&ray, Interval::new(0.0, 100.0));
        assert!(t.is_some_and(|t| (t - 4.0).abs() < 1e-5));

        // Origin inside: entry clamps to the interval start.
        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(unit_box().intersect(&inside, Interval::new(0.0, 10.0)), Some(0.0));
    }

    #[test]
    fn test_aabb_intersect_misses() {
        let away = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::NEG_Z);
        assert!(!unit_box().hit(&away, Interval::new(0.0, 100.0)));

        let beside = Ray::new(Vec3::new(5.0, 0.0, -5.0), Vec3::Z);
        assert!(!unit_box().hit(&beside, Interval::new(0.0, 100.0)));

        // Box is beyond the allowed range.
        let short = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert!(!unit_box().hit(&short, Interval::new(0.0, 3.0)));
    }

    #[test]
    fn test_aabb_flat_box_is_padded() {
        let flat = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert!(flat.z.size() > 0.0);
        let ray = Ray::new(Vec3::new(0.5, 0.5, 1.0), Vec3::NEG_Z);
        assert!(flat.hit(&ray, Interval::new(0.0, 10.0)));
    }
}
