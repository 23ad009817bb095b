//! Visible proxies for light sources.
//!
//! Lights have no surface of their own, so camera rays would never see
//! them. A flare gives point lights a small ray-facing disc and area lights
//! their emitting quad.

use sable_core::LightKind;
use sable_math::{Aabb, Interval, Mat4, Ray, Vec2, Vec3};

use crate::intersection::Intersection;
use crate::light::TraceLight;

#[derive(Clone, Debug)]
enum FlareShape {
    /// Disc that always faces the incoming ray
    Disc { center: Vec3, radius: f32 },
    /// Light-local quad in the XY plane, visible from the -Z side only
    Quad {
        inverse: Mat4,
        half_width: f32,
        half_height: f32,
        normal: Vec3,
    },
}

#[derive(Clone, Debug)]
pub struct TraceFlare {
    shape: FlareShape,
    emission: Vec3,
    bbox: Aabb,
}

impl TraceFlare {
    /// Flare for a point or area light; directional lights have none.
    pub fn from_light(light: &TraceLight) -> Option<Self> {
        let emission = light.light().radiance();
        match light.kind() {
            LightKind::Directional => None,
            LightKind::Point => {
                let center = light.world_position();
                let radius = light.light().flare_radius.abs();
                let r = Vec3::splat(radius);
                Some(Self {
                    shape: FlareShape::Disc { center, radius },
                    emission,
                    bbox: Aabb::from_points(center - r, center + r),
                })
            }
            LightKind::Area { width, height } => {
                let corners = [
                    light.sample_point(0.0, 0.0),
                    light.sample_point(1.0, 0.0),
                    light.sample_point(0.0, 1.0),
                    light.sample_point(1.0, 1.0),
                ];
                Some(Self {
                    shape: FlareShape::Quad {
                        inverse: *light.inverse(),
                        half_width: width.abs() * 0.5,
                        half_height: height.abs() * 0.5,
                        normal: light.world_direction(),
                    },
                    emission,
                    bbox: Aabb::from_point_cloud(&corners),
                })
            }
        }
    }

    pub fn world_bbox(&self) -> Aabb {
        self.bbox
    }

    /// Light colour times intensity.
    pub fn emission(&self) -> Vec3 {
        self.emission
    }

    /// Brightness multiplier at a point on the flare: fades from 1 at the
    /// centre of a disc to 0 at its rim; constant across a quad.
    pub fn falloff(&self, point: Vec3) -> f32 {
        match &self.shape {
            FlareShape::Disc { center, radius } => {
                if *radius <= 0.0 {
                    return 0.0;
                }
                let d = (point - *center).length() / radius;
                (1.0 - d * d).clamp(0.0, 1.0)
            }
            FlareShape::Quad { .. } => 1.0,
        }
    }

    pub fn intersect(&self, ray: &Ray, ray_t: Interval, hit: &mut Intersection) -> bool {
        match &self.shape {
            FlareShape::Disc { center, radius } => {
                let dd = ray.direction.length_squared();
                if dd == 0.0 {
                    return false;
                }
                let t = (*center - ray.origin).dot(ray.direction) / dd;
                if !ray_t.contains(t) {
                    return false;
                }
                let p = ray.at(t);
                let offset = p - *center;
                if offset.length_squared() > radius * radius {
                    return false;
                }
                let facing = -ray.direction / dd.sqrt();
                hit.t = t;
                hit.point = p;
                hit.normal = facing;
                hit.true_normal = facing;
                hit.uv = Vec2::new(offset.length() / radius.max(f32::MIN_POSITIVE), 0.0);
                true
            }
            FlareShape::Quad {
                inverse,
                half_width,
                half_height,
                normal,
            } => {
                let origin = inverse.transform_point3(ray.origin);
                let direction = inverse.transform_vector3(ray.direction);
                // Emits along local -Z, so only rays heading towards +Z see it.
                if direction.z <= 0.0 {
                    return false;
                }
                let t = -origin.z / direction.z;
                if !ray_t.contains(t) {
                    return false;
                }
                let p = origin + direction * t;
                if p.x.abs() > *half_width || p.y.abs() > *half_height {
                    return false;
                }
                hit.t = t;
                hit.point = ray.at(t);
                hit.normal = *normal;
                hit.true_normal = *normal;
                hit.uv = Vec2::new(
                    0.5 + p.x / (2.0 * half_width.max(f32::MIN_POSITIVE)),
                    0.5 + p.y / (2.0 * half_height.max(f32::MIN_POSITIVE)),
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::Light;

    fn wide() -> Interval {
        Interval::new(1e-4, f32::INFINITY)
    }

    #[test]
    fn test_directional_has_no_flare() {
        let tl = TraceLight::new(Light::directional(Vec3::ONE, 1.0), Mat4::IDENTITY);
        assert!(TraceFlare::from_light(&tl).is_none());
    }

    #[test]
    fn test_point_flare_faces_every_ray() {
        let light = Light::point(Vec3::new(1.0, 0.5, 0.0), 2.0).with_flare_radius(0.5);
        let tl = TraceLight::new(light, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
        let flare = TraceFlare::from_light(&tl).unwrap();
        assert_eq!(flare.emission(), Vec3::new(2.0, 1.0, 0.0));

        for origin in [Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), Vec3::new(5.0, 0.0, -5.0)] {
            let ray = Ray::towards(origin, Vec3::new(0.0, 0.0, -5.0));
            let mut hit = Intersection::miss();
            assert!(flare.intersect(&ray, wide(), &mut hit));
            assert!((flare.falloff(hit.point) - 1.0).abs() < 1e-4);
            assert!(hit.normal.dot(ray.direction) < 0.0);
        }

        let grazing = Ray::new(Vec3::new(0.4, 0.0, 0.0), Vec3::NEG_Z);
        let mut hit = Intersection::miss();
        assert!(flare.intersect(&grazing, wide(), &mut hit));
        assert!(flare.falloff(hit.point) < 0.4);

        let miss = Ray::new(Vec3::new(0.6, 0.0, 0.0), Vec3::NEG_Z);
        assert!(!flare.intersect(&miss, wide(), &mut Intersection::miss()));
    }

    #[test]
    fn test_area_flare_visible_from_front_only() {
        // Light at z = 2 shining towards -Z; the camera sits below it at the origin.
        let tl = TraceLight::new(
            Light::area(2.0, 1.0, Vec3::ONE, 1.0),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)),
        );
        let flare = TraceFlare::from_light(&tl).unwrap();
        let bbox = flare.world_bbox();
        assert!((bbox.x.max - 1.0).abs() < 1e-3);
        assert!((bbox.y.max - 0.5).abs() < 1e-3);

        let front = Ray::new(Vec3::new(0.9, 0.4, 0.0), Vec3::Z);
        let mut hit = Intersection::miss();
        assert!(flare.intersect(&front, wide(), &mut hit));
        assert!((hit.t - 2.0).abs() < 1e-5);
        assert_eq!(flare.falloff(hit.point), 1.0);

        let back = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::NEG_Z);
        assert!(!flare.intersect(&back, wide(), &mut Intersection::miss()));

        let outside = Ray::new(Vec3::new(0.0, 0.6, 0.0), Vec3::Z);
        assert!(!flare.intersect(&outside, wide(), &mut Intersection::miss()));
    }
}
