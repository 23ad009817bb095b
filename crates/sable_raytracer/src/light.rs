//! Light snapshot used for direct illumination.

use sable_core::{Light, LightKind};
use sable_math::{Mat3, Mat4, Mat4Ext, Vec3};

/// Incoming light at a surface point from one light sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSample {
    /// Unit vector from the surface point towards the light
    pub direction: Vec3,
    /// Distance to the light sample (infinite for directional lights)
    pub distance: f32,
    /// Colour arriving at the point, before visibility
    pub radiance: Vec3,
}

/// A light component frozen together with its world transform.
#[derive(Clone, Debug)]
pub struct TraceLight {
    light: Light,
    transform: Mat4,
    inverse: Mat4,
    normal_matrix: Mat3,
}

impl TraceLight {
    pub fn new(light: Light, world: Mat4) -> Self {
        Self {
            light,
            transform: world,
            inverse: world.inverse(),
            normal_matrix: world.normal_matrix(),
        }
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn kind(&self) -> LightKind {
        self.light.kind
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn inverse(&self) -> &Mat4 {
        &self.inverse
    }

    pub fn world_position(&self) -> Vec3 {
        self.transform.transform_point3(Vec3::ZERO)
    }

    /// Direction the light shines in (local -Z in world space).
    pub fn world_direction(&self) -> Vec3 {
        (self.normal_matrix * Vec3::NEG_Z).normalize_or_zero()
    }

    /// World-space half extents of an area light along its local X and Y.
    pub fn area_half_axes(&self) -> Option<(Vec3, Vec3)> {
        match self.light.kind {
            LightKind::Area { width, height } => Some((
                self.transform.transform_vector3(Vec3::X * (width * 0.5)),
                self.transform.transform_vector3(Vec3::Y * (height * 0.5)),
            )),
            _ => None,
        }
    }

    /// Point on the light for the sample coordinates `(u, v)` in [0, 1]^2.
    /// Only area lights have extent; others return their position.
    pub fn sample_point(&self, u: f32, v: f32) -> Vec3 {
        match self.area_half_axes() {
            Some((ax, ay)) => self.world_position() + (2.0 * u - 1.0) * ax + (2.0 * v - 1.0) * ay,
            None => self.world_position(),
        }
    }

    /// Light arriving at `point` from the sample `(u, v)`. `None` when the
    /// point is behind an area light or exactly at a point light.
    pub fn illuminate(&self, point: Vec3, u: f32, v: f32) -> Option<LightSample> {
        let radiance = self.light.radiance();
        match self.light.kind {
            LightKind::Directional => Some(LightSample {
                direction: -self.world_direction(),
                distance: f32::INFINITY,
                radiance,
            }),
            LightKind::Point => {
                let to_light = self.world_position() - point;
                let distance = to_light.length();
                if distance <= 0.0 {
                    return None;
                }
                Some(LightSample {
                    direction: to_light / distance,
                    distance,
                    radiance: radiance * self.light.attenuation(distance),
                })
            }
            LightKind::Area { .. } => {
                let to_light = self.sample_point(u, v) - point;
                let distance = to_light.length();
                if distance <= 0.0 {
                    return None;
                }
                let direction = to_light / distance;
                let emitter_cos = (-direction).dot(self.world_direction());
                if emitter_cos <= 0.0 {
                    return None;
                }
                Some(LightSample {
                    direction,
                    distance,
                    radiance: radiance * self.light.attenuation(distance) * emitter_cos,
                })
            }
        }
    }
}
