//! Light components.
//!
//! Lights are defined in their node's local space: a point light sits at the
//! origin, directional and area lights shine along local -Z, and an area
//! light's emitting quad spans the local XY plane.

use sable_math::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Point,
    Directional,
    Area { width: f32, height: f32 },
}

#[derive(Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Constant, linear and quadratic distance attenuation terms.
    /// Ignored by directional lights.
    pub attenuation: [f32; 3],
    /// Radius of the visible disc drawn for point lights
    pub flare_radius: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Vec3::ONE,
            intensity: 1.0,
            attenuation: [1.0, 0.0, 0.0],
            flare_radius: 0.1,
        }
    }
}

impl Light {
    pub fn point(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity,
            ..Default::default()
        }
    }

    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
            ..Default::default()
        }
    }

    pub fn area(width: f32, height: f32, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Area { width, height },
            color,
            intensity,
            ..Default::default()
        }
    }

    pub fn with_attenuation(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.attenuation = [constant, linear, quadratic];
        self
    }

    pub fn with_flare_radius(mut self, radius: f32) -> Self {
        self.flare_radius = radius;
        self
    }

    /// Emitted colour before distance falloff.
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Distance falloff factor in [0, 1].
    pub fn attenuation(&self, distance: f32) -> f32 {
        if self.kind == LightKind::Directional {
            return 1.0;
        }
        let [c, l, q] = self.attenuation;
        let denom = c + l * distance + q * distance * distance;
        if denom <= 1.0 {
            1.0
        } else {
            1.0 / denom
        }
    }
}
