//! Surface materials as seen by both the realtime preview and the raytracer.

use std::sync::Arc;

use sable_math::{Vec2, Vec3};

use crate::texture::Texture;

/// Shader model selected in the material editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadingModel {
    /// Lambert diffuse + Phong highlight; fully traceable.
    #[default]
    Phong,
    /// Diffuse only, no highlight.
    Flat,
    /// Realtime debug shader with no offline equivalent.
    Wireframe,
}

/// A constant colour, optionally modulated by a texture.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    pub color: Vec3,
    pub texture: Option<Arc<Texture>>,
}

impl Channel {
    pub fn constant(color: Vec3) -> Self {
        Self {
            color,
            texture: None,
        }
    }

    pub fn textured(color: Vec3, texture: Arc<Texture>) -> Self {
        Self {
            color,
            texture: Some(texture),
        }
    }

    pub fn sample(&self, uv: Vec2) -> Vec3 {
        match &self.texture {
            Some(texture) => self.color * texture.sample(uv),
            None => self.color,
        }
    }
}

/// Material channels evaluated at one surface point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSample {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub emissive: Vec3,
    pub transmittance: Vec3,
    pub shininess: f32,
    pub ior: f32,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub model: ShadingModel,
    pub diffuse: Channel,
    pub specular: Channel,
    pub emissive: Channel,
    /// Fraction of light passing straight through the surface
    pub transmittance: Channel,
    /// Phong exponent
    pub shininess: f32,
    /// Index of refraction of the medium behind the surface
    pub ior: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: ShadingModel::Phong,
            diffuse: Channel::constant(Vec3::splat(0.5)),
            specular: Channel::constant(Vec3::ZERO),
            emissive: Channel::constant(Vec3::ZERO),
            transmittance: Channel::constant(Vec3::ZERO),
            shininess: 32.0,
            ior: 1.5,
        }
    }
}

impl Material {
    /// Plain Lambert material with the given albedo.
    pub fn diffuse(name: impl Into<String>, albedo: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse: Channel::constant(albedo),
            ..Default::default()
        }
    }

    /// Pure emitter; ignores lighting.
    pub fn emissive(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse: Channel::constant(Vec3::ZERO),
            emissive: Channel::constant(color),
            ..Default::default()
        }
    }

    /// Perfect mirror tinted by `tint`.
    pub fn mirror(name: impl Into<String>, tint: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse: Channel::constant(Vec3::ZERO),
            specular: Channel::constant(tint),
            shininess: 1000.0,
            ..Default::default()
        }
    }

    /// Clear dielectric with the given index of refraction.
    pub fn glass(name: impl Into<String>, ior: f32) -> Self {
        Self {
            name: name.into(),
            diffuse: Channel::constant(Vec3::ZERO),
            transmittance: Channel::constant(Vec3::ONE),
            ior,
            ..Default::default()
        }
    }

    pub fn with_specular(mut self, specular: Vec3, shininess: f32) -> Self {
        self.specular = Channel::constant(specular);
        self.shininess = shininess;
        self
    }

    pub fn with_transmittance(mut self, transmittance: Vec3) -> Self {
        self.transmittance = Channel::constant(transmittance);
        self
    }

    pub fn with_model(mut self, model: ShadingModel) -> Self {
        self.model = model;
        self
    }

    /// Whether the offline renderer can shade this material at all.
    pub fn is_traceable(&self) -> bool {
        self.model != ShadingModel::Wireframe && self.ior.is_finite() && self.ior > 0.0
    }

    /// Evaluate every channel at `uv`.
    pub fn sample(&self, uv: Vec2) -> MaterialSample {
        let specular = match self.model {
            ShadingModel::Flat => Vec3::ZERO,
            _ => self.specular.sample(uv),
        };
        MaterialSample {
            diffuse: self.diffuse.sample(uv),
            specular,
            emissive: self.emissive.sample(uv),
            transmittance: self.transmittance.sample(uv).clamp(Vec3::ZERO, Vec3::ONE),
            shininess: self.shininess.max(0.0),
            ior: self.ior,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textured_channel_modulates_color() {
        let tex = Arc::new(Texture::solid_color(Vec3::new(0.5, 1.0, 0.0)));
        let channel = Channel::textured(Vec3::splat(0.8), tex);
        let c = channel.sample(Vec2::new(0.3, 0.3));
        assert!((c - Vec3::new(0.4, 0.8, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_wireframe_is_not_traceable() {
        assert!(Material::default().is_traceable());
        assert!(!Material::default()
            .with_model(ShadingModel::Wireframe)
            .is_traceable());
        let broken = Material {
            ior: f32::NAN,
            ..Default::default()
        };
        assert!(!broken.is_traceable());
    }

    #[test]
    fn test_flat_model_drops_specular() {
        let mat = Material::diffuse("m", Vec3::ONE)
            .with_specular(Vec3::ONE, 10.0)
            .with_model(ShadingModel::Flat);
        assert_eq!(mat.sample(Vec2::ZERO).specular, Vec3::ZERO);
    }

    #[test]
    fn test_transmittance_is_clamped() {
        let mat = Material::diffuse("m", Vec3::ONE).with_transmittance(Vec3::splat(3.0));
        assert_eq!(mat.sample(Vec2::ZERO).transmittance, Vec3::ONE);
    }
}
