//! Recursive ray integration.
//!
//! A camera ray picks up emission and direct light at its first hit, then
//! spawns reflection, refraction and (in Monte Carlo modes) diffuse rays,
//! each weighted by how much of their light reaches the parent. Recursion
//! stops at `max_depth` or once a path's throughput is negligible.

use std::f32::consts::PI;

use rand::{Rng, RngCore};
use sable_core::{DebugRay, DebugRayKind, MaterialSample, ShadowMode};
use sable_math::{Interval, Ray, Vec3, RAY_EPSILON};

use crate::intersection::{Intersection, RayType};
use crate::light::{LightSample, TraceLight};
use crate::scene::TraceScene;
use crate::settings::RayTracerSettings;

/// Paths carrying less than this are dropped.
pub const MIN_THROUGHPUT: f32 = 1e-3;

/// Upper bound on occluders a translucent shadow ray passes through.
const MAX_SHADOW_LAYERS: usize = 32;

/// Length of debug segments for rays that leave the scene.
const DEBUG_MISS_LENGTH: f32 = 10.0;
const DEBUG_NORMAL_LENGTH: f32 = 0.25;

/// Mirror `direction` about `normal`.
#[inline]
pub fn reflect(direction: Vec3, normal: Vec3) -> Vec3 {
    direction - 2.0 * direction.dot(normal) * normal
}

/// Snell refraction of a unit `direction` through a surface whose `normal`
/// faces against it. `eta` is incident over transmitted index. `None` on
/// total internal reflection.
pub fn refract(direction: Vec3, normal: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = (-direction).dot(normal).min(1.0);
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return None;
    }
    Some((eta * direction + (eta * cos_i - k.sqrt()) * normal).normalize_or_zero())
}

/// Schlick's approximation of the Fresnel reflectance. Returns 1 under
/// total internal reflection.
pub fn schlick(cos_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let r0 = ((eta_i - eta_t) / (eta_i + eta_t)).powi(2);
    let mut cos = cos_i.clamp(0.0, 1.0);
    if eta_i > eta_t {
        let sin2_t = (eta_i / eta_t).powi(2) * (1.0 - cos * cos);
        if sin2_t > 1.0 {
            return 1.0;
        }
        cos = (1.0 - sin2_t).sqrt();
    }
    r0 + (1.0 - r0) * (1.0 - cos).powi(5)
}

/// Cosine-weighted direction on the hemisphere around `normal`.
pub fn cosine_direction(normal: Vec3, rng: &mut dyn RngCore) -> Vec3 {
    let (tangent, bitangent) = normal.any_orthonormal_pair();
    let r1: f32 = rng.gen();
    let r2: f32 = rng.gen();
    let phi = 2.0 * PI * r1;
    let r = r2.sqrt();
    (tangent * (r * phi.cos()) + bitangent * (r * phi.sin()) + normal * (1.0 - r2).max(0.0).sqrt())
        .normalize_or_zero()
}

fn debug_kind(ray_type: RayType) -> DebugRayKind {
    match ray_type {
        RayType::Camera => DebugRayKind::Camera,
        RayType::Shadow => DebugRayKind::Shadow,
        RayType::Reflection => DebugRayKind::Reflection,
        RayType::Refraction => DebugRayKind::Refraction,
        RayType::Diffuse => DebugRayKind::Diffuse,
    }
}

fn record(debug: &mut Option<&mut Vec<DebugRay>>, start: Vec3, end: Vec3, kind: DebugRayKind) {
    if let Some(rays) = debug.as_deref_mut() {
        rays.push(DebugRay { start, end, kind });
    }
}

/// A secondary ray and the fraction of its radiance that reaches the hit.
struct Branch {
    ray: Ray,
    weight: Vec3,
    ray_type: RayType,
}

/// Shading context shared by every ray of a render.
#[derive(Clone, Copy)]
pub struct Tracer<'a> {
    settings: &'a RayTracerSettings,
    scene: &'a TraceScene,
}

impl<'a> Tracer<'a> {
    pub fn new(settings: &'a RayTracerSettings, scene: &'a TraceScene) -> Self {
        Self { settings, scene }
    }

    pub fn settings(&self) -> &'a RayTracerSettings {
        self.settings
    }

    /// Radiance arriving along `ray`. `throughput` is the product of the
    /// branch weights from the camera down to this ray.
    pub fn trace_ray(
        &self,
        ray: &Ray,
        depth: u32,
        ray_type: RayType,
        throughput: Vec3,
        rng: &mut dyn RngCore,
        mut debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        let mut hit = Intersection::miss();
        if !self.scene.intersect(ray, ray_type, &mut hit) {
            record(&mut debug, ray.origin, ray.at(DEBUG_MISS_LENGTH), debug_kind(ray_type));
            return self.settings.background;
        }

        record(&mut debug, ray.origin, hit.point, debug_kind(ray_type));
        let front = hit.front_face(ray.direction);
        let normal = if front { hit.normal } else { -hit.normal };
        let true_normal = if front { hit.true_normal } else { -hit.true_normal };
        record(
            &mut debug,
            hit.point,
            hit.point + normal * DEBUG_NORMAL_LENGTH,
            DebugRayKind::Normal,
        );

        if let Some(flare) = hit.object.and_then(|object| object.as_flare()) {
            return flare.emission() * flare.falloff(hit.point);
        }
        let Some(material) = hit.material() else {
            return self.settings.background;
        };
        let surface = material.sample(hit.uv);

        let mut color = surface.emissive;
        color += self.direct_lighting(&hit, &surface, normal, true_normal, ray, rng, debug.as_deref_mut());

        if depth >= self.settings.max_depth {
            return color;
        }

        let branches = self.secondary_rays(&hit, &surface, normal, true_normal, front, ray, ray_type, rng);
        if branches.is_empty() {
            return color;
        }

        if self.settings.random_branching && branches.len() > 1 {
            let total: f32 = branches.iter().map(|b| b.weight.max_element()).sum();
            let mut pick = rng.gen::<f32>() * total;
            let chosen = branches
                .iter()
                .find(|b| {
                    pick -= b.weight.max_element();
                    pick <= 0.0
                })
                .or(branches.last());
            if let Some(branch) = chosen {
                let probability = branch.weight.max_element() / total;
                let weight = branch.weight / probability;
                color += self.follow(branch, weight, depth, throughput, rng, debug);
            }
        } else {
            for branch in &branches {
                color += self.follow(branch, branch.weight, depth, throughput, rng, debug.as_deref_mut());
            }
        }

        color
    }

    fn follow(
        &self,
        branch: &Branch,
        weight: Vec3,
        depth: u32,
        throughput: Vec3,
        rng: &mut dyn RngCore,
        debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        let throughput = throughput * weight;
        if throughput.max_element() < MIN_THROUGHPUT {
            return Vec3::ZERO;
        }
        weight * self.trace_ray(&branch.ray, depth + 1, branch.ray_type, throughput, rng, debug)
    }

    /// Lambert plus Phong highlight from every light, masked by shadows.
    #[allow(clippy::too_many_arguments)]
    fn direct_lighting(
        &self,
        hit: &Intersection,
        surface: &MaterialSample,
        normal: Vec3,
        true_normal: Vec3,
        ray: &Ray,
        rng: &mut dyn RngCore,
        mut debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        let diffuse = surface.diffuse * (Vec3::ONE - surface.transmittance);
        let has_specular = surface.specular.max_element() > 0.0;
        if diffuse.max_element() <= 0.0 && !has_specular {
            return Vec3::ZERO;
        }

        let view = -ray.direction.normalize_or_zero();
        let mut color = Vec3::ZERO;
        for light in self.scene.lights() {
            let (u, v) = if self.settings.is_randomized() {
                (rng.gen(), rng.gen())
            } else {
                (0.5, 0.5)
            };
            let Some(sample) = light.illuminate(hit.point, u, v) else {
                continue;
            };
            let n_dot_l = normal.dot(sample.direction);
            if n_dot_l <= 0.0 {
                continue;
            }

            let visibility = self.shadow(hit.point, true_normal, light, &sample, debug.as_deref_mut());
            if visibility.max_element() <= 0.0 {
                continue;
            }

            let mut contribution = diffuse * n_dot_l;
            if has_specular {
                let r = reflect(-sample.direction, normal);
                contribution += surface.specular * view.dot(r).max(0.0).powf(surface.shininess);
            }
            color += contribution * sample.radiance * visibility;
        }
        color
    }

    /// Fraction of a light sample's radiance that reaches `point`.
    fn shadow(
        &self,
        point: Vec3,
        true_normal: Vec3,
        light: &TraceLight,
        sample: &LightSample,
        mut debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        if self.settings.shadows == ShadowMode::None {
            return Vec3::ONE;
        }

        let offset = if true_normal.dot(sample.direction) >= 0.0 {
            true_normal
        } else {
            -true_normal
        };
        let ray = Ray::new(point + offset * RAY_EPSILON, sample.direction);
        let max_t = sample.distance - RAY_EPSILON;
        let light_end = if sample.distance.is_finite() {
            ray.at(sample.distance)
        } else {
            ray.at(DEBUG_MISS_LENGTH)
        };

        let mut hit = Intersection::miss();
        let mut ray_t = Interval::new(RAY_EPSILON, max_t);
        let mut transmitted = Vec3::ONE;

        for _ in 0..MAX_SHADOW_LAYERS {
            if !self.scene.intersect_within(&ray, ray_t, RayType::Shadow, &mut hit) {
                record(&mut debug, ray.origin, light_end, DebugRayKind::Shadow);
                return transmitted;
            }
            if self.settings.shadows == ShadowMode::Opaque {
                record(&mut debug, ray.origin, hit.point, DebugRayKind::Shadow);
                return Vec3::ZERO;
            }

            let occluder = hit
                .material()
                .map(|m| m.sample(hit.uv).transmittance)
                .unwrap_or(Vec3::ZERO);
            transmitted *= occluder;
            if transmitted.max_element() < MIN_THROUGHPUT {
                record(&mut debug, ray.origin, hit.point, DebugRayKind::Shadow);
                return Vec3::ZERO;
            }
            ray_t = Interval::new(hit.t + RAY_EPSILON, max_t);
        }

        log::debug!("Translucent shadow ray from {:?} gave up after {} layers", light.world_position(), MAX_SHADOW_LAYERS);
        record(&mut debug, ray.origin, light_end, DebugRayKind::Shadow);
        transmitted
    }

    #[allow(clippy::too_many_arguments)]
    fn secondary_rays(
        &self,
        hit: &Intersection,
        surface: &MaterialSample,
        normal: Vec3,
        true_normal: Vec3,
        front: bool,
        ray: &Ray,
        ray_type: RayType,
        rng: &mut dyn RngCore,
    ) -> Vec<Branch> {
        let mut branches = Vec::with_capacity(3);
        let direction = ray.direction.normalize_or_zero();
        let above = hit.point + true_normal * RAY_EPSILON;
        let below = hit.point - true_normal * RAY_EPSILON;

        // Diffuse paths only turn specular when caustics are on.
        let specular_allowed = ray_type != RayType::Diffuse || self.settings.caustics;

        if specular_allowed {
            let transmits = surface.transmittance.max_element() > 0.0;
            let (eta_i, eta_t) = if front {
                (1.0, surface.ior)
            } else {
                (surface.ior, 1.0)
            };
            let cos_i = (-direction).dot(normal);
            let refracted = if transmits {
                refract(direction, normal, eta_i / eta_t)
            } else {
                None
            };
            let fresnel = if refracted.is_some() {
                schlick(cos_i, eta_i, eta_t)
            } else {
                1.0
            };

            let mut reflect_weight = surface.specular;
            if transmits {
                reflect_weight += surface.transmittance * fresnel;
            }
            if self.settings.reflections && reflect_weight.max_element() > 0.0 {
                branches.push(Branch {
                    ray: Ray::new(above, reflect(direction, normal).normalize_or_zero()),
                    weight: reflect_weight,
                    ray_type: RayType::Reflection,
                });
            }

            if let Some(refracted) = refracted {
                let weight = surface.transmittance * (1.0 - fresnel);
                if self.settings.refractions && weight.max_element() > 0.0 {
                    branches.push(Branch {
                        ray: Ray::new(below, refracted),
                        weight,
                        ray_type: RayType::Refraction,
                    });
                }
            }
        }

        if self.settings.diffuse_reflection {
            let albedo = surface.diffuse * (Vec3::ONE - surface.transmittance);
            if albedo.max_element() > 0.0 {
                branches.push(Branch {
                    ray: Ray::new(above, cosine_direction(normal, rng)),
                    weight: albedo,
                    ray_type: RayType::Diffuse,
                });
            }
        }

        branches
    }
}
