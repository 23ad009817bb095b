//! Per-pixel sampling policies.
//!
//! Screen space runs from -1 to 1 left to right and from 1 to -1 top to
//! bottom. A pixel is the rectangle starting at its top-left corner with
//! the (signed) footprint stored in the settings; every policy below places
//! camera samples somewhere inside that rectangle.

use std::f32::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use sable_core::{DebugRay, MonteCarlo};
use sable_math::{Ray, Vec3};

use crate::buffer::PixelBuffer;
use crate::intersection::RayType;
use crate::scene::TraceScene;
use crate::settings::{RayTracerSettings, SampleCount, MAX_SAMPLE_DEPTH};
use crate::shading::Tracer;

/// Which render pass a pixel is computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    /// One sample per pixel into the first-pass buffer
    WarmStart,
    /// The displayed result
    Final,
}

/// Screen-space rectangle: top-left corner plus signed size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Footprint {
    pub fn center(&self) -> (f32, f32) {
        (self.x + 0.5 * self.width, self.y + 0.5 * self.height)
    }

    /// Cell `(cx, cy)` of an `n` by `n` subdivision.
    pub fn cell(&self, n: u32, cx: u32, cy: u32) -> Footprint {
        let width = self.width / n as f32;
        let height = self.height / n as f32;
        Footprint {
            x: self.x + cx as f32 * width,
            y: self.y + cy as f32 * height,
            width,
            height,
        }
    }

    pub fn quadrants(&self) -> [Footprint; 4] {
        [self.cell(2, 0, 0), self.cell(2, 1, 0), self.cell(2, 0, 1), self.cell(2, 1, 1)]
    }

    /// Point at fractional position `(u, v)` inside the rectangle.
    pub fn at(&self, u: f32, v: f32) -> (f32, f32) {
        (self.x + u * self.width, self.y + v * self.height)
    }
}

/// Additive recurrence on the plastic constant; well spread in 2D for any
/// prefix length.
pub fn r2_point(k: u32) -> (f32, f32) {
    const G: f64 = 1.324_717_957_244_746;
    const A1: f64 = 1.0 / G;
    const A2: f64 = 1.0 / (G * G);
    let k = k as f64;
    ((0.5 + A1 * k).fract() as f32, (0.5 + A2 * k).fract() as f32)
}

/// Independent, reproducible random stream for one pixel of one pass.
pub fn pixel_rng(seed: u64, i: u32, j: u32, pass: Pass) -> SmallRng {
    let pixel = ((j as u64) << 32) | i as u64;
    let salt = match pass {
        Pass::WarmStart => 0x5741_524D,
        Pass::Final => 0,
    };
    SmallRng::seed_from_u64(seed ^ pixel.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ salt)
}

/// Largest per-channel spread of colours, e.g. between the quadrants of a
/// pixel.
pub fn color_spread(colors: &[Vec3]) -> f32 {
    let Some(first) = colors.first() else {
        return 0.0;
    };
    let (lo, hi) = colors
        .iter()
        .fold((*first, *first), |(lo, hi), c| (lo.min(*c), hi.max(*c)));
    (hi - lo).max_element()
}

/// Colour spread over the 3x3 neighbourhood of a pixel in `buffer`.
pub fn neighbourhood_spread(buffer: &PixelBuffer, i: u32, j: u32) -> f32 {
    let mut colors = Vec::with_capacity(9);
    for y in j.saturating_sub(1)..=(j + 1).min(buffer.height() - 1) {
        for x in i.saturating_sub(1)..=(i + 1).min(buffer.width() - 1) {
            colors.push(buffer.color(x, y));
        }
    }
    color_spread(&colors)
}

/// Running mean and variance (Welford).
#[derive(Clone, Copy, Debug, Default)]
struct RunningStats {
    count: u32,
    mean: Vec3,
    m2: Vec3,
}

impl RunningStats {
    fn push(&mut self, sample: Vec3) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f32;
        self.m2 += delta * (sample - self.mean);
    }

    /// Worst-channel standard error of the mean; infinite below two samples.
    fn std_error(&self) -> f32 {
        if self.count < 2 {
            return f32::INFINITY;
        }
        let n = self.count as f32;
        let variance = self.m2 / (n - 1.0);
        (variance / n).max(Vec3::ZERO).max_element().sqrt()
    }
}

/// Turns pixel coordinates into a colour according to the sample policy.
pub struct PixelSampler<'a> {
    settings: &'a RayTracerSettings,
    tracer: Tracer<'a>,
    first_pass: Option<&'a PixelBuffer>,
}

impl<'a> PixelSampler<'a> {
    pub fn new(
        settings: &'a RayTracerSettings,
        scene: &'a TraceScene,
        first_pass: Option<&'a PixelBuffer>,
    ) -> Self {
        Self {
            settings,
            tracer: Tracer::new(settings, scene),
            first_pass,
        }
    }

    pub fn footprint(&self, i: u32, j: u32) -> Footprint {
        let (x, y) = self.settings.pixel_corner(i, j);
        Footprint {
            x,
            y,
            width: self.settings.pixel_width,
            height: self.settings.pixel_height,
        }
    }

    /// Unclamped colour of pixel `(i, j)`.
    pub fn sample_pixel(&self, i: u32, j: u32, pass: Pass, debug: Option<&mut Vec<DebugRay>>) -> Vec3 {
        let mut rng = pixel_rng(self.settings.seed, i, j, pass);
        let pixel = self.footprint(i, j);

        if pass == Pass::WarmStart {
            return self.sample_camera(&pixel, &mut rng, debug);
        }

        match self.settings.sample_count {
            SampleCount::Constant { depth } => self.constant(&pixel, depth, &mut rng, debug),
            SampleCount::AdaptiveRecursive {
                min_depth,
                max_depth,
                threshold,
            } => {
                if min_depth > 0 {
                    // Depth 0 always splits, so no estimate is needed.
                    return self.adaptive(&pixel, Vec3::ZERO, 0, min_depth, max_depth, threshold, &mut rng, debug);
                }
                let (estimate, error) = self.warm_estimate(i, j, &pixel, &mut rng);
                if max_depth == 0 || error.is_some_and(|e| e <= threshold) {
                    return estimate;
                }
                self.adaptive(&pixel, estimate, 0, min_depth, max_depth, threshold, &mut rng, debug)
            }
            SampleCount::MeanStdError {
                min_depth,
                max_depth,
                cutoff,
            } => self.std_error(i, j, &pixel, min_depth, max_depth, cutoff, &mut rng, debug),
        }
    }

    /// One camera sample somewhere inside `footprint`: its centre in
    /// deterministic mode, a uniformly random point otherwise.
    pub fn sample_camera(
        &self,
        footprint: &Footprint,
        rng: &mut dyn RngCore,
        debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        let (x, y) = match self.settings.monte_carlo {
            MonteCarlo::Deterministic => footprint.center(),
            _ => footprint.at(rng.gen(), rng.gen()),
        };
        self.sample_at(x, y, rng, debug)
    }

    /// Trace a camera ray through the focus-plane point for `(x, y)`.
    fn sample_at(&self, x: f32, y: f32, rng: &mut dyn RngCore, debug: Option<&mut Vec<DebugRay>>) -> Vec3 {
        let ray = self.camera_ray(x, y, rng);
        self.tracer.trace_ray(&ray, 0, RayType::Camera, Vec3::ONE, rng, debug)
    }

    pub fn camera_ray(&self, x: f32, y: f32, rng: &mut dyn RngCore) -> Ray {
        let settings = self.settings;
        let target = settings.focus_point(x, y);
        let mut origin = settings.projection_origin;
        if settings.has_depth_of_field() {
            let r = rng.gen::<f32>().sqrt();
            let theta = 2.0 * PI * rng.gen::<f32>();
            origin += settings.aperture_u * (r * theta.cos()) + settings.aperture_v * (r * theta.sin());
        }
        Ray::towards(origin, target)
    }

    /// `2^depth x 2^depth` samples: sub-cell centres, jittered sub-cells or
    /// independent points depending on the Monte Carlo mode.
    fn constant(
        &self,
        pixel: &Footprint,
        depth: u32,
        rng: &mut dyn RngCore,
        mut debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        debug_assert!(depth <= MAX_SAMPLE_DEPTH, "unresolved sample depth {depth}");
        let n = 1u32 << depth;
        let mut sum = Vec3::ZERO;
        for cy in 0..n {
            for cx in 0..n {
                let cell = match self.settings.monte_carlo {
                    MonteCarlo::UniformRandom => *pixel,
                    MonteCarlo::Deterministic | MonteCarlo::StratifiedRandom => pixel.cell(n, cx, cy),
                };
                sum += self.sample_camera(&cell, rng, debug.as_deref_mut());
            }
        }
        sum / (n * n) as f32
    }

    /// Depth-0 colour and initial error of a pixel. Uses the first pass when
    /// there is one; otherwise takes a fresh centre sample with unknown error.
    fn warm_estimate(&self, i: u32, j: u32, pixel: &Footprint, rng: &mut dyn RngCore) -> (Vec3, Option<f32>) {
        match self.first_pass {
            Some(first) => (first.color(i, j), Some(neighbourhood_spread(first, i, j))),
            None => (self.sample_camera(pixel, rng, None), None),
        }
    }

    /// Quadrant refinement: below `min_depth` always split, above it split
    /// while the quadrants disagree by more than `threshold`.
    #[allow(clippy::too_many_arguments)]
    fn adaptive(
        &self,
        footprint: &Footprint,
        estimate: Vec3,
        depth: u32,
        min_depth: u32,
        max_depth: u32,
        threshold: f32,
        rng: &mut dyn RngCore,
        mut debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        if depth >= max_depth {
            return estimate;
        }

        let quadrants = footprint.quadrants();
        let colors = quadrants.map(|q| self.sample_camera(&q, &mut *rng, debug.as_deref_mut()));
        let next = depth + 1;
        if next >= max_depth || (next >= min_depth && color_spread(&colors) <= threshold) {
            return colors.iter().sum::<Vec3>() / 4.0;
        }

        let mut sum = Vec3::ZERO;
        for (quadrant, color) in quadrants.iter().zip(colors) {
            sum += self.adaptive(
                quadrant,
                color,
                next,
                min_depth,
                max_depth,
                threshold,
                rng,
                debug.as_deref_mut(),
            );
        }
        sum / 4.0
    }

    /// Low-discrepancy samples until the standard error of the mean is at
    /// most `cutoff`, taking between `4^min_depth` and `4^max_depth` samples.
    #[allow(clippy::too_many_arguments)]
    fn std_error(
        &self,
        i: u32,
        j: u32,
        pixel: &Footprint,
        min_depth: u32,
        max_depth: u32,
        cutoff: f32,
        rng: &mut dyn RngCore,
        mut debug: Option<&mut Vec<DebugRay>>,
    ) -> Vec3 {
        let min_samples = SampleCount::constant_samples(min_depth);
        let max_samples = SampleCount::constant_samples(max_depth).max(min_samples);

        let mut stats = RunningStats::default();
        let mut k = 0;
        if min_depth == 0 {
            if let Some(first) = self.first_pass {
                let estimate = first.color(i, j);
                if max_samples <= 1 || neighbourhood_spread(first, i, j) <= cutoff {
                    return estimate;
                }
                // Stands in for the first point of the sequence, which is
                // the pixel centre.
                stats.push(estimate);
                k = 1;
            }
        }

        let rotation = if self.settings.is_randomized() {
            (rng.gen::<f32>(), rng.gen::<f32>())
        } else {
            (0.0, 0.0)
        };

        while stats.count < max_samples {
            let (u, v) = r2_point(k);
            let (x, y) = pixel.at((u + rotation.0).fract(), (v + rotation.1).fract());
            stats.push(self.sample_at(x, y, rng, debug.as_deref_mut()));
            k += 1;

            if stats.count >= min_samples.max(2) && stats.std_error() <= cutoff {
                break;
            }
        }
        stats.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::{Camera, Component, Geometry, Material, Mesh, RenderSettings, Scene, Transform};
    use sable_math::Mat4;

    /// Emissive quad covering the left half of the view, black on the right.
    fn half_lit_scene() -> TraceScene {
        let mut scene = Scene::new("half");
        let glow = scene.add_material(Material::emissive("glow", Vec3::ONE));
        scene
            .add_object(
                "glow",
                Transform::from_translation(Vec3::new(-5.0, 0.0, -1.0)),
                Component::Geometry(Geometry::mesh(Mesh::quad(10.0, 10.0), glow)),
            )
            .unwrap();
        TraceScene::new(&scene, true)
    }

    fn resolve(render: RenderSettings) -> RayTracerSettings {
        let camera = Camera::new(90.0).with_render_settings(render);
        RayTracerSettings::resolve(&camera, &Mat4::IDENTITY)
    }

    #[test]
    fn test_r2_points_are_in_unit_square_and_distinct() {
        let points: Vec<_> = (0..64).map(r2_point).collect();
        assert_eq!(points[0], (0.5, 0.5));
        for (i, a) in points.iter().enumerate() {
            assert!((0.0..1.0).contains(&a.0) && (0.0..1.0).contains(&a.1));
            for b in &points[i + 1..] {
                assert!((a.0 - b.0).abs() + (a.1 - b.1).abs() > 1e-4);
            }
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0] {
            stats.push(Vec3::splat(v));
        }
        assert!((stats.mean.x - 2.5).abs() < 1e-6);
        // sample variance 5/3, std error sqrt(5/12)
        assert!((stats.std_error() - (5.0f32 / 12.0).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_footprint_cells_tile_the_pixel() {
        let pixel = Footprint {
            x: -1.0,
            y: 1.0,
            width: 0.5,
            height: -0.5,
        };
        let q = pixel.quadrants();
        assert_eq!((q[0].x, q[0].y), (-1.0, 1.0));
        assert_eq!((q[3].x, q[3].y), (-0.75, 0.75));
        assert_eq!(q[3].center(), (-0.625, 0.625));
    }

    #[test]
    fn test_pixel_rng_differs_per_pixel_and_pass() {
        let a = pixel_rng(7, 1, 2, Pass::Final).gen::<u64>();
        let b = pixel_rng(7, 2, 1, Pass::Final).gen::<u64>();
        let c = pixel_rng(7, 1, 2, Pass::WarmStart).gen::<u64>();
        let again = pixel_rng(7, 1, 2, Pass::Final).gen::<u64>();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, again);
    }

    #[test]
    fn test_constant_samples_average_subcells() {
        // Three pixels across; the middle one straddles the lit edge at x = 0.
        let scene = half_lit_scene();
        let settings = resolve(RenderSettings::default().with_resolution(3, 1).with_constant_samples(2));
        let sampler = PixelSampler::new(&settings, &scene, None);

        assert!((sampler.sample_pixel(0, 0, Pass::Final, None) - Vec3::ONE).length() < 1e-5);
        let middle = sampler.sample_pixel(1, 0, Pass::Final, None);
        assert!((middle - Vec3::splat(0.5)).length() < 1e-5, "{middle:?}");
        assert_eq!(sampler.sample_pixel(2, 0, Pass::Final, None), Vec3::ZERO);
    }

    #[test]
    fn test_adaptive_refines_only_edges() {
        let scene = half_lit_scene();
        let settings = resolve(
            RenderSettings::default()
                .with_resolution(3, 1)
                .with_adaptive_samples(1, 3, 0.1),
        );
        let sampler = PixelSampler::new(&settings, &scene, None);

        // The middle pixel straddles x = 0: half of it is lit.
        let middle = sampler.sample_pixel(1, 0, Pass::Final, None);
        assert!((middle.x - 0.5).abs() < 1e-5, "{middle:?}");
        assert!((sampler.sample_pixel(0, 0, Pass::Final, None) - Vec3::ONE).length() < 1e-5);
    }

    #[test]
    fn test_warm_start_skips_flat_regions() {
        let scene = half_lit_scene();
        let settings = resolve(
            RenderSettings::default()
                .with_resolution(5, 1)
                .with_adaptive_samples(0, 2, 0.1),
        );
        let first = PixelBuffer::new(5, 1);
        // Fake a flat first pass with an out-of-place value that refinement
        // would overwrite.
        for i in 0..5 {
            first.set(i, 0, [51, 51, 51]);
        }
        let sampler = PixelSampler::new(&settings, &scene, Some(&first));
        let color = sampler.sample_pixel(0, 0, Pass::Final, None);
        assert!((color - Vec3::splat(0.2)).length() < 1e-5);

        first.set(1, 0, [255, 255, 255]);
        let refined = sampler.sample_pixel(0, 0, Pass::Final, None);
        assert!((refined - Vec3::ONE).length() < 1e-5);
    }

    #[test]
    fn test_std_error_stops_early_on_flat_pixels() {
        let scene = half_lit_scene();
        let settings = resolve(
            RenderSettings::default()
                .with_resolution(4, 1)
                .with_std_error_samples(1, 4, 0.01),
        );
        let sampler = PixelSampler::new(&settings, &scene, None);

        let mut rays = Vec::new();
        let flat = sampler.sample_pixel(0, 0, Pass::Final, Some(&mut rays));
        assert!((flat - Vec3::ONE).length() < 1e-5);
        // Camera segments only; emitters need no further rays.
        let camera_rays = rays
            .iter()
            .filter(|r| r.kind == sable_core::DebugRayKind::Camera)
            .count();
        assert_eq!(camera_rays, 4);
    }
}
