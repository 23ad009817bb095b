//! Resolved, immutable render configuration.
//!
//! `RenderSettings` is what the user edits on a camera. `RayTracerSettings`
//! is the snapshot a render actually runs with: camera basis in world space,
//! pixel footprint, a single sample-count policy, and every fallback applied.

use sable_core::{Camera, MonteCarlo, NodeId, SampleMode, Scene, ShadowMode};
use sable_math::{Mat4, Vec3};

use crate::error::{TraceError, TraceResult};
use crate::tile::DEFAULT_TILE_SIZE;

/// Deepest subdivision any sample policy may use; `4^15` samples per pixel.
pub const MAX_SAMPLE_DEPTH: u32 = 15;

/// How many samples a pixel receives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleCount {
    /// `4^depth` samples for every pixel
    Constant { depth: u32 },
    /// Split the pixel into quadrants while the colour spread exceeds `threshold`
    AdaptiveRecursive {
        min_depth: u32,
        max_depth: u32,
        threshold: f32,
    },
    /// Sample until the standard error of the mean drops to `cutoff`
    MeanStdError {
        min_depth: u32,
        max_depth: u32,
        cutoff: f32,
    },
}

impl SampleCount {
    /// Number of samples per pixel for the constant policy.
    pub fn constant_samples(depth: u32) -> u32 {
        4u32.pow(depth.min(MAX_SAMPLE_DEPTH))
    }

    pub fn is_adaptive(&self) -> bool {
        !matches!(self, SampleCount::Constant { .. })
    }

    pub fn min_depth(&self) -> u32 {
        match *self {
            SampleCount::Constant { depth } => depth,
            SampleCount::AdaptiveRecursive { min_depth, .. }
            | SampleCount::MeanStdError { min_depth, .. } => min_depth,
        }
    }

    pub fn max_depth(&self) -> u32 {
        match *self {
            SampleCount::Constant { depth } => depth,
            SampleCount::AdaptiveRecursive { max_depth, .. }
            | SampleCount::MeanStdError { max_depth, .. } => max_depth,
        }
    }
}

/// Hardware threads minus one for the UI, at least one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

#[derive(Clone, Debug)]
pub struct RayTracerSettings {
    pub width: u32,
    pub height: u32,
    /// Size of one pixel in screen space; negative height because rows go down
    pub pixel_width: f32,
    pub pixel_height: f32,
    pub background: Vec3,

    pub shadows: ShadowMode,
    pub reflections: bool,
    pub refractions: bool,

    pub monte_carlo: MonteCarlo,
    /// These three only take effect outside deterministic mode
    pub diffuse_reflection: bool,
    pub caustics: bool,
    pub random_branching: bool,

    pub sample_count: SampleCount,
    pub max_depth: u32,
    pub use_acceleration: bool,
    pub worker_threads: usize,
    pub tile_size: u32,
    pub seed: u64,

    /// Camera position in world space
    pub projection_origin: Vec3,
    /// Camera basis scaled so that `origin + forward + x * right + y * up`
    /// lies on the focus plane for screen coordinates `x, y` in [-1, 1]
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    /// Lens disc axes, scaled by the aperture radius
    pub aperture_u: Vec3,
    pub aperture_v: Vec3,
}

impl RayTracerSettings {
    /// Snapshot the settings of the camera on node `camera_id`.
    pub fn new(scene: &Scene, camera_id: NodeId) -> TraceResult<Self> {
        let camera = scene.camera(camera_id)?;
        let world = scene.world_transform(camera_id)?;
        let render = &camera.render;
        if render.width == 0 || render.height == 0 {
            return Err(TraceError::InvalidResolution {
                camera: camera_id,
                width: render.width,
                height: render.height,
            });
        }
        Ok(Self::resolve(camera, &world))
    }

    /// Resolve a camera placed by `world`. Resolution must be non-zero.
    pub fn resolve(camera: &Camera, world: &Mat4) -> Self {
        let render = &camera.render;
        let randomized = render.monte_carlo != MonteCarlo::Deterministic;
        let sample_depth = render.sample_depth.min(MAX_SAMPLE_DEPTH);
        let min_depth = render.min_sample_depth.min(MAX_SAMPLE_DEPTH);
        let max_depth = render.max_sample_depth.min(MAX_SAMPLE_DEPTH).max(min_depth);

        let sample_count = match render.sample_mode {
            SampleMode::Constant => SampleCount::Constant { depth: sample_depth },
            SampleMode::AdaptiveRecursive if randomized => {
                log::warn!(
                    "Adaptive sampling needs deterministic sample positions; using {} samples per pixel",
                    SampleCount::constant_samples(sample_depth)
                );
                SampleCount::Constant { depth: sample_depth }
            }
            SampleMode::AdaptiveRecursive => SampleCount::AdaptiveRecursive {
                min_depth,
                max_depth,
                threshold: render.adaptive_threshold.max(0.0),
            },
            SampleMode::MeanStdError => SampleCount::MeanStdError {
                min_depth,
                max_depth,
                cutoff: render.std_error_cutoff.max(0.0),
            },
        };

        let focus = if camera.focus_distance > 0.0 {
            camera.focus_distance
        } else {
            1.0
        };
        let half_height = (camera.fov_y.to_radians() * 0.5).tan();
        let aspect = camera.aspect_ratio();

        let origin = world.transform_point3(Vec3::ZERO);
        let x_axis = world.transform_vector3(Vec3::X).normalize_or_zero();
        let y_axis = world.transform_vector3(Vec3::Y).normalize_or_zero();
        let z_axis = world.transform_vector3(Vec3::Z).normalize_or_zero();

        // Depth of field only makes sense when samples move around the lens.
        let aperture = if randomized { camera.aperture.max(0.0) } else { 0.0 };

        Self {
            width: render.width,
            height: render.height,
            pixel_width: 2.0 / render.width.max(1) as f32,
            pixel_height: -2.0 / render.height.max(1) as f32,
            background: render.background,
            shadows: render.shadows,
            reflections: render.reflections,
            refractions: render.refractions,
            monte_carlo: render.monte_carlo,
            diffuse_reflection: randomized && render.diffuse_reflection,
            caustics: randomized && render.caustics,
            random_branching: randomized && render.random_branching,
            sample_count,
            max_depth: render.max_depth,
            use_acceleration: render.use_acceleration,
            worker_threads: render.worker_threads.unwrap_or_else(default_worker_count).max(1),
            tile_size: DEFAULT_TILE_SIZE,
            seed: render.seed,
            projection_origin: origin,
            forward: -z_axis * focus,
            up: y_axis * (half_height * focus),
            right: x_axis * (half_height * aspect * focus),
            aperture_u: x_axis * aperture,
            aperture_v: y_axis * aperture,
        }
    }

    pub fn is_randomized(&self) -> bool {
        self.monte_carlo != MonteCarlo::Deterministic
    }

    pub fn has_depth_of_field(&self) -> bool {
        self.aperture_u != Vec3::ZERO || self.aperture_v != Vec3::ZERO
    }

    /// Adaptive policies starting at depth zero first run a one-sample pass
    /// whose result seeds their error estimate.
    pub fn needs_warm_start(&self) -> bool {
        self.sample_count.is_adaptive() && self.sample_count.min_depth() == 0
    }

    /// Screen-space coordinates of the top-left corner of pixel `(i, j)`.
    pub fn pixel_corner(&self, i: u32, j: u32) -> (f32, f32) {
        (
            -1.0 + i as f32 * self.pixel_width,
            1.0 + j as f32 * self.pixel_height,
        )
    }

    /// World-space point on the focus plane for screen coordinates `(x, y)`.
    pub fn focus_point(&self, x: f32, y: f32) -> Vec3 {
        self.projection_origin + self.forward + x * self.right + y * self.up
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::{Component, RenderSettings, Transform};

    fn scene_with(camera: Camera, transform: Transform) -> (Scene, NodeId) {
        let mut scene = Scene::new("settings");
        let id = scene
            .add_object("cam", transform, Component::Camera(camera))
            .unwrap();
        (scene, id)
    }

    #[test]
    fn test_basis_and_footprint() {
        let render = RenderSettings::default().with_resolution(200, 100);
        let camera = Camera::new(90.0).with_render_settings(render);
        let (scene, id) = scene_with(camera, Transform::from_translation(Vec3::new(0.0, 1.0, 5.0)));
        let settings = RayTracerSettings::new(&scene, id).unwrap();

        assert!((settings.pixel_width - 0.01).abs() < 1e-6);
        assert!((settings.pixel_height + 0.02).abs() < 1e-6);
        assert_eq!(settings.projection_origin, Vec3::new(0.0, 1.0, 5.0));
        assert!((settings.forward - Vec3::NEG_Z).length() < 1e-5);
        // tan(45 deg) = 1, aspect 2
        assert!((settings.up - Vec3::Y).length() < 1e-5);
        assert!((settings.right - Vec3::X * 2.0).length() < 1e-5);

        assert_eq!(settings.pixel_corner(0, 0), (-1.0, 1.0));
        let (x, y) = settings.pixel_corner(200, 100);
        assert!((x - 1.0).abs() < 1e-5 && (y + 1.0).abs() < 1e-5);

        let top_right = settings.focus_point(1.0, 1.0);
        assert!((top_right - Vec3::new(2.0, 2.0, 4.0)).length() < 1e-5);
    }

    #[test]
    fn test_focus_distance_scales_basis() {
        let camera = Camera::new(90.0)
            .with_lens(0.5, 4.0)
            .with_render_settings(RenderSettings::default().with_resolution(10, 10));
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert!((settings.forward.length() - 4.0).abs() < 1e-5);
        assert!((settings.up.length() - 4.0).abs() < 1e-5);
        // Deterministic mode renders through a pinhole.
        assert!(!settings.has_depth_of_field());

        let random = camera.with_render_settings(
            RenderSettings::default()
                .with_resolution(10, 10)
                .with_monte_carlo(MonteCarlo::UniformRandom),
        );
        let settings = RayTracerSettings::resolve(&random, &Mat4::IDENTITY);
        assert!(settings.has_depth_of_field());
        assert!((settings.aperture_u.length() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_adaptive_with_random_sampling_falls_back_to_constant() {
        let render = RenderSettings::default()
            .with_adaptive_samples(0, 3, 0.1)
            .with_monte_carlo(MonteCarlo::StratifiedRandom);
        let render = RenderSettings {
            sample_depth: 2,
            ..render
        };
        let camera = Camera::default().with_render_settings(render);
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert_eq!(settings.sample_count, SampleCount::Constant { depth: 2 });
        assert!(!settings.needs_warm_start());
    }

    #[test]
    fn test_std_error_allows_random_sampling() {
        let render = RenderSettings::default()
            .with_std_error_samples(0, 2, 0.02)
            .with_monte_carlo(MonteCarlo::UniformRandom);
        let camera = Camera::default().with_render_settings(render);
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert!(matches!(settings.sample_count, SampleCount::MeanStdError { .. }));
        assert!(settings.needs_warm_start());
    }

    #[test]
    fn test_deterministic_disables_random_features() {
        let mut render = RenderSettings::default();
        render.diffuse_reflection = true;
        render.caustics = true;
        render.random_branching = true;
        let camera = Camera::default().with_render_settings(render);
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert!(!settings.diffuse_reflection);
        assert!(!settings.caustics);
        assert!(!settings.random_branching);
    }

    #[test]
    fn test_sample_depth_clamped_once() {
        let render = RenderSettings {
            sample_depth: 40,
            ..RenderSettings::default()
        };
        let camera = Camera::default().with_render_settings(render);
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert_eq!(settings.sample_count, SampleCount::Constant { depth: MAX_SAMPLE_DEPTH });
        assert_eq!(SampleCount::constant_samples(MAX_SAMPLE_DEPTH), 1 << 30);

        let camera = Camera::default()
            .with_render_settings(RenderSettings::default().with_std_error_samples(20, 30, 0.01));
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert_eq!(settings.sample_count.min_depth(), MAX_SAMPLE_DEPTH);
        assert_eq!(settings.sample_count.max_depth(), MAX_SAMPLE_DEPTH);
    }

    #[test]
    fn test_warm_start_only_from_depth_zero() {
        let camera = Camera::default()
            .with_render_settings(RenderSettings::default().with_adaptive_samples(1, 3, 0.1));
        let settings = RayTracerSettings::resolve(&camera, &Mat4::IDENTITY);
        assert!(!settings.needs_warm_start());

        let camera = Camera::default()
            .with_render_settings(RenderSettings::default().with_adaptive_samples(0, 3, 0.1));
        assert!(RayTracerSettings::resolve(&camera, &Mat4::IDENTITY).needs_warm_start());
    }

    #[test]
    fn test_zero_resolution_is_rejected() {
        let camera = Camera::default().with_render_settings(RenderSettings::default().with_resolution(0, 10));
        let (scene, id) = scene_with(camera, Transform::default());
        assert!(matches!(
            RayTracerSettings::new(&scene, id),
            Err(TraceError::InvalidResolution { width: 0, .. })
        ));
    }

    #[test]
    fn test_worker_override() {
        let camera = Camera::default()
            .with_render_settings(RenderSettings::default().with_worker_threads(3));
        assert_eq!(RayTracerSettings::resolve(&camera, &Mat4::IDENTITY).worker_threads, 3);
        assert!(default_worker_count() >= 1);
    }
}
