//! Camera component and the render settings it carries.
//!
//! A camera looks down its node's local -Z axis with +Y up. The offline
//! render configuration lives on the camera so each viewpoint can keep its
//! own quality settings.

use serde::{Deserialize, Serialize};

use sable_math::Vec3;

use crate::scene::SceneResult;

/// How shadow rays treat occluders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowMode {
    /// No shadow rays; every light is always visible.
    None,
    /// Any hit blocks the light.
    #[default]
    Opaque,
    /// Occluders tint the light by their transmittance.
    Translucent,
}

/// Where sample positions come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonteCarlo {
    /// Fixed sample positions; identical output on every render.
    #[default]
    Deterministic,
    /// Independent uniform random positions.
    UniformRandom,
    /// Random positions jittered inside regular strata.
    StratifiedRandom,
}

/// Which policy decides how many samples a pixel gets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// `4^sample_depth` samples for every pixel.
    #[default]
    Constant,
    /// Recursive quadrant subdivision driven by colour differences.
    AdaptiveRecursive,
    /// Keep sampling until the standard error of the mean is small enough.
    MeanStdError,
}

/// Offline render configuration edited in the camera's property panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Colour returned by rays that escape the scene
    pub background: Vec3,
    pub shadows: ShadowMode,
    pub reflections: bool,
    pub refractions: bool,
    pub monte_carlo: MonteCarlo,
    /// Cosine-weighted diffuse bounces (Monte Carlo modes only)
    pub diffuse_reflection: bool,
    /// Let diffuse bounces continue through mirrors and glass
    pub caustics: bool,
    /// Follow one randomly chosen secondary ray instead of all of them
    pub random_branching: bool,
    pub sample_mode: SampleMode,
    /// Subdivision depth for `Constant`: `4^depth` samples per pixel
    pub sample_depth: u32,
    pub min_sample_depth: u32,
    pub max_sample_depth: u32,
    /// Colour spread above which `AdaptiveRecursive` subdivides
    pub adaptive_threshold: f32,
    /// Standard error at which `MeanStdError` stops sampling
    pub std_error_cutoff: f32,
    /// Maximum number of bounces after the camera ray
    pub max_depth: u32,
    /// Build the SAH tree; off means brute-force linear scans
    pub use_acceleration: bool,
    /// Worker count override; `None` picks one per spare hardware thread
    pub worker_threads: Option<usize>,
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            background: Vec3::ZERO,
            shadows: ShadowMode::Opaque,
            reflections: true,
            refractions: true,
            monte_carlo: MonteCarlo::Deterministic,
            diffuse_reflection: false,
            caustics: false,
            random_branching: false,
            sample_mode: SampleMode::Constant,
            sample_depth: 0,
            min_sample_depth: 0,
            max_sample_depth: 2,
            adaptive_threshold: 0.05,
            std_error_cutoff: 0.01,
            max_depth: 5,
            use_acceleration: true,
            worker_threads: None,
            seed: 0,
        }
    }
}

impl RenderSettings {
    /// Parse a (possibly partial) JSON settings object; missing fields keep
    /// their defaults.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_background(mut self, color: Vec3) -> Self {
        self.background = color;
        self
    }

    pub fn with_shadows(mut self, shadows: ShadowMode) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn with_monte_carlo(mut self, mode: MonteCarlo) -> Self {
        self.monte_carlo = mode;
        self
    }

    pub fn with_constant_samples(mut self, depth: u32) -> Self {
        self.sample_mode = SampleMode::Constant;
        self.sample_depth = depth;
        self
    }

    pub fn with_adaptive_samples(mut self, min_depth: u32, max_depth: u32, threshold: f32) -> Self {
        self.sample_mode = SampleMode::AdaptiveRecursive;
        self.min_sample_depth = min_depth;
        self.max_sample_depth = max_depth;
        self.adaptive_threshold = threshold;
        self
    }

    pub fn with_std_error_samples(mut self, min_depth: u32, max_depth: u32, cutoff: f32) -> Self {
        self.sample_mode = SampleMode::MeanStdError;
        self.min_sample_depth = min_depth;
        self.max_sample_depth = max_depth;
        self.std_error_cutoff = cutoff;
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_acceleration(mut self, enabled: bool) -> Self {
        self.use_acceleration = enabled;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }
}

/// What produced a debug ray segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugRayKind {
    Camera,
    Shadow,
    Reflection,
    Refraction,
    Diffuse,
    Normal,
}

/// A line segment drawn in the viewport to visualise one traced ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugRay {
    pub start: Vec3,
    pub end: Vec3,
    pub kind: DebugRayKind,
}

#[derive(Clone, Debug)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov_y: f32,
    /// Lens radius; 0 is a pinhole
    pub aperture: f32,
    /// Distance to the plane of perfect focus
    pub focus_distance: f32,
    pub render: RenderSettings,
    /// Segments recorded by single-pixel debug traces
    pub debug_rays: Vec<DebugRay>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y: 45.0,
            aperture: 0.0,
            focus_distance: 1.0,
            render: RenderSettings::default(),
            debug_rays: Vec::new(),
        }
    }
}

impl Camera {
    pub fn new(fov_y: f32) -> Self {
        Self {
            fov_y,
            ..Default::default()
        }
    }

    pub fn with_lens(mut self, aperture: f32, focus_distance: f32) -> Self {
        self.aperture = aperture;
        self.focus_distance = focus_distance;
        self
    }

    pub fn with_render_settings(mut self, render: RenderSettings) -> Self {
        self.render = render;
        self
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.render.width.max(1) as f32 / self.render.height.max(1) as f32
    }

    pub fn clear_debug_rays(&mut self) {
        self.debug_rays.clear();
    }
}
