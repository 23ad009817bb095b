//! Sable Raytracer - offline CPU renderer for Sable scenes.
//!
//! Takes a read-only snapshot of a `sable_core::Scene`, flattens it into
//! world-space trace objects, accelerates them with a SAH box tree and
//! renders through one camera on a pool of tile-claiming worker threads.
//!
//! Shading is recursive Whitted-style (shadows, reflection, refraction)
//! with optional Monte Carlo diffuse bounces. Pixels are sampled with a
//! constant, adaptive-recursive or mean-standard-error policy taken from the
//! camera's `RenderSettings`.

mod buffer;
mod error;
mod flare;
mod geometry;
mod intersection;
mod light;
mod object;
mod raytracer;
mod sampling;
mod scene;
mod settings;
mod shading;
mod tile;
mod tree;
mod worker;

pub use buffer::{clamp_01, color_to_rgb, rgb_to_color, PixelBuffer};
pub use error::{TraceError, TraceResult};
pub use flare::TraceFlare;
pub use geometry::{GeometryShape, TraceGeometry, WorldTriangle};
pub use intersection::{Intersection, RayType};
pub use light::{LightSample, TraceLight};
pub use object::TraceObject;
pub use raytracer::RayTracer;
pub use sampling::{r2_point, Footprint, Pass, PixelSampler};
pub use scene::TraceScene;
pub use settings::{default_worker_count, RayTracerSettings, SampleCount, MAX_SAMPLE_DEPTH};
pub use shading::{reflect, refract, schlick, Tracer};
pub use tile::{Tile, TileGrid, DEFAULT_TILE_SIZE};
pub use tree::{SortKey, SplitChoice, TreeBox, TreeNode};
pub use worker::RtWorker;

/// Re-export the math types that appear in this crate's API
pub use sable_math::{Aabb, Interval, Ray, Vec3};
