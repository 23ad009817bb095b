//! Render orchestration.
//!
//! A `RayTracer` snapshots the scene and camera, then renders on its own
//! pool of worker threads while the caller polls `progress()` and reads the
//! buffer. Workers share one atomic tile counter; each claimed tile is a
//! disjoint block of pixels, so the buffer needs no lock.
//!
//! Adaptive policies that start at depth zero run a one-sample warm-start
//! pass first. It completes inside `RayTracer::new` and its result seeds the
//! error estimate of the final pass.
//!
//! # Example
//!
//! ```no_run
//! use sable_core::{Camera, Component, Scene, Transform};
//! use sable_raytracer::RayTracer;
//!
//! let mut scene = Scene::new("empty");
//! let cam = scene
//!     .add_object("cam", Transform::default(), Component::Camera(Camera::default()))
//!     .unwrap();
//! let mut tracer = RayTracer::new(&scene, cam).unwrap();
//! tracer.wait();
//! assert_eq!(tracer.progress(), 100);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use image::{Rgb, RgbImage};
use sable_core::{DebugRay, NodeId, Scene};

use crate::buffer::{color_to_rgb, PixelBuffer};
use crate::error::{TraceError, TraceResult};
use crate::sampling::{Pass, PixelSampler};
use crate::scene::TraceScene;
use crate::settings::RayTracerSettings;
use crate::tile::TileGrid;
use crate::worker::RtWorker;

/// State shared between the render owner and its workers.
pub(crate) struct RenderShared {
    pub(crate) settings: RayTracerSettings,
    pub(crate) scene: TraceScene,
    pub(crate) grid: TileGrid,
    buffer: PixelBuffer,
    first_pass: Option<PixelBuffer>,
    pub(crate) tile_counter: AtomicUsize,
    cancelled: AtomicBool,
    active_workers: AtomicUsize,
}

impl RenderShared {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Buffer a pass writes into.
    pub(crate) fn target(&self, pass: Pass) -> &PixelBuffer {
        match (pass, &self.first_pass) {
            (Pass::WarmStart, Some(first)) => first,
            _ => &self.buffer,
        }
    }

    /// First-pass baseline visible to a pass; only the final pass reads it.
    pub(crate) fn first_pass_for(&self, pass: Pass) -> Option<&PixelBuffer> {
        match pass {
            Pass::WarmStart => None,
            Pass::Final => self.first_pass.as_ref(),
        }
    }

    /// Called once by every worker on its way out. A panicking worker
    /// cancels the whole render.
    pub(crate) fn worker_exited(&self, panicked: bool) {
        if panicked {
            log::warn!("Render worker panicked; cancelling render");
            self.cancelled.store(true, Ordering::Relaxed);
        }
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct RayTracer {
    shared: Arc<RenderShared>,
    workers: Vec<JoinHandle<()>>,
    /// Set once the final pass has been joined without cancellation
    completed: bool,
    started: Instant,
}

impl RayTracer {
    /// Snapshot `scene` as seen through the camera on node `camera` and
    /// start rendering in the background.
    pub fn new(scene: &Scene, camera: NodeId) -> TraceResult<Self> {
        let settings = RayTracerSettings::new(scene, camera)?;
        let trace_scene = TraceScene::new(scene, settings.use_acceleration);
        let grid = TileGrid::new(settings.width, settings.height, settings.tile_size);
        let first_pass = settings
            .needs_warm_start()
            .then(|| PixelBuffer::new(settings.width, settings.height));

        log::info!(
            "Rendering {}x{} in {} tiles with {} workers ({:?}, {:?})",
            settings.width,
            settings.height,
            grid.tile_count(),
            settings.worker_threads,
            settings.sample_count,
            settings.monte_carlo
        );

        let mut tracer = Self {
            shared: Arc::new(RenderShared {
                buffer: PixelBuffer::new(settings.width, settings.height),
                settings,
                scene: trace_scene,
                grid,
                first_pass,
                tile_counter: AtomicUsize::new(0),
                cancelled: AtomicBool::new(false),
                active_workers: AtomicUsize::new(0),
            }),
            workers: Vec::new(),
            completed: false,
            started: Instant::now(),
        };

        if tracer.shared.first_pass.is_some() {
            tracer.spawn(Pass::WarmStart)?;
            tracer.join();
            tracer.shared.tile_counter.store(0, Ordering::Relaxed);
            log::info!(
                "Warm start pass finished in {:.2}s",
                tracer.started.elapsed().as_secs_f64()
            );
        }
        tracer.spawn(Pass::Final)?;
        Ok(tracer)
    }

    fn spawn(&mut self, pass: Pass) -> TraceResult<()> {
        let count = self.shared.settings.worker_threads;
        self.shared.active_workers.store(count, Ordering::Release);

        for id in 0..count {
            let worker = RtWorker::new(id, pass, Arc::clone(&self.shared));
            let spawned = std::thread::Builder::new()
                .name(format!("sable-rt-{}", id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    log::warn!("Failed to spawn render worker {}: {}", id, e);
                    // Workers never started will never report their exit.
                    self.shared.active_workers.fetch_sub(count - id, Ordering::AcqRel);
                    self.request_cancel();
                    return Err(TraceError::WorkerSpawn(e));
                }
            }
        }
        Ok(())
    }

    fn join(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("Render worker terminated with a panic");
            }
        }
    }

    /// Block until every worker has been joined.
    pub fn wait(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.join();
        self.completed = !self.is_cancelled();
        if self.completed {
            log::info!(
                "Render finished in {:.2}s",
                self.started.elapsed().as_secs_f64()
            );
        } else {
            log::info!("Render cancelled at {}%", self.progress());
        }
    }

    /// Stop the render and block until the pool has drained. Workers stop
    /// at their next pixel, so the buffer is final once this returns.
    pub fn cancel(&mut self) {
        self.request_cancel();
        self.wait();
    }

    /// Ask workers to stop at their next pixel without waiting for them.
    pub fn request_cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// True once every worker of the final pass has exited. They still need
    /// `wait` to be joined.
    pub fn is_finished(&self) -> bool {
        self.shared.active_workers.load(Ordering::Acquire) == 0
    }

    /// Percentage of tiles handed out, held at 99 until `wait` has joined
    /// every worker. A cancelled render never reaches 100.
    pub fn progress(&self) -> u32 {
        if self.completed {
            return 100;
        }
        let total = self.shared.grid.tile_count();
        if total == 0 {
            return 99;
        }
        let done = self.tiles_dispatched();
        ((100 * done / total) as u32).min(99)
    }

    /// Tiles claimed so far in the current pass.
    pub fn tiles_dispatched(&self) -> usize {
        self.shared
            .tile_counter
            .load(Ordering::Relaxed)
            .min(self.shared.grid.tile_count())
    }

    pub fn tile_count(&self) -> usize {
        self.shared.grid.tile_count()
    }

    pub fn worker_count(&self) -> usize {
        self.shared.settings.worker_threads
    }

    pub fn settings(&self) -> &RayTracerSettings {
        &self.shared.settings
    }

    pub fn scene(&self) -> &TraceScene {
        &self.shared.scene
    }

    pub fn width(&self) -> u32 {
        self.shared.settings.width
    }

    pub fn height(&self) -> u32 {
        self.shared.settings.height
    }

    /// Current RGB bytes, row-major. Pixels still being written may be torn.
    pub fn buffer(&self) -> Vec<u8> {
        self.shared.buffer.snapshot()
    }

    /// Warm-start pass result, if the render ran one.
    pub fn first_pass_buffer(&self) -> Option<Vec<u8>> {
        self.shared.first_pass.as_ref().map(PixelBuffer::snapshot)
    }

    pub fn pixel(&self, i: u32, j: u32) -> [u8; 3] {
        self.shared.buffer.get(i, j)
    }

    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            Rgb(self.shared.buffer.get(x, y))
        })
    }

    /// Render one pixel on the calling thread and store it in the buffer.
    /// With `debug` set, every traced ray is appended to it as a segment,
    /// typically a camera's `debug_rays`.
    pub fn compute_pixel(&self, i: u32, j: u32, debug: Option<&mut Vec<DebugRay>>) -> [u8; 3] {
        debug_assert!(i < self.width() && j < self.height(), "pixel ({i}, {j}) out of bounds");
        let shared = &*self.shared;
        let sampler = PixelSampler::new(&shared.settings, &shared.scene, shared.first_pass_for(Pass::Final));
        let rgb = color_to_rgb(sampler.sample_pixel(i, j, Pass::Final, debug));
        shared.buffer.set(i, j, rgb);
        rgb
    }
}

impl Drop for RayTracer {
    fn drop(&mut self) {
        self.request_cancel();
        self.join();
    }
}
