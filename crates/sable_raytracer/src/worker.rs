//! Tile-consuming render worker.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::buffer::color_to_rgb;
use crate::raytracer::RenderShared;
use crate::sampling::{Pass, PixelSampler};

/// Marks the worker as gone even if rendering panics.
struct ExitGuard<'a> {
    shared: &'a RenderShared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.shared.worker_exited(std::thread::panicking());
    }
}

/// One render thread. Claims tiles from the shared counter until none are
/// left or the render is cancelled.
pub struct RtWorker {
    id: usize,
    pass: Pass,
    shared: Arc<RenderShared>,
}

impl RtWorker {
    pub(crate) fn new(id: usize, pass: Pass, shared: Arc<RenderShared>) -> Self {
        Self { id, pass, shared }
    }

    pub fn run(self) {
        let shared = &*self.shared;
        let _guard = ExitGuard { shared };
        log::debug!("Worker {} started ({:?} pass)", self.id, self.pass);

        let sampler = PixelSampler::new(&shared.settings, &shared.scene, shared.first_pass_for(self.pass));
        let target = shared.target(self.pass);
        let mut tiles_done = 0usize;

        'tiles: while !shared.is_cancelled() {
            let index = shared.tile_counter.fetch_add(1, Ordering::Relaxed);
            let Some(tile) = shared.grid.tile(index) else {
                break;
            };

            for (i, j) in tile.pixels() {
                if shared.is_cancelled() {
                    break 'tiles;
                }
                let color = sampler.sample_pixel(i, j, self.pass, None);
                target.set(i, j, color_to_rgb(color));
            }
            tiles_done += 1;
        }

        log::debug!(
            "Worker {} exiting after {} tiles{}",
            self.id,
            tiles_done,
            if shared.is_cancelled() { " (cancelled)" } else { "" }
        );
    }
}
