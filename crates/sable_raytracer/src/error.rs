use sable_core::{NodeId, SceneError};
use thiserror::Error;

/// Errors that can occur when starting a render.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Camera lookup failed: {0}")]
    Camera(#[from] SceneError),

    #[error("Invalid render resolution {width}x{height} on camera {camera:?}")]
    InvalidResolution { camera: NodeId, width: u32, height: u32 },

    #[error("Failed to spawn render worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;
