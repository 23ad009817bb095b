//! Sable Core - read-only scene snapshot consumed by the raytracer.
//!
//! This crate provides:
//!
//! - **Scene graph snapshot**: `Scene`, `SceneNode`, `Transform`, `Component`
//! - **Components**: `Geometry` (mesh or analytic shape), `Light`, `Camera`
//! - **Assets**: `Mesh`, `Material`, `Texture`
//! - **Render configuration**: `RenderSettings` (serde-persisted on cameras)
//!
//! # Example
//!
//! ```
//! use sable_core::{Camera, Component, Geometry, Material, Mesh, Scene, Transform};
//! use sable_math::Vec3;
//!
//! let mut scene = Scene::new("demo");
//! let red = scene.add_material(Material::diffuse("red", Vec3::new(0.8, 0.1, 0.1)));
//! scene
//!     .add_object("floor", Transform::default(), Component::Geometry(Geometry::mesh(Mesh::quad(4.0, 4.0), red)))
//!     .unwrap();
//! let cam = scene
//!     .add_object("cam", Transform::from_translation(Vec3::new(0.0, 0.0, 5.0)), Component::Camera(Camera::new(45.0)))
//!     .unwrap();
//! assert!(scene.camera(cam).is_ok());
//! ```

pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod texture;

// Re-export commonly used types
pub use camera::{Camera, DebugRay, DebugRayKind, MonteCarlo, RenderSettings, SampleMode, ShadowMode};
pub use light::{Light, LightKind};
pub use material::{Channel, Material, MaterialSample, ShadingModel};
pub use mesh::{Mesh, MeshTriangle};
pub use scene::{
    AssetLibrary, Component, Geometry, MaterialId, NodeId, Scene, SceneError, SceneNode,
    SceneResult, Shape, Transform,
};
pub use texture::Texture;
