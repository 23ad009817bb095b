//! Scene snapshot types.
//!
//! The editor owns a live, animated scene graph; what reaches the raytracer
//! is this flattened, read-only copy: an arena of nodes addressed by
//! `NodeId`, each with a local transform and a list of components, plus the
//! asset library the components refer into.

use std::sync::Arc;

use sable_math::{Mat4, Quat, Vec3};
use thiserror::Error;

use crate::camera::Camera;
use crate::light::Light;
use crate::material::Material;
use crate::mesh::Mesh;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Unknown scene node: {0:?}")]
    UnknownNode(NodeId),

    #[error("Node {0:?} has no camera component")]
    NotACamera(NodeId),

    #[error("Invalid render settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Index of a node in `Scene::nodes`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Index of a material in the scene's `AssetLibrary`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// Transform components that can be composed into a matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Transform placed at `eye` whose -Z axis points at `target`.
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        Self::from_matrix(view.inverse())
    }

    /// Decompose a matrix into translation, rotation and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Scale, then rotate, then translate.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Shape of a geometry component.
#[derive(Clone, Debug)]
pub enum Shape {
    /// Triangle mesh in local space
    Mesh(Arc<Mesh>),
    /// Sphere centred on the local origin
    Sphere { radius: f32 },
    /// Infinite plane through the origin with normal +Y
    Plane,
}

impl Shape {
    /// Shapes the raytracer intersects directly instead of tessellating.
    pub fn has_custom_intersection(&self) -> bool {
        !matches!(self, Shape::Mesh(_))
    }
}

#[derive(Clone, Debug)]
pub struct Geometry {
    pub shape: Shape,
    pub material: Option<MaterialId>,
}

impl Geometry {
    pub fn new(shape: Shape, material: MaterialId) -> Self {
        Self {
            shape,
            material: Some(material),
        }
    }

    pub fn mesh(mesh: Mesh, material: MaterialId) -> Self {
        Self::new(Shape::Mesh(Arc::new(mesh)), material)
    }
}

#[derive(Clone, Debug)]
pub enum Component {
    Geometry(Geometry),
    Light(Light),
    Camera(Camera),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    /// Disabled nodes are hidden together with their whole subtree
    pub enabled: bool,
    /// Editor helpers (gizmos, grid) that never render
    pub internal: bool,
    pub components: Vec<Component>,
}

impl SceneNode {
    pub fn camera(&self) -> Option<&Camera> {
        self.components.iter().find_map(|c| match c {
            Component::Camera(camera) => Some(camera),
            _ => None,
        })
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.components.iter_mut().find_map(|c| match c {
            Component::Camera(camera) => Some(camera),
            _ => None,
        })
    }
}

/// Shared assets referenced by components.
#[derive(Clone, Debug, Default)]
pub struct AssetLibrary {
    materials: Vec<Arc<Material>>,
}

impl AssetLibrary {
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len());
        self.materials.push(Arc::new(material));
        id
    }

    pub fn material(&self, id: MaterialId) -> Option<&Arc<Material>> {
        self.materials.get(id.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub name: String,
    nodes: Vec<SceneNode>,
    assets: AssetLibrary,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a node under `parent` (or as a root) and return its id.
    pub fn add_node(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        transform: Transform,
    ) -> SceneResult<NodeId> {
        let id = NodeId(self.nodes.len());
        if let Some(parent_id) = parent {
            self.node_mut(parent_id)?.children.push(id);
        }
        self.nodes.push(SceneNode {
            name: name.into(),
            parent,
            children: Vec::new(),
            transform,
            enabled: true,
            internal: false,
            components: Vec::new(),
        });
        Ok(id)
    }

    pub fn add_component(&mut self, id: NodeId, component: Component) -> SceneResult<()> {
        self.node_mut(id)?.components.push(component);
        Ok(())
    }

    /// Convenience: new root node carrying one component.
    pub fn add_object(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        component: Component,
    ) -> SceneResult<NodeId> {
        let id = self.add_node(None, name, transform)?;
        self.add_component(id, component)?;
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> SceneResult<&SceneNode> {
        self.nodes.get(id.0).ok_or(SceneError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut SceneNode> {
        self.nodes.get_mut(id.0).ok_or(SceneError::UnknownNode(id))
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(i, _)| NodeId(i))
    }

    /// Product of every ancestor's local matrix, root first.
    pub fn world_transform(&self, id: NodeId) -> SceneResult<Mat4> {
        let node = self.node(id)?;
        let local = node.transform.to_matrix();
        match node.parent {
            Some(parent) => Ok(self.world_transform(parent)? * local),
            None => Ok(local),
        }
    }

    pub fn camera(&self, id: NodeId) -> SceneResult<&Camera> {
        self.node(id)?.camera().ok_or(SceneError::NotACamera(id))
    }

    pub fn camera_mut(&mut self, id: NodeId) -> SceneResult<&mut Camera> {
        self.node_mut(id)?
            .camera_mut()
            .ok_or(SceneError::NotACamera(id))
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.assets.add_material(material)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Arc<Material>> {
        self.assets.material(id)
    }

    pub fn assets(&self) -> &AssetLibrary {
        &self.assets
    }
}
