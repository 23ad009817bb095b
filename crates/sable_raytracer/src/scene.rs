//! Immutable, traceable snapshot of a scene.
//!
//! Built once from the scene graph before any worker starts. Bounded objects
//! go into the SAH tree, unbounded ones (infinite planes) are scanned
//! linearly on every query. With acceleration turned off everything is
//! scanned linearly, which gives the reference result for the tree.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use sable_core::{Component, Geometry, Material, NodeId, Scene, Shape};
use sable_math::{Interval, Mat4, Ray, RAY_EPSILON};

use crate::flare::TraceFlare;
use crate::geometry::TraceGeometry;
use crate::intersection::{Intersection, RayType};
use crate::light::TraceLight;
use crate::object::TraceObject;
use crate::tree::TreeBox;

pub struct TraceScene {
    bounded: Vec<TraceObject>,
    unbounded: Vec<TraceObject>,
    lights: Vec<TraceLight>,
    tree: TreeBox,
    accelerated: bool,
}

/// Objects gathered while walking the scene graph.
#[derive(Default)]
struct Collector {
    bounded: Vec<TraceObject>,
    unbounded: Vec<TraceObject>,
    lights: Vec<TraceLight>,
    skipped: usize,
}

impl Collector {
    fn push(&mut self, object: TraceObject) {
        if object.world_bbox().is_some() {
            self.bounded.push(object);
        } else {
            self.unbounded.push(object);
        }
    }

    fn visit(&mut self, scene: &Scene, id: NodeId, parent_world: &Mat4) {
        let Ok(node) = scene.node(id) else {
            return;
        };
        // Hidden nodes hide their whole subtree.
        if !node.enabled || node.internal {
            return;
        }

        let world = *parent_world * node.transform.to_matrix();
        for component in &node.components {
            match component {
                Component::Geometry(geometry) => self.add_geometry(scene, &node.name, geometry, &world),
                Component::Light(light) => {
                    let light = TraceLight::new(light.clone(), world);
                    if let Some(flare) = TraceFlare::from_light(&light) {
                        self.push(flare.into());
                    }
                    self.lights.push(light);
                }
                Component::Camera(_) => {}
            }
        }

        for child in &node.children {
            self.visit(scene, *child, &world);
        }
    }

    fn add_geometry(&mut self, scene: &Scene, name: &str, geometry: &Geometry, world: &Mat4) {
        let Some(material) = resolve_material(scene, geometry) else {
            log::warn!("Skipping geometry on '{}': no traceable material", name);
            self.skipped += 1;
            return;
        };

        match &geometry.shape {
            Shape::Mesh(mesh) => {
                let triangles: Vec<TraceGeometry> = mesh
                    .triangles()
                    .par_iter()
                    .map(|tri| TraceGeometry::triangle(tri, world, Arc::clone(&material)))
                    .collect();
                for triangle in triangles {
                    self.push(triangle.into());
                }
            }
            shape => {
                if let Some(object) = TraceGeometry::analytic(shape, world, material) {
                    self.push(object.into());
                }
            }
        }
    }
}

fn resolve_material(scene: &Scene, geometry: &Geometry) -> Option<Arc<Material>> {
    let material = scene.material(geometry.material?)?;
    material.is_traceable().then(|| Arc::clone(material))
}

impl TraceScene {
    pub fn new(scene: &Scene, use_acceleration: bool) -> Self {
        let start = Instant::now();

        let mut collector = Collector::default();
        for root in scene.roots() {
            collector.visit(scene, root, &Mat4::IDENTITY);
        }
        let Collector {
            mut bounded,
            mut unbounded,
            lights,
            skipped,
        } = collector;

        let tree = if use_acceleration {
            TreeBox::new(&bounded)
        } else {
            unbounded.append(&mut bounded);
            TreeBox::empty()
        };

        log::info!(
            "Trace scene '{}': {} bounded, {} unbounded, {} lights, {} skipped ({:.1} ms)",
            scene.name,
            bounded.len(),
            unbounded.len(),
            lights.len(),
            skipped,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Self {
            bounded,
            unbounded,
            lights,
            tree,
            accelerated: use_acceleration,
        }
    }

    /// Nearest hit in front of the ray origin. On a miss `hit` is reset with
    /// `t = Intersection::MISS_T`.
    pub fn intersect<'a>(&'a self, ray: &Ray, ray_type: RayType, hit: &mut Intersection<'a>) -> bool {
        self.intersect_within(ray, Interval::new(RAY_EPSILON, f32::INFINITY), ray_type, hit)
    }

    /// Nearest hit inside `ray_t`, e.g. up to a light for shadow rays.
    pub fn intersect_within<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        ray_type: RayType,
        hit: &mut Intersection<'a>,
    ) -> bool {
        let mut found = false;
        let mut closest = ray_t.max;

        for object in &self.unbounded {
            if object.visible_to(ray_type) && object.intersect(ray, ray_t.with_max(closest), hit) {
                found = true;
                closest = hit.t;
            }
        }

        if self
            .tree
            .intersect(&self.bounded, ray, ray_t.with_max(closest), ray_type, hit)
        {
            found = true;
        }

        if !found {
            *hit = Intersection::miss();
        }
        found
    }

    pub fn bounded_objects(&self) -> &[TraceObject] {
        &self.bounded
    }

    pub fn unbounded_objects(&self) -> &[TraceObject] {
        &self.unbounded
    }

    pub fn lights(&self) -> &[TraceLight] {
        &self.lights
    }

    pub fn tree(&self) -> &TreeBox {
        &self.tree
    }

    pub fn is_accelerated(&self) -> bool {
        self.accelerated
    }

    pub fn object_count(&self) -> usize {
        self.bounded.len() + self.unbounded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::{Light, Mesh, ShadingModel, Transform};
    use sable_math::Vec3;

    fn test_scene() -> Scene {
        let mut scene = Scene::new("test");
        let grey = scene.add_material(Material::diffuse("grey", Vec3::splat(0.5)));

        scene
            .add_object(
                "quad",
                Transform::from_translation(Vec3::new(0.0, 0.0, -5.0)),
                Component::Geometry(Geometry::mesh(Mesh::quad(2.0, 2.0), grey)),
            )
            .unwrap();
        scene
            .add_object(
                "ball",
                Transform::from_translation(Vec3::new(3.0, 0.0, -5.0)),
                Component::Geometry(Geometry::new(Shape::Sphere { radius: 1.0 }, grey)),
            )
            .unwrap();
        scene
            .add_object(
                "floor",
                Transform::from_translation(Vec3::new(0.0, -2.0, 0.0)),
                Component::Geometry(Geometry::new(Shape::Plane, grey)),
            )
            .unwrap();
        scene
            .add_object(
                "key",
                Transform::from_translation(Vec3::new(0.0, 5.0, 0.0)),
                Component::Light(Light::point(Vec3::ONE, 1.0)),
            )
            .unwrap();
        scene
            .add_object(
                "sun",
                Transform::default(),
                Component::Light(Light::directional(Vec3::ONE, 1.0)),
            )
            .unwrap();
        scene
    }

    #[test]
    fn test_classifies_objects() {
        let trace = TraceScene::new(&test_scene(), true);
        // Two quad triangles, the sphere and the point light's flare.
        assert_eq!(trace.bounded_objects().len(), 4);
        assert_eq!(trace.unbounded_objects().len(), 1);
        assert_eq!(trace.lights().len(), 2);
        assert!(trace.is_accelerated());
        assert!(!trace.tree().is_empty());
    }

    #[test]
    fn test_brute_force_keeps_everything_unbounded() {
        let trace = TraceScene::new(&test_scene(), false);
        assert!(trace.bounded_objects().is_empty());
        assert_eq!(trace.unbounded_objects().len(), 5);
        assert!(trace.tree().is_empty());
    }

    #[test]
    fn test_disabled_subtree_and_bad_materials_are_skipped() {
        let mut scene = Scene::new("skips");
        let grey = scene.add_material(Material::diffuse("grey", Vec3::splat(0.5)));
        let wire = scene.add_material(Material::default().with_model(ShadingModel::Wireframe));

        let parent = scene
            .add_object(
                "parent",
                Transform::default(),
                Component::Geometry(Geometry::new(Shape::Sphere { radius: 1.0 }, grey)),
            )
            .unwrap();
        let child = scene.add_node(Some(parent), "child", Transform::default()).unwrap();
        scene
            .add_component(child, Component::Geometry(Geometry::new(Shape::Sphere { radius: 0.5 }, grey)))
            .unwrap();
        scene.node_mut(parent).unwrap().enabled = false;

        scene
            .add_object(
                "wire",
                Transform::default(),
                Component::Geometry(Geometry::new(Shape::Sphere { radius: 1.0 }, wire)),
            )
            .unwrap();
        scene
            .add_object(
                "untextured",
                Transform::default(),
                Component::Geometry(Geometry {
                    shape: Shape::Plane,
                    material: None,
                }),
            )
            .unwrap();
        let helper = scene
            .add_object(
                "gizmo",
                Transform::default(),
                Component::Geometry(Geometry::new(Shape::Sphere { radius: 1.0 }, grey)),
            )
            .unwrap();
        scene.node_mut(helper).unwrap().internal = true;

        let trace = TraceScene::new(&scene, true);
        assert_eq!(trace.object_count(), 0);
        assert!(trace.tree().is_empty());
    }

    #[test]
    fn test_child_inherits_parent_transform() {
        let mut scene = Scene::new("nested");
        let grey = scene.add_material(Material::diffuse("grey", Vec3::splat(0.5)));
        let parent = scene
            .add_node(None, "group", Transform::from_translation(Vec3::new(0.0, 0.0, -10.0)))
            .unwrap();
        let child = scene
            .add_node(Some(parent), "ball", Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)))
            .unwrap();
        scene
            .add_component(child, Component::Geometry(Geometry::new(Shape::Sphere { radius: 1.0 }, grey)))
            .unwrap();

        let trace = TraceScene::new(&scene, true);
        let mut hit = Intersection::miss();
        let ray = Ray::new(sable_math::Vec3::ZERO, Vec3::NEG_Z);
        assert!(trace.intersect(&ray, RayType::Camera, &mut hit));
        assert!((hit.t - 7.0).abs() < 1e-4);
    }

    #[test]
    fn test_miss_leaves_sentinel() {
        let trace = TraceScene::new(&test_scene(), true);
        let ray = Ray::new(Vec3::new(0.0, 10.0, 0.0), Vec3::Y);
        let mut hit = Intersection::miss();
        assert!(!trace.intersect(&ray, RayType::Camera, &mut hit));
        assert_eq!(hit.t, Intersection::MISS_T);
        assert!(hit.object.is_none());
    }

    #[test]
    fn test_flare_hidden_from_shadow_rays() {
        let trace = TraceScene::new(&test_scene(), true);
        let ray = Ray::towards(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 5.0, 0.0));

        let mut hit = Intersection::miss();
        assert!(trace.intersect(&ray, RayType::Camera, &mut hit));
        assert!(hit.object.and_then(TraceObject::as_flare).is_some());

        let mut shadow = Intersection::miss();
        assert!(!trace.intersect(&ray, RayType::Shadow, &mut shadow));
    }

    #[test]
    fn test_unbounded_plane_and_tree_pick_nearest() {
        let trace = TraceScene::new(&test_scene(), true);
        // Straight down through the sphere at x = 3 onto the floor plane.
        let ray = Ray::new(Vec3::new(3.0, 10.0, -5.0), Vec3::NEG_Y);
        let mut hit = Intersection::miss();
        assert!(trace.intersect(&ray, RayType::Camera, &mut hit));
        assert!((hit.t - 9.0).abs() < 1e-4);

        let beside = Ray::new(Vec3::new(6.0, 10.0, -5.0), Vec3::NEG_Y);
        let mut hit = Intersection::miss();
        assert!(trace.intersect(&beside, RayType::Camera, &mut hit));
        assert!((hit.t - 12.0).abs() < 1e-4);
    }
}
