//! Traceable wrappers around geometry components.
//!
//! Meshes are flattened into world-space triangles up front, so their
//! transform is the identity. Analytic shapes keep their world transform and
//! are intersected in local space; the inverse and normal matrices are
//! computed once here and only read afterwards.

use std::f32::consts::PI;
use std::sync::Arc;

use sable_core::{Material, MeshTriangle, Shape};
use sable_math::{Aabb, Interval, Mat3, Mat4, Mat4Ext, Ray, Vec2, Vec3};

use crate::intersection::Intersection;

/// Triangle already transformed into world space.
#[derive(Clone, Debug)]
pub struct WorldTriangle {
    p0: Vec3,
    edge1: Vec3,
    edge2: Vec3,
    normals: [Vec3; 3],
    uvs: [Vec2; 3],
    face_normal: Vec3,
}

impl WorldTriangle {
    pub fn new(positions: [Vec3; 3], normals: Option<[Vec3; 3]>, uvs: [Vec2; 3]) -> Self {
        let [p0, p1, p2] = positions;
        let edge1 = p1 - p0;
        let edge2 = p2 - p0;
        let mut face_normal = edge1.cross(edge2).try_normalize().unwrap_or(Vec3::Z);

        let normals = match normals {
            Some(normals) => {
                // Keep the geometric normal on the same side as the authored
                // ones (mirroring transforms flip the winding).
                if face_normal.dot(normals[0] + normals[1] + normals[2]) < 0.0 {
                    face_normal = -face_normal;
                }
                normals
            }
            None => [face_normal; 3],
        };

        Self {
            p0,
            edge1,
            edge2,
            normals,
            uvs,
            face_normal,
        }
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.p0, self.p0 + self.edge1, self.p0 + self.edge2]
    }

    fn bbox(&self) -> Aabb {
        Aabb::from_point_cloud(&self.vertices())
    }

    /// Möller-Trumbore intersection with barycentric attribute interpolation.
    fn intersect(&self, ray: &Ray, ray_t: Interval, hit: &mut Intersection) -> bool {
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);

        // Ray is parallel to the triangle (or the triangle is degenerate)
        if a.abs() < 1e-10 {
            return false;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.p0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = f * self.edge2.dot(q);
        if !ray_t.contains(t) {
            return false;
        }

        let w = 1.0 - u - v;
        let normal = w * self.normals[0] + u * self.normals[1] + v * self.normals[2];

        hit.t = t;
        hit.point = ray.at(t);
        hit.true_normal = self.face_normal;
        hit.normal = normal.try_normalize().unwrap_or(self.face_normal);
        hit.uv = w * self.uvs[0] + u * self.uvs[1] + v * self.uvs[2];
        true
    }
}

#[derive(Clone, Debug)]
pub enum GeometryShape {
    Triangle(WorldTriangle),
    Sphere { radius: f32 },
    Plane,
}

/// A geometry component (or one triangle of it) ready for tracing.
#[derive(Clone, Debug)]
pub struct TraceGeometry {
    shape: GeometryShape,
    material: Arc<Material>,
    transform: Mat4,
    inverse: Mat4,
    normal_matrix: Mat3,
    /// Set when the shape is already in world space
    identity: bool,
    bbox: Option<Aabb>,
}

impl TraceGeometry {
    /// World-space triangle from a local mesh triangle and its node's world
    /// transform. Normals go through the normal matrix; UVs are copied.
    pub fn triangle(triangle: &MeshTriangle, world: &Mat4, material: Arc<Material>) -> Self {
        let normal_matrix = world.normal_matrix();
        let positions = triangle.positions.map(|p| world.transform_point3(p));
        let normals = triangle
            .normals
            .map(|ns| ns.map(|n| (normal_matrix * n).normalize_or_zero()));
        let tri = WorldTriangle::new(positions, normals, triangle.uvs);
        let bbox = Some(tri.bbox());

        Self {
            shape: GeometryShape::Triangle(tri),
            material,
            transform: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            normal_matrix: Mat3::IDENTITY,
            identity: true,
            bbox,
        }
    }

    /// Analytic shape kept in local space. Returns `None` for meshes, which
    /// have to be tessellated instead.
    pub fn analytic(shape: &Shape, world: &Mat4, material: Arc<Material>) -> Option<Self> {
        let (shape, bbox) = match shape {
            Shape::Mesh(_) => return None,
            Shape::Sphere { radius } => {
                let r = Vec3::splat(radius.abs());
                let local = Aabb::from_points(-r, r);
                (
                    GeometryShape::Sphere { radius: radius.abs() },
                    Some(world.transform_aabb(&local)),
                )
            }
            Shape::Plane => (GeometryShape::Plane, None),
        };

        Some(Self {
            shape,
            material,
            transform: *world,
            inverse: world.inverse(),
            normal_matrix: world.normal_matrix(),
            identity: world.is_near_identity(1e-7),
            bbox,
        })
    }

    pub fn shape(&self) -> &GeometryShape {
        &self.shape
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// `None` for unbounded shapes such as planes.
    pub fn world_bbox(&self) -> Option<Aabb> {
        self.bbox
    }

    pub fn intersect(&self, ray: &Ray, ray_t: Interval, hit: &mut Intersection) -> bool {
        match &self.shape {
            GeometryShape::Triangle(tri) => tri.intersect(ray, ray_t, hit),
            GeometryShape::Sphere { radius } => self.intersect_sphere(*radius, ray, ray_t, hit),
            GeometryShape::Plane => self.intersect_plane(ray, ray_t, hit),
        }
    }

    /// Ray in local space. The direction is not renormalised so `t` stays
    /// valid in world space.
    fn to_local(&self, ray: &Ray) -> Ray {
        if self.identity {
            return *ray;
        }
        Ray::new(
            self.inverse.transform_point3(ray.origin),
            self.inverse.transform_vector3(ray.direction),
        )
    }

    fn world_normal(&self, local: Vec3) -> Vec3 {
        (self.normal_matrix * local).normalize_or_zero()
    }

    fn intersect_sphere(&self, radius: f32, ray: &Ray, ray_t: Interval, hit: &mut Intersection) -> bool {
        let local = self.to_local(ray);
        let a = local.direction.length_squared();
        let h = local.direction.dot(local.origin);
        let c = local.origin.length_squared() - radius * radius;

        let discriminant = h * h - a * c;
        if a == 0.0 || discriminant < 0.0 {
            return false;
        }

        let sqrtd = discriminant.sqrt();
        let mut root = (-h - sqrtd) / a;
        if !ray_t.contains(root) {
            root = (-h + sqrtd) / a;
            if !ray_t.contains(root) {
                return false;
            }
        }

        let p = local.at(root);
        let outward = p / radius;
        let theta = (-outward.y).clamp(-1.0, 1.0).acos();
        let phi = (-outward.z).atan2(outward.x) + PI;

        hit.t = root;
        hit.point = ray.at(root);
        hit.normal = self.world_normal(outward);
        hit.true_normal = hit.normal;
        hit.uv = Vec2::new(phi / (2.0 * PI), theta / PI);
        true
    }

    fn intersect_plane(&self, ray: &Ray, ray_t: Interval, hit: &mut Intersection) -> bool {
        let local = self.to_local(ray);
        if local.direction.y.abs() < 1e-12 {
            return false;
        }
        let t = -local.origin.y / local.direction.y;
        if !ray_t.contains(t) {
            return false;
        }

        let p = local.at(t);
        hit.t = t;
        hit.point = ray.at(t);
        hit.normal = self.world_normal(Vec3::Y);
        hit.true_normal = hit.normal;
        hit.uv = Vec2::new(p.x, p.z);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey() -> Arc<Material> {
        Arc::new(Material::diffuse("grey", Vec3::splat(0.5)))
    }

    fn flat_triangle() -> MeshTriangle {
        MeshTriangle {
            positions: [
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            normals: None,
            uvs: [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.5, 1.0)],
        }
    }

    fn wide() -> Interval {
        Interval::new(1e-4, f32::INFINITY)
    }

    #[test]
    fn test_triangle_is_pretransformed() {
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        let geom = TraceGeometry::triangle(&flat_triangle(), &world, grey());
        assert!(geom.is_identity());

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut hit = Intersection::miss();
        assert!(geom.intersect(&ray, wide(), &mut hit));
        assert!((hit.t - 3.0).abs() < 1e-5);
        assert!((hit.true_normal - Vec3::Z).length() < 1e-5);

        let bbox = geom.world_bbox().unwrap();
        assert!((bbox.centroid().z + 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_triangle_interpolates_uv_and_normals() {
        let mut tri = flat_triangle();
        tri.normals = Some([Vec3::Z, Vec3::X, Vec3::Z]);
        let geom = TraceGeometry::triangle(&tri, &Mat4::IDENTITY, grey());

        // Hit exactly at vertex 1 (u = 1, v = 0).
        let ray = Ray::new(Vec3::new(0.999, -0.9995, 1.0), Vec3::NEG_Z);
        let mut hit = Intersection::miss();
        assert!(geom.intersect(&ray, wide(), &mut hit));
        assert!(hit.uv.x > 0.99);
        assert!(hit.normal.x > 0.9);
    }

    #[test]
    fn test_triangle_respects_interval() {
        let geom = TraceGeometry::triangle(&flat_triangle(), &Mat4::IDENTITY, grey());
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let mut hit = Intersection::miss();
        assert!(!geom.intersect(&ray, Interval::new(1e-4, 4.0), &mut hit));
        assert_eq!(hit.t, Intersection::MISS_T);
    }

    #[test]
    fn test_scaled_sphere() {
        let world = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            sable_math::Quat::IDENTITY,
            Vec3::new(0.0, 0.0, -10.0),
        );
        let geom = TraceGeometry::analytic(&Shape::Sphere { radius: 1.0 }, &world, grey()).unwrap();
        assert!(!geom.is_identity());

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let mut hit = Intersection::miss();
        assert!(geom.intersect(&ray, wide(), &mut hit));
        assert!((hit.t - 8.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Z).length() < 1e-4);

        let bbox = geom.world_bbox().unwrap();
        assert!((bbox.x.max - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_ray_from_inside_sphere_hits_far_side() {
        let geom =
            TraceGeometry::analytic(&Shape::Sphere { radius: 1.0 }, &Mat4::IDENTITY, grey()).unwrap();
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let mut hit = Intersection::miss();
        assert!(geom.intersect(&ray, wide(), &mut hit));
        assert!((hit.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_plane_is_unbounded() {
        let world = Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0));
        let geom = TraceGeometry::analytic(&Shape::Plane, &world, grey()).unwrap();
        assert!(geom.world_bbox().is_none());

        let ray = Ray::new(Vec3::new(100.0, 4.0, -30.0), Vec3::NEG_Y);
        let mut hit = Intersection::miss();
        assert!(geom.intersect(&ray, wide(), &mut hit));
        assert!((hit.t - 5.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-5);

        let parallel = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(!geom.intersect(&parallel, wide(), &mut Intersection::miss()));
    }

    #[test]
    fn test_mesh_shape_is_not_analytic() {
        let mesh = Shape::Mesh(Arc::new(sable_core::Mesh::quad(1.0, 1.0)));
        assert!(TraceGeometry::analytic(&mesh, &Mat4::IDENTITY, grey()).is_none());
    }
}
