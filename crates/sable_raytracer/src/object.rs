//! The closed set of things a ray can hit.

use sable_core::Material;
use sable_math::{Aabb, Interval, Ray};

use crate::flare::TraceFlare;
use crate::geometry::TraceGeometry;
use crate::intersection::{Intersection, RayType};

#[derive(Clone, Debug)]
pub enum TraceObject {
    Geometry(TraceGeometry),
    Flare(TraceFlare),
}

impl TraceObject {
    /// Nearest hit within `ray_t`. On success the record is overwritten and
    /// points back at this object.
    pub fn intersect<'a>(&'a self, ray: &Ray, ray_t: Interval, hit: &mut Intersection<'a>) -> bool {
        let found = match self {
            TraceObject::Geometry(geometry) => geometry.intersect(ray, ray_t, hit),
            TraceObject::Flare(flare) => flare.intersect(ray, ray_t, hit),
        };
        if found {
            hit.object = Some(self);
        }
        found
    }

    /// World bounds, or `None` for unbounded objects.
    pub fn world_bbox(&self) -> Option<Aabb> {
        match self {
            TraceObject::Geometry(geometry) => geometry.world_bbox(),
            TraceObject::Flare(flare) => Some(flare.world_bbox()),
        }
    }

    /// Flares only show up for rays that carry an image of the scene back
    /// to the camera; shadow and diffuse rays pass through them.
    pub fn visible_to(&self, ray_type: RayType) -> bool {
        match self {
            TraceObject::Geometry(_) => true,
            TraceObject::Flare(_) => matches!(
                ray_type,
                RayType::Camera | RayType::Reflection | RayType::Refraction
            ),
        }
    }

    pub fn material(&self) -> Option<&Material> {
        match self {
            TraceObject::Geometry(geometry) => Some(geometry.material()),
            TraceObject::Flare(_) => None,
        }
    }

    pub fn as_flare(&self) -> Option<&TraceFlare> {
        match self {
            TraceObject::Flare(flare) => Some(flare),
            TraceObject::Geometry(_) => None,
        }
    }
}

impl From<TraceGeometry> for TraceObject {
    fn from(geometry: TraceGeometry) -> Self {
        TraceObject::Geometry(geometry)
    }
}

impl From<TraceFlare> for TraceObject {
    fn from(flare: TraceFlare) -> Self {
        TraceObject::Flare(flare)
    }
}
