//! Plain value types shared with C callers.

use bytemuck::{Pod, Zeroable};

use crate::geometry::{TraceRay, WorldPoint, WorldVector};

/// Geometry or primitive id meaning "no hit".
pub const INVALID_ID: u32 = u32::MAX;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Vector3 { x, y, z }
    }
}

impl From<Vector3> for WorldPoint {
    fn from(v: Vector3) -> Self {
        WorldPoint::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for WorldVector {
    fn from(v: Vector3) -> Self {
        WorldVector::new(v.x, v.y, v.z)
    }
}

/// Query ray. Direction doesn't need to be normalized,
/// hit distances are measured in multiples of its length.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Ray {
    pub origin: Vector3,
    pub direction: Vector3,
    /// Hits closer than this are ignored.
    pub min_distance: f32,
}

impl Ray {
    pub fn new(origin: impl Into<Vector3>, direction: impl Into<Vector3>) -> Self {
        Ray {
            origin: origin.into(),
            direction: direction.into(),
            min_distance: 0.0,
        }
    }

    pub fn with_min_distance(self, min_distance: f32) -> Self {
        Ray {
            min_distance,
            ..self
        }
    }
}

impl From<&Ray> for TraceRay {
    fn from(ray: &Ray) -> Self {
        TraceRay::new(ray.origin.into(), ray.direction.into())
    }
}

/// Result of a nearest hit query.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Hit {
    pub geometry_id: u32,
    pub primitive_id: u32,
    pub u: f32,
    pub v: f32,
    pub distance: f32,
}

impl Hit {
    pub const MISS: Hit = Hit {
        geometry_id: INVALID_ID,
        primitive_id: INVALID_ID,
        u: 0.0,
        v: 0.0,
        distance: f32::INFINITY,
    };

    pub fn is_hit(&self) -> bool {
        self.geometry_id != INVALID_ID
    }
}

impl Default for Hit {
    fn default() -> Self {
        Hit::MISS
    }
}
