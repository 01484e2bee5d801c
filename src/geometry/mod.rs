mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;
mod vector8;

pub use aabb::AABB;
pub use triangle::{BarycentricCoordinates, Triangle};
pub use vector8::{LaneVector, SIMD_LANES, SimdBoolType, SimdFloatType, WorldVector8};

pub type FloatType = f32;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

/// Eight boxes, stored lane-wise.
pub type WorldBox8 = AABB<WorldVector8>;

#[derive(Copy, Clone, Debug)]
pub struct TraceRay {
    pub origin: WorldPoint,
    /// Direction of the ray, distances along the ray are measured in multiples of its length.
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl TraceRay {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> TraceRay {
        let inv_direction = direction.map(|x| if x == 0.0 { f32::INFINITY } else { 1.0 / x });

        TraceRay {
            origin,
            direction,
            inv_direction,
        }
    }

    /// Broadcasts the ray into all SIMD lanes.
    pub fn splat(&self) -> TraceRay8 {
        TraceRay8 {
            origin: WorldVector8::broadcast(&self.origin.coords),
            direction: WorldVector8::broadcast(&self.direction),
            inv_direction: WorldVector8::broadcast(&self.inv_direction),
        }
    }
}

#[cfg(test)]
impl TraceRay {
    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

/// A single ray broadcast to all lanes, for testing against packets of boxes or triangles.
#[derive(Copy, Clone, Debug)]
pub struct TraceRay8 {
    pub origin: WorldVector8,
    pub direction: WorldVector8,
    pub inv_direction: WorldVector8,
}
