use std::array;

use simba::simd::{SimdValue as _, WideBoolF32x8, WideF32x8};

use super::WorldVector;

pub type SimdFloatType = WideF32x8;
pub type SimdBoolType = WideBoolF32x8;
pub const SIMD_LANES: usize = 8;

/// Eight 3D vectors (or points), stored lane-wise.
pub type WorldVector8 = nalgebra::Vector3<SimdFloatType>;

/// Moving scalar vectors in and out of SIMD lanes.
pub trait LaneVector {
    /// The same vector in all lanes.
    fn broadcast(v: &WorldVector) -> Self;
    fn from_lanes(f: impl FnMut(usize) -> WorldVector) -> Self;
    fn lane(&self, i: usize) -> WorldVector;
}

impl LaneVector for WorldVector8 {
    fn broadcast(v: &WorldVector) -> Self {
        v.map(SimdFloatType::splat)
    }

    fn from_lanes(f: impl FnMut(usize) -> WorldVector) -> Self {
        let lanes: [WorldVector; SIMD_LANES] = array::from_fn(f);
        WorldVector8::from_fn(|row, _| SimdFloatType::from(lanes.map(|v| v[row])))
    }

    fn lane(&self, i: usize) -> WorldVector {
        self.map(|x| x.extract(i))
    }
}
