use arrayvec::ArrayVec;
use wide::f32x8;

use crate::geometry::{SIMD_LANES, SimdBoolType, SimdFloatType, WorldVector8};

/// Splits a flat iterator into windows of at most `SIMD_LANES` elements.
/// Only the last window may be shorter.
pub fn simd_windows<T>(
    value: impl IntoIterator<Item = T>,
) -> impl Iterator<Item = ArrayVec<T, SIMD_LANES>> {
    let mut iter = value.into_iter();
    std::iter::from_fn(move || {
        let window: ArrayVec<T, SIMD_LANES> = iter.by_ref().take(SIMD_LANES).collect();
        if window.is_empty() { None } else { Some(window) }
    })
}

/// Bit mask with the lowest `count` lanes set.
pub fn lane_mask(count: usize) -> u64 {
    debug_assert!(count <= SIMD_LANES);
    (1u64 << count) - 1
}

/// Converts a comparison result into a bit mask, one bit per lane.
pub fn move_mask(mask: SimdBoolType) -> u64 {
    mask.0.move_mask() as u32 as u64
}

pub fn fma_dot(a: &WorldVector8, b: &WorldVector8) -> SimdFloatType {
    simba::simd::WideF32x8(f32x8::mul_add(
        a.z.0,
        b.z.0,
        f32x8::mul_add(a.y.0, b.y.0, a.x.0 * b.x.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;
    use proptest::{prelude::Strategy, prop_assert};
    use simba::simd::SimdValue as _;
    use test_strategy::proptest;

    use crate::geometry::{LaneVector as _, WorldVector};

    #[test]
    fn simd_windows_exact_fill() {
        let result: Vec<_> = simd_windows(0..16).collect();
        assert!(result.len() == 2);
        assert!(result[0][0] == 0);
        assert!(result[0][7] == 7);
        assert!(result[1][0] == 8);
        assert!(result[1][7] == 15);
    }

    #[test]
    fn simd_windows_partial_fill() {
        let result: Vec<_> = simd_windows(0..10).collect();
        assert!(result.len() == 2);
        assert!(result[0].len() == 8);
        assert!(result[1].to_vec() == vec![8, 9]);
    }

    #[test]
    fn simd_windows_empty() {
        let result: Vec<_> = simd_windows(std::iter::empty::<f32>()).collect();
        assert!(result.is_empty());
    }

    #[test]
    fn lane_masks() {
        assert!(lane_mask(0) == 0);
        assert!(lane_mask(3) == 0b111);
        assert!(lane_mask(SIMD_LANES) == 0xff);
    }

    fn world_vector_strategy() -> impl Strategy<Value = WorldVector> {
        (-1e3f32..1e3f32, -1e3f32..1e3f32, -1e3f32..1e3f32)
            .prop_map(|(x, y, z)| WorldVector::new(x, y, z))
    }

    #[proptest]
    fn fma_dot_matches_nalgebra_dot(
        #[strategy(proptest::array::uniform8(world_vector_strategy()))] a: [WorldVector; 8],
        #[strategy(proptest::array::uniform8(world_vector_strategy()))] b: [WorldVector; 8],
    ) {
        let actual = fma_dot(
            &WorldVector8::from_lanes(|i| a[i]),
            &WorldVector8::from_lanes(|i| b[i]),
        );

        // Allow slight float inaccuracy
        for i in 0..8 {
            let e = a[i].dot(&b[i]);
            let difference = (e - actual.extract(i)).abs();
            let scale = a[i].norm() * b[i].norm();
            prop_assert!(
                difference <= scale * 1e-5 + 1e-3,
                "Mismatch at lane {}: expected {}, got {}",
                i,
                e,
                actual.extract(i)
            );
        }
    }
}
