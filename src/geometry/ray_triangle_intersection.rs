use simba::simd::{SimdPartialOrd as _, SimdValue as _};

use crate::util::simd::fma_dot;

use super::{
    BarycentricCoordinates, SimdBoolType, SimdFloatType, TraceRay8, Triangle, WorldVector8,
};

impl Triangle<WorldVector8> {
    /// Calculates ray intersection with the (two sided) triangle pack.
    /// Returns mask of valid intersections, distance along ray, and barycentric uv coordinates.
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(
        &self,
        ray: &TraceRay8,
    ) -> (
        SimdBoolType,
        SimdFloatType,
        BarycentricCoordinates<SimdFloatType>,
    ) {
        let e1 = self[1] - self[0];
        let e2 = self[2] - self[0];

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = fma_dot(&e1, &ray_cross_e2);

        let zero = SimdFloatType::splat(0.0);
        let one = SimdFloatType::splat(1.0);

        let inv_det = one / det; // May be infinite
        let s = ray.origin - self[0];
        let u = inv_det * fma_dot(&s, &ray_cross_e2);

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * fma_dot(&ray.direction, &s_cross_e1);
        let t = inv_det * fma_dot(&e2, &s_cross_e1);

        // Comparisons with NaN (degenerate or parallel cases) are false
        let mask = u.simd_ge(zero) & v.simd_ge(zero) & (u + v).simd_le(one);
        (mask, t, BarycentricCoordinates { u, v })
    }
}

#[cfg(test)]
mod tests {
    use assert2::assert;
    use simba::simd::SimdValue as _;
    use test_case::test_case;

    use super::*;
    use crate::{
        geometry::{LaneVector as _, TraceRay, WorldPoint, WorldVector},
        util::simd::move_mask,
    };

    fn packed(t: Triangle<WorldPoint>) -> Triangle<WorldVector8> {
        t.map(|p| WorldVector8::broadcast(&p.coords))
    }

    fn unit_triangle() -> Triangle<WorldPoint> {
        Triangle::new(
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn hit_centroid_from_above() {
        let ray = TraceRay::new(
            WorldPoint::new(1.0 / 3.0, 1.0 / 3.0, 5.0),
            WorldVector::new(0.0, 0.0, -1.0),
        );
        let (mask, t, uv) = packed(unit_triangle()).intersect(&ray.splat());

        assert!(move_mask(mask) == 0xff);
        assert!((t.extract(0) - 5.0).abs() < 1e-6);
        let uv = uv.extract(0);
        assert!((uv.u - 1.0 / 3.0).abs() < 1e-6);
        assert!((uv.v - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn hit_from_below() {
        let ray = TraceRay::new(
            WorldPoint::new(0.25, 0.25, -2.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        let (mask, t, _) = packed(unit_triangle()).intersect(&ray.splat());

        assert!(move_mask(mask) == 0xff);
        assert!((t.extract(0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn distance_in_direction_lengths() {
        let ray = TraceRay::new(
            WorldPoint::new(0.25, 0.25, 5.0),
            WorldVector::new(0.0, 0.0, -2.0),
        );
        let (_, t, _) = packed(unit_triangle()).intersect(&ray.splat());
        assert!((t.extract(0) - 2.5).abs() < 1e-6);
    }

    #[test_case(0.9, 0.9 ; "beyond_hypotenuse")]
    #[test_case(-0.1, 0.5 ; "left_of_triangle")]
    #[test_case(0.5, -0.1 ; "below_triangle")]
    fn miss_outside(x: f32, y: f32) {
        let ray = TraceRay::new(WorldPoint::new(x, y, 1.0), WorldVector::new(0.0, 0.0, -1.0));
        let (mask, _, _) = packed(unit_triangle()).intersect(&ray.splat());
        assert!(move_mask(mask) == 0);
    }

    #[test]
    fn parallel_ray_misses() {
        let ray = TraceRay::new(
            WorldPoint::new(-1.0, 0.25, 0.0),
            WorldVector::new(1.0, 0.0, 0.0),
        );
        let (mask, _, _) = packed(unit_triangle()).intersect(&ray.splat());
        assert!(move_mask(mask) == 0);
    }

    #[test]
    fn lanes_are_independent() {
        let t = unit_triangle();
        let shifted = |i: usize| WorldVector::new(i as f32 * 10.0, 0.0, 0.0);
        let pack = Triangle::new(
            WorldVector8::from_lanes(|i| t[0].coords + shifted(i)),
            WorldVector8::from_lanes(|i| t[1].coords + shifted(i)),
            WorldVector8::from_lanes(|i| t[2].coords + shifted(i)),
        );
        let ray = TraceRay::new(
            WorldPoint::new(30.25, 0.25, 1.0),
            WorldVector::new(0.0, 0.0, -1.0),
        );
        let (mask, _, _) = pack.intersect(&ray.splat());
        assert!(move_mask(mask) == 1 << 3);
    }
}
