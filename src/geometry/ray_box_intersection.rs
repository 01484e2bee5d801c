use simba::simd::{SimdPartialOrd as _, SimdValue as _};

use super::{SimdBoolType, SimdFloatType, TraceRay8, WorldBox8};

/// Relative slack added to the far intersection distance, so that rounding in the
/// slab test never rejects a box the ray actually touches (flat boxes included).
const FAR_DISTANCE_SCALE: f32 = 1.0 + 2.0 * gamma(3);

const fn gamma(n: i32) -> f32 {
    let n_epsilon = n as f32 * f32::EPSILON * 0.5;
    n_epsilon / (1.0 - n_epsilon)
}

impl WorldBox8 {
    /// Calculates ray intersection with the box pack.
    /// Returns minimum and maximum distance along the ray, ray intersects if min <= max.
    pub fn intersect(&self, ray: &TraceRay8) -> (SimdFloatType, SimdFloatType) {
        // Componentwise distances along the ray to the box's min and max corners
        // The multiplication is NAN if the ray is starting inside the slab bounding plane
        // and is parallel to it. In this case we select +-infinity, so that the range becomes infinite
        let to_box_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| SimdFloatType::splat(f32::NEG_INFINITY).select(is_nan(x), x));
        let to_box_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| SimdFloatType::splat(f32::INFINITY).select(is_nan(x), x));

        // Correctly ordered (min_t <= max_t)
        let componentwise_min_t = to_box_min.zip_map(&to_box_max, |a, b| a.simd_min(b));
        let componentwise_max_t = to_box_min.zip_map(&to_box_max, |a, b| a.simd_max(b));

        let min_t = componentwise_min_t
            .x
            .simd_max(componentwise_min_t.y)
            .simd_max(componentwise_min_t.z);
        let max_t = componentwise_max_t
            .x
            .simd_min(componentwise_max_t.y)
            .simd_min(componentwise_max_t.z)
            * SimdFloatType::splat(FAR_DISTANCE_SCALE);

        (min_t, max_t)
    }
}

fn is_nan(x: SimdFloatType) -> SimdBoolType {
    simba::simd::WideBoolF32x8(x.0.is_nan())
}

#[cfg(test)]
pub mod test {
    use assert2::assert;
    use simba::simd::SimdValue as _;
    use test_case::{test_case, test_matrix};

    use super::*;

    use crate::geometry::{TraceRay, WorldBox, WorldPoint, WorldVector};

    /// Checks cases when the ray hits the box, including some corner cases.
    #[test_matrix(
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-10.0, -1.0, 0.0, 2.0, 5.0, 20.0]
    )]
    fn hit(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, origin_pos: f32) {
        if dx == 0.0 && dy == 0.0 && dz == 0.0 {
            return;
        }

        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());
        let b_simd = WorldBox8::from_boxes(&[b; 8]);

        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        let temp_r = TraceRay::new(p, d);
        let origin = temp_r.point_at(origin_pos);
        let r = TraceRay::new(origin, d);

        let result = simd_result_to_scalar(b_simd.intersect(&r.splat()));

        let (t1, t2) =
            result.expect("The ray passes through a point of the box, we should always have an intersection");

        let p1 = r.point_at(t1);
        let p2 = r.point_at(t2);

        assert!(point_is_on_box_surface(&p1, &b), "{p1:?} must be in {b:?}");
        assert!(point_is_on_box_surface(&p2, &b), "{p2:?} must be in {b:?}");
    }

    /// Asserts that all lanes have identical data and returns the intersection if one was found
    fn simd_result_to_scalar(result_simd: (SimdFloatType, SimdFloatType)) -> Option<(f32, f32)> {
        const TOLERANCE: f32 = 1e-3;

        let t1s: [f32; 8] = std::array::from_fn(|i| result_simd.0.extract(i));
        let t2s: [f32; 8] = std::array::from_fn(|i| result_simd.1.extract(i));
        let (t1, t2) = (t1s[0], t2s[0]);
        assert!(t1s.iter().all(|x| *x == t1));
        assert!(t2s.iter().all(|x| *x == t2));

        if t1 <= t2 {
            Some((t1, t2))
        } else if t1 <= t2 + TOLERANCE {
            let t = (t1 + t2) / 2.0;
            Some((t, t))
        } else {
            None
        }
    }

    /// Just a manual example of ray grazing along an edge.
    #[test]
    fn hit_along_edge() {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());
        let b_simd = WorldBox8::from_boxes(&[b]);

        let r = TraceRay::new(
            WorldPoint::new(5.0, 5.0, 0.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        let (t1, t2) = simd_result_to_lane(b_simd.intersect(&r.splat()), 0);

        assert!(t1 == 5.0);
        assert!((t2 - 10.0).abs() < 1e-5);
    }

    /// A box with zero thickness must still be hit by a ray crossing it at an angle.
    #[test]
    fn hit_flat_box() {
        let b = WorldBox::new([0.0, 0.0, 1.0].into(), [3.0, 3.0, 1.0].into());
        let b_simd = WorldBox8::from_boxes(&[b]);

        let r = TraceRay::new(
            WorldPoint::new(0.1, 0.2, 3.0),
            WorldVector::new(0.3, 0.7, -1.3),
        );

        let (t1, t2) = simd_result_to_lane(b_simd.intersect(&r.splat()), 0);
        assert!(t1 <= t2);
    }

    /// Non-normalized directions measure distance in multiples of the direction length.
    #[test]
    fn distance_scales_with_direction_length() {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());
        let b_simd = WorldBox8::from_boxes(&[b]);

        let r = TraceRay::new(
            WorldPoint::new(7.0, 7.0, 0.0),
            WorldVector::new(0.0, 0.0, 2.0),
        );

        let (t1, _t2) = simd_result_to_lane(b_simd.intersect(&r.splat()), 0);
        assert!(t1 == 2.5);
    }

    fn simd_result_to_lane(result_simd: (SimdFloatType, SimdFloatType), lane: usize) -> (f32, f32) {
        (result_simd.0.extract(lane), result_simd.1.extract(lane))
    }

    /// Rays that lie parallel to one axis and start outside the corresponding slab
    /// must miss, even if they move toward the box on other axes or remain unchanged.
    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0,   0.0 ; "low_x_parallel_miss")]
    #[test_case(12.0,  7.0,  7.0,   0.0, 1.0, 0.0,   0.0 ; "high_x_parallel_miss")]
    #[test_case( 7.0,  0.0,  7.0,   1.0, 0.0, 0.0,   0.0 ; "low_y_parallel_miss")]
    #[test_case( 7.0, 12.0,  7.0,   1.0, 0.0, 0.0,   0.0 ; "high_y_parallel_miss")]
    #[test_case( 7.0,  7.0,  0.0,   1.0, 0.0, 0.0,   0.0 ; "low_z_parallel_miss")]
    #[test_case( 7.0,  7.0, 12.0,   1.0, 0.0, 0.0,   0.0 ; "high_z_parallel_miss")]
    #[test_case( 0.0,  5.0,  7.0,   1.0, 0.0, 1.0,   0.0 ; "corner_miss")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, 1.0, 1.0,   0.0 ; "corner_miss2")]
    fn only_misses(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, origin_pos: f32) {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());
        let b_simd = WorldBox8::from_boxes(&[b; 8]);

        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        let temp_r = TraceRay::new(p, d);
        let origin = temp_r.point_at(origin_pos);
        let r = TraceRay::new(origin, d);

        let result = simd_result_to_scalar(b_simd.intersect(&r.splat()));

        assert!(result == None);
    }

    fn point_is_on_box_surface(p: &WorldPoint, b: &WorldBox) -> bool {
        const TOLERANCE: f32 = 1e-3;

        // Check if point is within the box's bounds (inclusive, with tolerance)
        let inside_x = p.x >= b.min.x - TOLERANCE && p.x <= b.max.x + TOLERANCE;
        let inside_y = p.y >= b.min.y - TOLERANCE && p.y <= b.max.y + TOLERANCE;
        let inside_z = p.z >= b.min.z - TOLERANCE && p.z <= b.max.z + TOLERANCE;

        if !(inside_x && inside_y && inside_z) {
            return false; // outside the box entirely
        }

        // Check if the point lies on any of the six faces (within tolerance)
        let on_x_face = (p.x - b.min.x).abs() <= TOLERANCE || (p.x - b.max.x).abs() <= TOLERANCE;
        let on_y_face = (p.y - b.min.y).abs() <= TOLERANCE || (p.y - b.max.y).abs() <= TOLERANCE;
        let on_z_face = (p.z - b.min.z).abs() <= TOLERANCE || (p.z - b.max.z).abs() <= TOLERANCE;

        on_x_face || on_y_face || on_z_face
    }
}
