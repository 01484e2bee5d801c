use std::cmp::Reverse;

use arrayvec::ArrayVec;
use assert2::debug_assert;
use ordered_float::OrderedFloat;
use simba::simd::{SimdPartialOrd as _, SimdValue as _};

use super::{
    CompressedNodeLink, INNER_NODE_CHILDREN, InnerNode, NodeLink, TriangleBvh, TriangleIdx,
    PackRange, TriangleRef,
};
use crate::{
    geometry::{BarycentricCoordinates, FloatType, SimdFloatType, TraceRay, TraceRay8},
    util::{set_lanes, simd::move_mask},
};

/// Traversal stack, kept between queries to avoid reallocating.
/// Entries are node links with the distance at which the ray enters the node.
#[derive(Clone, Debug, Default)]
#[repr(transparent)]
pub struct StackCache {
    stack: Vec<(CompressedNodeLink, FloatType)>,
}

/// Nearest intersection found in the hierarchy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BvhHit {
    pub t: FloatType,
    pub uv: BarycentricCoordinates<FloatType>,
    pub triangle: TriangleRef,
}

impl TriangleBvh {
    /// Finds the nearest triangle hit with distance at least `min_t`.
    pub fn intersect(
        &self,
        ray: &TraceRay,
        min_t: FloatType,
        stack: &mut StackCache,
    ) -> Option<BvhHit> {
        if self.root.is_null() {
            return None;
        }

        let ray = ray.splat();

        debug_assert!(stack.stack.is_empty());
        stack.stack.push((self.root, min_t));

        let mut best = LeafHitRecord {
            t: FloatType::INFINITY,
            ..LeafHitRecord::default()
        };

        while let Some((link, node_t1)) = stack.stack.pop() {
            if node_t1 > best.t {
                // If the node's minimum intersection distance is further away than the best
                // hit found so far, the node can't do any good any more and we can skip it.
                continue;
            }

            match link.decode() {
                NodeLink::Null => continue,
                NodeLink::Inner { index } => {
                    self.inner_nodes[index].push_children(&ray, min_t, best.t, &mut stack.stack);
                }
                NodeLink::Leaf { packs } => {
                    let hit = self.intersect_triangles(packs, &ray, min_t, best.t);

                    if hit.t < best.t {
                        best = hit;
                    }
                }
            }
        }

        if best.triangle_index == TriangleIdx::default() {
            None
        } else {
            Some(BvhHit {
                t: best.t,
                uv: best.uv,
                triangle: self.triangle_refs[best.triangle_index],
            })
        }
    }

    /// Returns true if any triangle is hit at a distance in `[min_t, max_t)`.
    /// Stops at the first hit found, which need not be the nearest.
    pub fn occluded(
        &self,
        ray: &TraceRay,
        min_t: FloatType,
        max_t: FloatType,
        stack: &mut StackCache,
    ) -> bool {
        if self.root.is_null() {
            return false;
        }

        let ray = ray.splat();

        debug_assert!(stack.stack.is_empty());
        stack.stack.push((self.root, min_t));

        while let Some((link, _node_t1)) = stack.stack.pop() {
            match link.decode() {
                NodeLink::Null => continue,
                NodeLink::Inner { index } => {
                    self.inner_nodes[index].push_children(&ray, min_t, max_t, &mut stack.stack);
                }
                NodeLink::Leaf { packs } => {
                    if self.any_triangle_hit(packs, &ray, min_t, max_t) {
                        stack.stack.clear();
                        return true;
                    }
                }
            }
        }

        false
    }

    fn intersect_triangles(
        &self,
        packs: PackRange,
        ray: &TraceRay8,
        min_t: FloatType,
        max_t: FloatType,
    ) -> LeafHitRecord {
        let min_t = SimdFloatType::splat(min_t);
        let max_t = SimdFloatType::splat(max_t);

        let mut best = LeafHitRecord {
            t: FloatType::INFINITY,
            ..LeafHitRecord::default()
        };

        for (j, pack) in packs
            .iter()
            .zip(self.triangle_geometry[packs.as_range()].iter())
        {
            let (mask, t, uv) = pack.triangles.intersect(ray);

            let mask = move_mask(mask & t.simd_ge(min_t) & t.simd_lt(max_t)) & pack.lane_mask;

            for i in set_lanes(mask) {
                let t = t.extract(i);
                if t < best.t {
                    best.t = t;
                    best.triangle_index = j.to_triangle_idx(i);
                    best.uv = uv.extract(i);
                }
            }
        }

        best
    }

    fn any_triangle_hit(
        &self,
        packs: PackRange,
        ray: &TraceRay8,
        min_t: FloatType,
        max_t: FloatType,
    ) -> bool {
        let min_t = SimdFloatType::splat(min_t);
        let max_t = SimdFloatType::splat(max_t);

        self.triangle_geometry[packs.as_range()]
            .iter()
            .any(|pack| {
                let (mask, t, _uv) = pack.triangles.intersect(ray);
                move_mask(mask & t.simd_ge(min_t) & t.simd_lt(max_t)) & pack.lane_mask != 0
            })
    }
}

impl InnerNode {
    /// Intersect this inner node with a ray and push the intersected children
    /// on the stack, farthest first, so that the nearest child is popped next.
    /// Only children whose intersection overlaps `[min_t, max_t]` are pushed.
    fn push_children(
        &self,
        ray: &TraceRay8,
        min_t: FloatType,
        max_t: FloatType,
        stack: &mut Vec<(CompressedNodeLink, FloatType)>,
    ) {
        let (t1, t2) = self.child_bounds.intersect(ray);
        let t1 = t1.simd_max(SimdFloatType::splat(min_t));
        let t2 = t2.simd_min(SimdFloatType::splat(max_t));
        let mask = move_mask(t1.simd_le(t2));

        let mut children: ArrayVec<_, INNER_NODE_CHILDREN> = set_lanes(mask)
            .map(|i| (self.child_links[i], t1.extract(i)))
            .filter(|(link, _)| !link.is_null())
            .collect();
        children.sort_unstable_by_key(|(_, t)| Reverse(OrderedFloat(*t)));

        stack.extend(children);
    }
}

#[derive(Clone, Debug, Default)]
struct LeafHitRecord {
    t: FloatType,
    uv: BarycentricCoordinates<FloatType>,
    triangle_index: TriangleIdx,
}
