mod building;
mod ray_bvh_intersection;
mod statistics;

use crate::geometry::{SIMD_LANES, Triangle, WorldBox, WorldBox8, WorldVector8};

use index_vec::IndexVec;

pub use building::BuildTriangle;
pub use ray_bvh_intersection::{BvhHit, StackCache};
pub use statistics::BvhStatistics;
pub use crate::util::Stats;

const INNER_NODE_CHILDREN: usize = 8;
const LEAF_NODE_PACKET_SIZE: usize = SIMD_LANES;

/// Largest number of triangles a single leaf can reference.
pub const LEAF_NODE_MAX_TRIANGLES: usize =
    LEAF_NODE_PACKET_SIZE * CompressedNodeLink::MAX_COUNT as usize;

/// Bounding volume hierarchy over the triangles of all geometries in a scene.
/// Immutable once built, safe to query from many threads.
#[derive(Clone, Debug)]
pub struct TriangleBvh {
    bounding_box: Option<WorldBox>,
    root: CompressedNodeLink,

    inner_nodes: IndexVec<InnerNodeIdx, InnerNode>,

    triangle_geometry: IndexVec<TrianglePackIdx, TrianglePack>,
    triangle_refs: IndexVec<TriangleIdx, TriangleRef>,
}

#[derive(Clone, Debug, Default)]
struct InnerNode {
    child_bounds: WorldBox8,
    child_links: [CompressedNodeLink; INNER_NODE_CHILDREN],
}

/// Eight triangles stored lane-wise. Lanes outside `lane_mask` are padding.
#[derive(Clone, Debug)]
struct TrianglePack {
    triangles: Triangle<WorldVector8>,
    lane_mask: u64,
}

/// Identifies the source of a triangle: geometry id and the primitive index within it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriangleRef {
    pub geometry: u32,
    pub primitive: u32,
}

impl Default for TriangleRef {
    fn default() -> Self {
        TriangleRef {
            geometry: u32::MAX,
            primitive: u32::MAX,
        }
    }
}

/// Child reference packed into 32 bits.
/// The upper bits hold a node or pack index, the lowest three the number of triangle packs in a
/// leaf. Inner nodes have a count of zero, all ones in the index part is the null link.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
struct CompressedNodeLink(u32);

#[derive(Clone, Debug, PartialEq, Eq)]
enum NodeLink {
    Null,
    Inner { index: InnerNodeIdx },
    Leaf { packs: PackRange },
}

impl CompressedNodeLink {
    const COUNT_BITS: u32 = 3;

    pub const MAX_COUNT: u32 = (1 << Self::COUNT_BITS) - 1;
    pub const MAX_INDEX: u32 = (u32::MAX >> Self::COUNT_BITS) - 1;
    pub const NULL: Self = Self(!Self::MAX_COUNT);

    fn pack(index: u32, count: u32) -> Self {
        assert!(index <= Self::MAX_INDEX, "node index {index} out of range");
        Self((index << Self::COUNT_BITS) | count)
    }

    /// Leaf made of `count` consecutive triangle packs. Panics if count is not in 1..=MAX_COUNT.
    fn leaf(first: TrianglePackIdx, count: u32) -> Self {
        assert!(
            (1..=Self::MAX_COUNT).contains(&count),
            "leaf pack count {count} out of range"
        );
        Self::pack(first.raw(), count)
    }

    fn inner(index: InnerNodeIdx) -> Self {
        Self::pack(index.raw(), 0)
    }

    fn decode(self) -> NodeLink {
        let index = self.0 >> Self::COUNT_BITS;
        match self.0 & Self::MAX_COUNT {
            _ if self.is_null() => NodeLink::Null,
            0 => NodeLink::Inner {
                index: InnerNodeIdx::from_raw_unchecked(index),
            },
            count => NodeLink::Leaf {
                packs: PackRange {
                    first: TrianglePackIdx::from_raw_unchecked(index),
                    count,
                },
            },
        }
    }

    fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl Default for CompressedNodeLink {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Debug for CompressedNodeLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.decode())
    }
}

index_vec::define_index_type! {
    struct InnerNodeIdx = u32;
    MAX_INDEX = CompressedNodeLink::MAX_INDEX as usize;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    struct TrianglePackIdx = u32;
    MAX_INDEX = CompressedNodeLink::MAX_INDEX as usize;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    struct TriangleIdx = usize;
    MAX_INDEX = usize::MAX - 1;
    DEFAULT = TriangleIdx::from_raw_unchecked(usize::MAX);
}

impl TrianglePackIdx {
    /// Index of the triangle stored in the given lane of this pack.
    fn to_triangle_idx(self, lane: usize) -> TriangleIdx {
        TriangleIdx::from_usize(self.index() * LEAF_NODE_PACKET_SIZE + lane)
    }
}

/// Consecutive triangle packs of a leaf.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct PackRange {
    first: TrianglePackIdx,
    count: u32,
}

impl PackRange {
    fn as_range(self) -> std::ops::Range<TrianglePackIdx> {
        self.first..self.first + self.count as usize
    }

    fn iter(self) -> impl Iterator<Item = TrianglePackIdx> {
        (0..self.count as usize).map(move |offset| self.first + offset)
    }
}

impl TriangleBvh {
    /// Box around all triangles, None for an empty hierarchy.
    pub fn bounding_box(&self) -> Option<WorldBox> {
        self.bounding_box
    }

    /// Number of real (non-padding) triangles stored in the leaves.
    pub fn triangle_count(&self) -> usize {
        self.triangle_geometry
            .iter()
            .map(|pack| pack.lane_mask.count_ones() as usize)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};
    use test_strategy::proptest;

    #[proptest]
    fn node_link_construction_leaf(
        #[strategy(0u32..=CompressedNodeLink::MAX_INDEX)] index: u32,
        #[strategy(1u32..=CompressedNodeLink::MAX_COUNT)] count: u32,
    ) {
        let link = CompressedNodeLink::leaf(index.into(), count);
        let_assert!(NodeLink::Leaf { packs } = link.decode());
        assert!(packs.first.raw() == index);
        assert!(packs.iter().count() == count as usize);
        assert!(packs.iter().last() == Some(packs.as_range().end - 1));
    }

    #[proptest]
    fn node_link_construction_inner(#[strategy(0u32..=CompressedNodeLink::MAX_INDEX)] index: u32) {
        let link = CompressedNodeLink::inner(index.into());
        let_assert!(NodeLink::Inner { index: decoded } = link.decode());
        assert!(decoded.raw() == index);
    }

    #[test]
    fn node_link_construction_null() {
        assert!(CompressedNodeLink::NULL.decode() == NodeLink::Null);
        assert!(CompressedNodeLink::default().is_null());
    }

    #[test]
    #[should_panic]
    fn node_link_invalid_leaf_packet_count_zero() {
        CompressedNodeLink::leaf(0u32.into(), 0);
    }

    #[test]
    #[should_panic]
    fn node_link_invalid_leaf_packet_count_too_high() {
        CompressedNodeLink::leaf(0u32.into(), CompressedNodeLink::MAX_COUNT + 1);
    }

    #[test]
    #[should_panic]
    fn node_link_leaf_index_out_of_range() {
        CompressedNodeLink::leaf((CompressedNodeLink::MAX_INDEX + 1).into(), 1);
    }

    #[test]
    fn pack_index_to_triangle_index() {
        let pack = TrianglePackIdx::from_raw(3);
        assert!(pack.to_triangle_idx(5).raw() == 3 * LEAF_NODE_PACKET_SIZE + 5);
    }

    #[test]
    fn leaf_capacity() {
        assert!(LEAF_NODE_MAX_TRIANGLES == 56);
    }
}
