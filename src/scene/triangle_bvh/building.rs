use std::array;

use crate::{
    geometry::{LaneVector as _, Triangle, WorldBox, WorldBox8, WorldPoint, WorldVector8},
    util::simd::{lane_mask, simd_windows},
};

use index_vec::IndexVec;
use itertools::Itertools as _;
use morton_encoding::morton_encode;

use super::{
    CompressedNodeLink, INNER_NODE_CHILDREN, InnerNode, LEAF_NODE_MAX_TRIANGLES,
    LEAF_NODE_PACKET_SIZE, TriangleBvh, TrianglePack, TriangleRef,
};

/// Triangle input for the hierarchy builder.
#[derive(Copy, Clone, Debug)]
pub struct BuildTriangle {
    pub vertices: Triangle<WorldPoint>,
    pub reference: TriangleRef,
}

impl TriangleBvh {
    /// Builds the hierarchy. Leaves hold at most `max_leaf_triangles` triangles,
    /// which must be between 1 and `LEAF_NODE_MAX_TRIANGLES`.
    pub fn build(mut triangles: Vec<BuildTriangle>, max_leaf_triangles: usize) -> TriangleBvh {
        assert!((1..=LEAF_NODE_MAX_TRIANGLES).contains(&max_leaf_triangles));

        let mut bvh = TriangleBvh {
            bounding_box: WorldBox::from_points(vertices_iter(&triangles)),
            root: CompressedNodeLink::NULL,

            inner_nodes: IndexVec::new(),
            triangle_geometry: IndexVec::new(),
            triangle_refs: IndexVec::new(),
        };

        morton_sort(&mut triangles);
        bvh.root = bvh.build_recursive(&mut triangles, max_leaf_triangles);

        bvh
    }

    fn build_recursive(
        &mut self,
        triangles: &mut [BuildTriangle],
        max_leaf_triangles: usize,
    ) -> CompressedNodeLink {
        if triangles.is_empty() {
            CompressedNodeLink::NULL
        } else if triangles.len() <= max_leaf_triangles {
            self.build_leaf(triangles)
        } else {
            self.build_inner_node(triangles, max_leaf_triangles)
        }
    }

    fn build_inner_node(
        &mut self,
        triangles: &mut [BuildTriangle],
        max_leaf_triangles: usize,
    ) -> CompressedNodeLink {
        let split_indices = split_triangles(triangles);

        // Create placeholder node that will be overwriten later
        self.inner_nodes.push(InnerNode::default());
        let node_index = self.inner_nodes.last_idx();

        let mut child_boxes = [WorldBox::default(); INNER_NODE_CHILDREN];
        for (i, (index1, index2)) in split_indices.iter().tuple_windows().enumerate() {
            let child_triangles = &triangles[*index1..*index2];
            if let Some(child_box) = WorldBox::from_points(vertices_iter(child_triangles)) {
                child_boxes[i] = child_box;
            }
        }

        // Insert the children
        let child_links = array::from_fn(|i| {
            let triangles = &mut triangles[split_indices[i]..split_indices[i + 1]];
            self.build_recursive(triangles, max_leaf_triangles)
        });

        // Replace the placeholder with an actual inner node
        self.inner_nodes[node_index] = InnerNode {
            child_bounds: WorldBox8::from_boxes(&child_boxes),
            child_links,
        };

        CompressedNodeLink::inner(node_index)
    }

    fn build_leaf(&mut self, triangles: &[BuildTriangle]) -> CompressedNodeLink {
        assert!(!triangles.is_empty());
        let packet_count = triangles.len().div_ceil(LEAF_NODE_PACKET_SIZE);

        let link =
            CompressedNodeLink::leaf(self.triangle_geometry.next_idx(), packet_count as u32);

        for window in simd_windows(triangles.iter()) {
            // Padding lanes repeat the last triangle and are masked out
            let lane = |i: usize| window[i.min(window.len() - 1)];
            let vertex = |v: usize| WorldVector8::from_lanes(|i| lane(i).vertices[v].coords);

            self.triangle_geometry.push(TrianglePack {
                triangles: Triangle::new(vertex(0), vertex(1), vertex(2)),
                lane_mask: lane_mask(window.len()),
            });
            self.triangle_refs.extend(
                (0..LEAF_NODE_PACKET_SIZE)
                    .map(|i| window.get(i).map(|t| t.reference).unwrap_or_default()),
            );
        }

        link
    }
}

fn morton_sort(triangles: &mut [BuildTriangle]) {
    const GRID_BITS: u32 = 10;

    let Some(bounds) = WorldBox::from_points(triangles.iter().map(|t| t.vertices.centroid()))
    else {
        return;
    };
    let min = bounds.min;
    let grid_max = ((1u32 << GRID_BITS) - 1) as f32;
    let scale = bounds
        .size()
        .map(|x| if x > 0.0 { grid_max / x } else { 0.0 });

    triangles.sort_by_cached_key(|triangle| {
        let grid_coordinates: [u32; 3] = (triangle.vertices.centroid() - min)
            .component_mul(&scale)
            .map(|x| x.round() as u32)
            .into();

        morton_encode(grid_coordinates)
    });
}

/// Iterates over vertices of the triangles
fn vertices_iter(triangles: &[BuildTriangle]) -> impl Iterator<Item = WorldPoint> + '_ {
    triangles.iter().flat_map(|t| t.vertices.iter().copied())
}

/// Return an array of indices in the triangle array, where the
/// output bins should be split. Array is one larger than INNER_NODE_CHILDREN, first item is always 0,
/// last item is always triangles.len().
fn split_triangles(triangles: &[BuildTriangle]) -> [usize; INNER_NODE_CHILDREN + 1] {
    array::from_fn::<_, { INNER_NODE_CHILDREN + 1 }, _>(|i| {
        i * triangles.len() / INNER_NODE_CHILDREN
    })
}
