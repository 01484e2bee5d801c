use std::fmt::Display;

use crate::util::Stats;

use super::{CompressedNodeLink, NodeLink, TriangleBvh};

/// Shape of a built hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct BvhStatistics {
    /// Depth of leaves, counted in inner nodes above them plus one.
    pub depth: Stats,
    /// Non-empty children per inner node.
    pub inner_node_fill: Stats,
    /// Triangles per leaf.
    pub leaf_fill: Stats,
}

impl TriangleBvh {
    pub fn statistics(&self) -> BvhStatistics {
        let mut leaf_fill = Stats::default();
        let depth = self.statistics_recursive(self.root, &mut leaf_fill);

        let inner_node_fill = self
            .inner_nodes
            .iter()
            .map(|node| {
                node.child_links
                    .iter()
                    .filter(|link| !link.is_null())
                    .count()
            })
            .collect();

        BvhStatistics {
            depth,
            inner_node_fill,
            leaf_fill,
        }
    }

    /// Returns depth statistics of leaves under the link and collects leaf fill on the way.
    fn statistics_recursive(&self, link: CompressedNodeLink, leaf_fill: &mut Stats) -> Stats {
        match link.decode() {
            NodeLink::Null => Stats::default(),
            NodeLink::Leaf { packs } => {
                leaf_fill.add(
                    self.triangle_geometry[packs.as_range()]
                        .iter()
                        .map(|pack| pack.lane_mask.count_ones() as usize)
                        .sum(),
                );
                Stats::single(1)
            }
            NodeLink::Inner { index } => self.inner_nodes[index]
                .child_links
                .iter()
                .map(|child| self.statistics_recursive(*child, leaf_fill))
                .collect::<Stats>()
                .shifted(1),
        }
    }
}

impl Display for BvhStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "depth: {}; inner node child count: {}; leaf fill: {}",
            self.depth, self.inner_node_fill, self.leaf_fill
        )
    }
}
