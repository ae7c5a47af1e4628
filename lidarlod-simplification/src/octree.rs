//! Fixed-depth octree over a bounding box
//!
//! The tree is complete: every node above `granularity` has exactly eight
//! children. Nodes live in one arena in breadth-first order, so the children
//! of node `i` are `8i + 1 ..= 8i + 8` and only a traversal counter is stored
//! per node. Point buffers exist only for leaves that received points.

use crate::PointSimplifier;
use lidarlod_core::{Aabb, Error, LodPoint, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;

/// Index of a node in the arena
pub type NodeId = usize;

/// Deepest granularity accepted by [`Octree::new`]
pub const MAX_GRANULARITY: u32 = 9;

/// Snapshot of one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeNode {
    pub id: NodeId,
    pub bounds: Aabb,
    pub depth: u32,
    /// Points that passed through this node during insertion
    pub count: u32,
    pub children: Option<[NodeId; 8]>,
}

impl OctreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Point-bucketing octree with k-means leaf simplification.
#[derive(Debug, Clone)]
pub struct Octree {
    bounds: Aabb,
    granularity: u32,
    counts: Vec<u32>,
    /// Populated leaves in first-population order
    leaves: Vec<NodeId>,
    /// Buffers aligned with `leaves`
    buffers: Vec<Vec<LodPoint>>,
    slots: HashMap<NodeId, usize>,
    stray_points: usize,
    max_alpha: f64,
}

impl Octree {
    /// Build the complete tree of `(8^(granularity+1) - 1) / 7` nodes.
    pub fn new(granularity: u32, bounds: Aabb) -> Result<Self> {
        if granularity > MAX_GRANULARITY {
            return Err(Error::InvalidData(format!(
                "octree granularity {} exceeds the maximum of {}",
                granularity, MAX_GRANULARITY
            )));
        }

        let node_count = level_start(granularity + 1);
        log::debug!("octree granularity {} with {} nodes", granularity, node_count);

        Ok(Self {
            bounds,
            granularity,
            counts: vec![0; node_count],
            leaves: Vec::new(),
            buffers: Vec::new(),
            slots: HashMap::new(),
            stray_points: 0,
            max_alpha: 0.0,
        })
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn node_count(&self) -> usize {
        self.counts.len()
    }

    pub fn root(&self) -> OctreeNode {
        self.snapshot(0, self.bounds, 0)
    }

    /// Snapshot of node `id`, if it exists
    pub fn node(&self, id: NodeId) -> Option<OctreeNode> {
        if id >= self.counts.len() {
            return None;
        }

        // Walk up to the root, then replay the child choices downwards
        let mut path = Vec::with_capacity(self.granularity as usize);
        let mut cursor = id;
        while let Some(parent) = parent_of(cursor) {
            path.push(cursor - first_child(parent));
            cursor = parent;
        }

        let mut bounds = self.bounds;
        for &octant in path.iter().rev() {
            bounds = bounds.octants()[octant];
        }
        Some(self.snapshot(id, bounds, path.len() as u32))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        if id >= self.counts.len() {
            return None;
        }
        parent_of(id)
    }

    /// Populated leaf ids in the order they first received a point
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Stored points of a populated leaf
    pub fn leaf_points(&self, id: NodeId) -> Option<&[LodPoint]> {
        self.slots.get(&id).map(|&slot| self.buffers[slot].as_slice())
    }

    /// Points currently held across all leaves
    pub fn leaf_point_count(&self) -> usize {
        self.buffers.iter().map(Vec::len).sum()
    }

    /// Points that matched no child during descent
    pub fn stray_points(&self) -> usize {
        self.stray_points
    }

    /// Largest alpha seen on insertion
    pub fn max_alpha(&self) -> f64 {
        self.max_alpha
    }

    fn snapshot(&self, id: NodeId, bounds: Aabb, depth: u32) -> OctreeNode {
        let children = (depth < self.granularity).then(|| {
            let first = first_child(id);
            std::array::from_fn(|i| first + i)
        });
        OctreeNode {
            id,
            bounds,
            depth,
            count: self.counts[id],
            children,
        }
    }

    // ============================================================
    // Insertion
    // ============================================================

    /// Route a point to its leaf.
    ///
    /// Every visited node's counter is incremented. Descent follows the first
    /// child, in [`Aabb::octants`] order, whose inclusive box contains the
    /// point. A point that matches no child stops where it is and is not
    /// stored.
    pub fn insert(&mut self, point: LodPoint) {
        self.max_alpha = self.max_alpha.max(point.alpha);
        let position = point.position();

        let mut id = 0;
        let mut bounds = self.bounds;
        let mut depth = 0;

        loop {
            self.counts[id] = self.counts[id].saturating_add(1);

            if depth == self.granularity {
                let slot = match self.slots.get(&id) {
                    Some(&slot) => slot,
                    None => {
                        self.leaves.push(id);
                        self.buffers.push(Vec::new());
                        self.slots.insert(id, self.buffers.len() - 1);
                        self.buffers.len() - 1
                    }
                };
                self.buffers[slot].push(point);
                return;
            }

            let octants = bounds.octants();
            match octants.iter().position(|child| child.contains(&position)) {
                Some(octant) => {
                    id = first_child(id) + octant;
                    bounds = octants[octant];
                    depth += 1;
                }
                None => {
                    self.stray_points += 1;
                    log::debug!(
                        "point ({}, {}, {}) left the tree at depth {}",
                        position.x,
                        position.y,
                        position.z,
                        depth
                    );
                    return;
                }
            }
        }
    }

    // ============================================================
    // Extraction
    // ============================================================

    /// Lazily walk populated leaves depth-first and yield their points.
    ///
    /// Subtrees whose counter is zero are skipped. The walk holds no state in
    /// the tree, so it can be restarted at any time.
    pub fn points(&self) -> Points<'_> {
        let stack = if self.counts[0] > 0 { vec![(0, 0)] } else { Vec::new() };
        Points {
            tree: self,
            stack,
            current: [].iter(),
        }
    }

    /// Collect [`Octree::points`] into a vector
    pub fn collect_points(&self) -> Vec<LodPoint> {
        let mut out = Vec::with_capacity(self.leaf_point_count());
        out.extend(self.points());
        out
    }

    // ============================================================
    // Simplification
    // ============================================================

    /// Replace every populated leaf's points with the simplifier's output.
    pub fn simplify<S, R>(&mut self, simplifier: &S, rng: &mut R) -> Result<()>
    where
        S: PointSimplifier + ?Sized,
        R: RngCore,
    {
        for buffer in self.buffers.iter_mut() {
            let simplified = simplifier.simplify_points(buffer, &mut *rng)?;
            *buffer = simplified;
        }
        Ok(())
    }

    /// Like [`Octree::simplify`], with leaves processed in parallel.
    ///
    /// Each leaf draws from its own generator seeded from `seed` and the leaf
    /// id, so the result does not depend on scheduling.
    pub fn simplify_parallel<S>(&mut self, simplifier: &S, seed: u64) -> Result<()>
    where
        S: PointSimplifier + Sync + ?Sized,
    {
        self.buffers
            .par_iter_mut()
            .zip(self.leaves.par_iter())
            .try_for_each(|(buffer, &leaf)| {
                let mut rng = StdRng::seed_from_u64(leaf_seed(seed, leaf));
                *buffer = simplifier.simplify_points(buffer, &mut rng)?;
                Ok(())
            })
    }
}

/// Per-leaf seed derivation shared by parallel simplification and LOD building
pub(crate) fn leaf_seed(seed: u64, id: NodeId) -> u64 {
    seed ^ (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Id of the first node at `depth`, which is also the node count above it
fn level_start(depth: u32) -> usize {
    (8usize.pow(depth) - 1) / 7
}

fn first_child(id: NodeId) -> NodeId {
    8 * id + 1
}

fn parent_of(id: NodeId) -> Option<NodeId> {
    (id > 0).then(|| (id - 1) / 8)
}

/// Iterator returned by [`Octree::points`]
pub struct Points<'a> {
    tree: &'a Octree,
    /// Pending `(node, depth)` pairs
    stack: Vec<(NodeId, u32)>,
    current: std::slice::Iter<'a, LodPoint>,
}

impl Iterator for Points<'_> {
    type Item = LodPoint;

    fn next(&mut self) -> Option<LodPoint> {
        loop {
            if let Some(point) = self.current.next() {
                return Some(*point);
            }

            let (id, depth) = self.stack.pop()?;
            if depth == self.tree.granularity {
                if let Some(points) = self.tree.leaf_points(id) {
                    self.current = points.iter();
                }
                continue;
            }

            // Push in reverse so child 0 is visited first
            let first = first_child(id);
            for child in (first..first + 8).rev() {
                if self.tree.counts[child] > 0 {
                    self.stack.push((child, depth + 1));
                }
            }
        }
    }
}
