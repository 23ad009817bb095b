//! SAH-partitioned bounding volume tree.
//!
//! Every node is either empty, a leaf holding exactly one object, or an
//! internal node with two children. Nodes live in one arena and refer to
//! their children by index; leaves refer into the object slice the tree was
//! built over, which the caller passes back in for every query.
//!
//! Construction tries all three axes, sorting by either the box minimum or
//! the box maximum, and evaluates the surface area heuristic at every split
//! position of each ordering:
//!
//! ```text
//! cost(j) = j * area(objects[..j]) + (n - j) * area(objects[j..])
//! ```
//!
//! The cheapest `(axis, key, j)` wins. When even the cheapest split is no
//! better than `n * area(objects)`, as with coincident boxes, the node is
//! split at the median of that ordering instead.

use std::cmp::Ordering;

use sable_math::{Aabb, Interval, Ray};

use crate::intersection::{Intersection, RayType};
use crate::object::TraceObject;

/// Relative slack when comparing the best split against the unsplit cost.
const LEAF_COST_TOLERANCE: f32 = 1e-5;

/// Which face of the box an ordering sorts by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Min,
    Max,
}

const SORTINGS: [(usize, SortKey); 6] = [
    (0, SortKey::Min),
    (0, SortKey::Max),
    (1, SortKey::Min),
    (1, SortKey::Max),
    (2, SortKey::Min),
    (2, SortKey::Max),
];

/// The split an internal node was built with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitChoice {
    pub axis: usize,
    pub key: SortKey,
    /// Number of objects that went to the left child
    pub index: usize,
    pub cost: f32,
}

#[derive(Clone, Debug)]
pub enum TreeNode {
    /// Tree over no objects; never hit
    Empty,
    Leaf {
        object: usize,
        bbox: Aabb,
    },
    Internal {
        left: usize,
        right: usize,
        bbox: Aabb,
        split: SplitChoice,
    },
}

impl TreeNode {
    pub fn bbox(&self) -> Aabb {
        match self {
            TreeNode::Empty => Aabb::EMPTY,
            TreeNode::Leaf { bbox, .. } | TreeNode::Internal { bbox, .. } => *bbox,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    object: usize,
    bbox: Aabb,
}

impl Entry {
    fn key(&self, axis: usize, key: SortKey) -> f32 {
        let interval = self.bbox.axis_interval(axis);
        match key {
            SortKey::Min => interval.min,
            SortKey::Max => interval.max,
        }
    }
}

/// Orders by the chosen face, then by object index so that re-sorting
/// reproduces an evaluated order exactly.
fn sort_entries(entries: &mut [Entry], axis: usize, key: SortKey) {
    entries.sort_by(|a, b| {
        a.key(axis, key)
            .total_cmp(&b.key(axis, key))
            .then(a.object.cmp(&b.object))
    });
}

/// SAH cost of splitting after the first `j` entries, for `j` in `1..n`.
/// Element `j - 1` holds `cost(j)`.
fn split_costs(entries: &[Entry]) -> Vec<f32> {
    let n = entries.len();
    let mut right_area = vec![0.0; n];
    let mut right = Aabb::EMPTY;
    for j in (1..n).rev() {
        right += entries[j].bbox;
        right_area[j] = right.surface_area();
    }

    let mut left = Aabb::EMPTY;
    let mut costs = Vec::with_capacity(n.saturating_sub(1));
    for j in 1..n {
        left += entries[j - 1].bbox;
        costs.push(j as f32 * left.surface_area() + (n - j) as f32 * right_area[j]);
    }
    costs
}

#[derive(Clone, Debug)]
pub struct TreeBox {
    nodes: Vec<TreeNode>,
    root: usize,
}

impl TreeBox {
    /// Build over every object in `objects` that has a bounding box.
    pub fn new(objects: &[TraceObject]) -> Self {
        let mut entries: Vec<Entry> = objects
            .iter()
            .enumerate()
            .filter_map(|(object, o)| o.world_bbox().map(|bbox| Entry { object, bbox }))
            .collect();
        debug_assert_eq!(entries.len(), objects.len(), "unbounded object passed to TreeBox");

        let mut tree = Self {
            nodes: Vec::with_capacity(entries.len().max(1) * 2),
            root: 0,
        };
        if entries.is_empty() {
            tree.nodes.push(TreeNode::Empty);
        } else {
            tree.root = tree.build(&mut entries);
        }

        log::debug!(
            "TreeBox: {} objects, {} nodes, depth {}",
            objects.len(),
            tree.node_count(),
            tree.depth()
        );
        tree
    }

    /// Tree that never reports a hit.
    pub fn empty() -> Self {
        Self {
            nodes: vec![TreeNode::Empty],
            root: 0,
        }
    }

    fn build(&mut self, entries: &mut [Entry]) -> usize {
        let n = entries.len();
        if n == 1 {
            self.nodes.push(TreeNode::Leaf {
                object: entries[0].object,
                bbox: entries[0].bbox,
            });
            return self.nodes.len() - 1;
        }

        let mut best = SplitChoice {
            axis: 0,
            key: SortKey::Min,
            index: n / 2,
            cost: f32::INFINITY,
        };
        for (axis, key) in SORTINGS {
            sort_entries(entries, axis, key);
            for (i, cost) in split_costs(entries).into_iter().enumerate() {
                if cost < best.cost {
                    best = SplitChoice {
                        axis,
                        key,
                        index: i + 1,
                        cost,
                    };
                }
            }
        }

        // The slice is still in the last evaluated order.
        if (best.axis, best.key) != SORTINGS[SORTINGS.len() - 1] {
            sort_entries(entries, best.axis, best.key);
        }

        // No split beats keeping everything together, e.g. coincident
        // boxes. Every candidate costs the same, so split at the median to
        // keep the tree balanced.
        let total = entries.iter().fold(Aabb::EMPTY, |mut acc, e| {
            acc += e.bbox;
            acc
        });
        if best.cost >= n as f32 * total.surface_area() * (1.0 - LEAF_COST_TOLERANCE) {
            let index = n / 2;
            best = SplitChoice {
                index,
                cost: split_costs(entries)[index - 1],
                ..best
            };
        }

        let (left_entries, right_entries) = entries.split_at_mut(best.index);
        let left = self.build(left_entries);
        let right = self.build(right_entries);

        let mut bbox = self.nodes[left].bbox();
        bbox += self.nodes[right].bbox();
        self.nodes.push(TreeNode::Internal {
            left,
            right,
            bbox,
            split: best,
        });
        self.nodes.len() - 1
    }

    /// Nearest hit within `ray_t` among the objects visible to `ray_type`.
    /// `objects` must be the slice the tree was built over.
    pub fn intersect<'a>(
        &self,
        objects: &'a [TraceObject],
        ray: &Ray,
        ray_t: Interval,
        ray_type: RayType,
        hit: &mut Intersection<'a>,
    ) -> bool {
        if self.bbox().intersect(ray, ray_t).is_none() {
            return false;
        }
        self.fast_intersect(self.root, objects, ray, ray_t, ray_type, hit)
    }

    /// Traversal below a node whose box is already known to be hit.
    fn fast_intersect<'a>(
        &self,
        node: usize,
        objects: &'a [TraceObject],
        ray: &Ray,
        ray_t: Interval,
        ray_type: RayType,
        hit: &mut Intersection<'a>,
    ) -> bool {
        match &self.nodes[node] {
            TreeNode::Empty => false,
            TreeNode::Leaf { object, .. } => {
                let object = &objects[*object];
                object.visible_to(ray_type) && object.intersect(ray, ray_t, hit)
            }
            TreeNode::Internal { left, right, .. } => {
                let left_t = self.nodes[*left].bbox().intersect(ray, ray_t);
                let right_t = self.nodes[*right].bbox().intersect(ray, ray_t);

                match (left_t, right_t) {
                    (None, None) => false,
                    (Some(_), None) => self.fast_intersect(*left, objects, ray, ray_t, ray_type, hit),
                    (None, Some(_)) => self.fast_intersect(*right, objects, ray, ray_t, ray_type, hit),
                    (Some(lt), Some(rt)) => {
                        let (near, far, far_t) = match lt.partial_cmp(&rt) {
                            Some(Ordering::Greater) => (*right, *left, lt),
                            _ => (*left, *right, rt),
                        };

                        let found = self.fast_intersect(near, objects, ray, ray_t, ray_type, hit);
                        if !found {
                            return self.fast_intersect(far, objects, ray, ray_t, ray_type, hit);
                        }
                        // Anything in the far box starts at far_t or later.
                        if hit.t > far_t {
                            self.fast_intersect(far, objects, ray, ray_t.with_max(hit.t), ray_type, hit);
                        }
                        true
                    }
                }
            }
        }
    }

    pub fn bbox(&self) -> Aabb {
        self.nodes[self.root].bbox()
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[self.root]
    }

    /// Split chosen at the root, if the root is an internal node.
    pub fn root_split(&self) -> Option<SplitChoice> {
        match self.root() {
            TreeNode::Internal { split, .. } => Some(*split),
            _ => None,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.root(), TreeNode::Empty)
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.depth_below(self.root)
    }

    fn depth_below(&self, node: usize) -> usize {
        match &self.nodes[node] {
            TreeNode::Empty => 0,
            TreeNode::Leaf { .. } => 1,
            TreeNode::Internal { left, right, .. } => {
                1 + self.depth_below(*left).max(self.depth_below(*right))
            }
        }
    }
}
