use std::collections::{HashSet, VecDeque};

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entity::{Creature, Entity, EntityId, Food};

/// Which collection a tree entry points back into.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EntityKind {
    Creature,
    Food,
}

/// Lightweight snapshot of one entity, taken when the tree is rebuilt.
/// `index` is the entity's position in its owning collection at that moment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeEntry {
    pub id: EntityId,
    pub kind: EntityKind,
    pub index: usize,
    pub pos: Vec2,
    pub radius: f32,
}

impl TreeEntry {
    pub fn creature(creature: &Creature, index: usize) -> Self {
        Self {
            id: creature.id,
            kind: EntityKind::Creature,
            index,
            pos: creature.pos,
            radius: creature.radius(),
        }
    }

    pub fn food(food: &Food, index: usize) -> Self {
        Self {
            id: food.id,
            kind: EntityKind::Food,
            index,
            pos: food.pos,
            radius: food.radius(),
        }
    }
}

#[derive(Debug)]
struct Node {
    entry: TreeEntry,
    depth: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

type Coordinate = (OrderedFloat<f32>, OrderedFloat<f32>);

/// 2-D alternating-axis tree, rebuilt from scratch every tick and discarded
/// at the end of it. Even depths split on x, odd depths on y.
#[derive(Debug, Default)]
pub struct KdTree {
    root: Option<Box<Node>>,
    pivots: HashSet<Coordinate>,
    len: usize,
}

fn axis_coord(pos: Vec2, axis: usize) -> f32 {
    if axis == 0 {
        pos.x
    } else {
        pos.y
    }
}

/// Inclusive `[lower, upper]` for one axis of a screen-space box: y grows
/// downward, so the y lower bound comes from the bottom-right corner.
fn axis_bounds(axis: usize, top_left: Vec2, bottom_right: Vec2) -> (f32, f32) {
    if axis == 0 {
        (top_left.x, bottom_right.x)
    } else {
        (bottom_right.y, top_left.y)
    }
}

impl KdTree {
    pub fn build(mut entries: Vec<TreeEntry>) -> Self {
        let len = entries.len();
        let mut pivots = HashSet::with_capacity(len);
        let root = Self::build_node(&mut entries, 0, &mut pivots);
        trace!(size = len, "spatial index rebuilt");
        Self { root, pivots, len }
    }

    /// Median split on the active axis. The sort is stable, so equal
    /// coordinates keep their input order and a fixed input always produces
    /// the same tree.
    fn build_node(
        entries: &mut [TreeEntry],
        depth: usize,
        pivots: &mut HashSet<Coordinate>,
    ) -> Option<Box<Node>> {
        if entries.is_empty() {
            return None;
        }

        let axis = depth % 2;
        entries.sort_by(|a, b| axis_coord(a.pos, axis).total_cmp(&axis_coord(b.pos, axis)));

        let middle = entries.len() / 2;
        let (left_half, rest) = entries.split_at_mut(middle);
        let (pivot, right_half) = rest.split_first_mut()?;
        let entry = *pivot;
        pivots.insert((OrderedFloat(entry.pos.x), OrderedFloat(entry.pos.y)));

        let left = Self::build_node(left_half, depth + 1, pivots);
        let right = Self::build_node(right_half, depth + 1, pivots);
        Some(Box::new(Node {
            entry,
            depth,
            left,
            right,
        }))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exact-coordinate membership: true iff `point` equals a pivot recorded
    /// during construction. Every indexed entity becomes the pivot of some
    /// subtree, so this covers the whole entity set. Callers use it to avoid
    /// spawning food onto an occupied coordinate.
    pub fn find(&self, point: Vec2) -> bool {
        self.pivots
            .contains(&(OrderedFloat(point.x), OrderedFloat(point.y)))
    }

    /// Breadth-first box query with inclusive bounds, excluding any entry
    /// sitting exactly on `origin`.
    ///
    /// When a pivot violates its axis bound the traversal descends only
    /// toward `origin`'s side of the pivot. That directional prune is a
    /// heuristic centred on the querying entity, not a box-overlap prune; it
    /// keeps the hot path cheap at the cost of completeness in adversarial
    /// layouts.
    pub fn range_search(&self, origin: Vec2, top_left: Vec2, bottom_right: Vec2) -> Vec<TreeEntry> {
        let mut matches = Vec::new();
        let Some(root) = self.root.as_deref() else {
            return matches;
        };

        let mut queue: VecDeque<&Node> = VecDeque::new();
        queue.push_back(root);

        while let Some(node) = queue.pop_front() {
            let axis = node.depth % 2;
            let (lower, upper) = axis_bounds(axis, top_left, bottom_right);
            let pivot = axis_coord(node.entry.pos, axis);

            if lower <= pivot && pivot <= upper {
                // The split coordinate satisfying the bound says nothing
                // about either subtree staying inside it: walk both.
                if let Some(left) = node.left.as_deref() {
                    queue.push_back(left);
                }
                if let Some(right) = node.right.as_deref() {
                    queue.push_back(right);
                }

                let opposite = (node.depth + 1) % 2;
                let (lower, upper) = axis_bounds(opposite, top_left, bottom_right);
                let other = axis_coord(node.entry.pos, opposite);
                if lower <= other && other <= upper && node.entry.pos != origin {
                    matches.push(node.entry);
                }
            } else if axis_coord(origin, axis) < pivot {
                if let Some(left) = node.left.as_deref() {
                    queue.push_back(left);
                }
            } else if axis_coord(origin, axis) > pivot {
                if let Some(right) = node.right.as_deref() {
                    queue.push_back(right);
                }
            }
        }

        matches
    }

    #[cfg(test)]
    fn preorder(&self) -> Vec<(EntityId, usize)> {
        fn walk(node: Option<&Node>, out: &mut Vec<(EntityId, usize)>) {
            if let Some(node) = node {
                out.push((node.entry.id, node.depth));
                walk(node.left.as_deref(), out);
                walk(node.right.as_deref(), out);
            }
        }
        let mut out = Vec::new();
        walk(self.root.as_deref(), &mut out);
        out
    }
}
