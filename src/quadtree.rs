//! Region quadtree over shape bounding boxes, used as the collision broad-phase.
//!
//! The tree is cleared and rebuilt from scratch every tick. A node starts as
//! an empty leaf, holds items until `capacity` is exceeded, then splits into
//! four half-extent children and hands every item down. Items whose box
//! straddles a split line are stored in every child they overlap, so queries
//! can return duplicates; callers collect into a set.
//!
//! A full leaf only splits when at least one occupied child would hold fewer
//! items than the leaf does. Piles of overlapping boxes stay in one leaf
//! instead of being copied into every descendant.

use std::collections::HashSet;

use tracing::warn;

use crate::float::Float;
use crate::geometry::Aabb;

struct Entry<F: Float> {
    item: usize,
    aabb: Aabb<F>,
}

/// A quadtree node. The root is the tree.
pub struct QuadTree<F: Float> {
    boundary: Aabb<F>,
    capacity: usize,
    max_depth: usize,
    depth: usize,
    entries: Vec<Entry<F>>,
    children: Option<Box<[QuadTree<F>; 4]>>,
}

impl<F: Float> QuadTree<F> {
    pub fn new(boundary: Aabb<F>, capacity: usize, max_depth: usize) -> Self {
        Self::with_depth(boundary, capacity.max(1), max_depth, 0)
    }

    fn with_depth(boundary: Aabb<F>, capacity: usize, max_depth: usize, depth: usize) -> Self {
        QuadTree {
            boundary,
            capacity,
            max_depth,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    pub fn boundary(&self) -> Aabb<F> {
        self.boundary
    }

    /// Drop every item and child, optionally moving the root boundary.
    pub fn clear(&mut self, boundary: Aabb<F>) {
        self.boundary = boundary;
        self.entries.clear();
        self.children = None;
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Insert `item` with bounding box `aabb`.
    ///
    /// Returns `false` (and logs) when the box is invalid or lies entirely
    /// outside the tree; the item is then not stored.
    pub fn insert(&mut self, item: usize, aabb: Aabb<F>) -> bool {
        if !aabb.is_valid() || !self.boundary.overlaps(&aabb) {
            warn!(
                item,
                min_x = aabb.min.x.to_f64(),
                min_y = aabb.min.y.to_f64(),
                max_x = aabb.max.x.to_f64(),
                max_y = aabb.max.y.to_f64(),
                "quadtree insert outside boundary, skipped"
            );
            return false;
        }
        self.insert_entry(Entry { item, aabb });
        true
    }

    fn insert_entry(&mut self, entry: Entry<F>) {
        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                if child.boundary.overlaps(&entry.aabb) {
                    child.insert_entry(Entry { item: entry.item, aabb: entry.aabb });
                }
            }
            return;
        }

        self.entries.push(entry);
        if self.entries.len() > self.capacity && self.depth < self.max_depth && self.split_separates() {
            self.subdivide();
        }
    }

    fn split_separates(&self) -> bool {
        let total = self.entries.len();
        (0..4).any(|q| {
            let quadrant = self.boundary.quadrant(q);
            let held = self.entries.iter().filter(|e| quadrant.overlaps(&e.aabb)).count();
            held > 0 && held < total
        })
    }

    fn subdivide(&mut self) {
        let b = self.boundary;
        let (cap, max, d) = (self.capacity, self.max_depth, self.depth + 1);
        self.children = Some(Box::new([
            QuadTree::with_depth(b.quadrant(0), cap, max, d),
            QuadTree::with_depth(b.quadrant(1), cap, max, d),
            QuadTree::with_depth(b.quadrant(2), cap, max, d),
            QuadTree::with_depth(b.quadrant(3), cap, max, d),
        ]));
        for entry in std::mem::take(&mut self.entries) {
            self.insert_entry(entry);
        }
    }

    /// Collect every item whose box overlaps `range` into `out`.
    pub fn query(&self, range: &Aabb<F>, out: &mut HashSet<usize>) {
        if !self.boundary.overlaps(range) {
            return;
        }
        match &self.children {
            Some(children) => {
                for child in children.iter() {
                    child.query(range, out);
                }
            }
            None => {
                out.extend(self.entries.iter().filter(|e| e.aabb.overlaps(range)).map(|e| e.item));
            }
        }
    }

    /// Unordered pairs `(a, b)` with `a < b` whose boxes overlap and share
    /// at least one leaf.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut seen = HashSet::new();
        self.collect_pairs(&mut seen);
        let mut pairs: Vec<_> = seen.into_iter().collect();
        pairs.sort_unstable();
        pairs
    }

    fn collect_pairs(&self, seen: &mut HashSet<(usize, usize)>) {
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_pairs(seen);
            }
            return;
        }
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                if a.item != b.item && a.aabb.overlaps(&b.aabb) {
                    seen.insert((a.item.min(b.item), a.item.max(b.item)));
                }
            }
        }
    }

    /// Stored references, counting duplicates across leaves.
    pub fn len(&self) -> usize {
        match &self.children {
            Some(children) => children.iter().map(QuadTree::len).sum(),
            None => self.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth of the deepest node below this one (0 for a leaf).
    pub fn height(&self) -> usize {
        match &self.children {
            Some(children) => 1 + children.iter().map(QuadTree::height).max().unwrap_or(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::Vec2;

    fn square(x: f32, y: f32, half: f32) -> Aabb<f32> {
        Aabb::from_center(Vec2::new(x, y), Vec2::splat(half))
    }

    fn world() -> Aabb<f32> {
        Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0))
    }

    #[test]
    fn stays_leaf_until_capacity_exceeded() {
        let mut tree = QuadTree::new(world(), 2, 4);
        tree.insert(0, square(10.0, 10.0, 1.0));
        tree.insert(1, square(90.0, 90.0, 1.0));
        assert!(tree.is_leaf());
        tree.insert(2, square(10.0, 90.0, 1.0));
        assert!(!tree.is_leaf());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn straddling_box_lands_in_every_child() {
        let mut tree = QuadTree::new(world(), 1, 4);
        tree.insert(0, square(10.0, 10.0, 1.0));
        tree.insert(1, square(50.0, 50.0, 5.0));
        // item 1 overlaps all four quadrants
        assert!(tree.len() >= 5);
        let mut out = HashSet::new();
        tree.query(&world(), &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn max_depth_allows_overflow() {
        let mut tree = QuadTree::new(world(), 1, 0);
        for i in 0..10 {
            tree.insert(i, square(10.0, 10.0, 1.0));
        }
        assert!(tree.is_leaf());
        assert_eq!(tree.len(), 10);
    }

    #[test]
    fn coincident_boxes_do_not_split() {
        let mut tree = QuadTree::new(world(), 8, 8);
        for i in 0..9 {
            tree.insert(i, square(50.0, 50.0, 2.0));
        }
        assert!(tree.is_leaf());
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.candidate_pairs().len(), 36);
    }

    #[test]
    fn pile_in_one_corner_stays_shallow() {
        let mut tree = QuadTree::new(world(), 2, 8);
        for i in 0..6 {
            tree.insert(i, square(20.0, 20.0, 1.0));
        }
        tree.insert(6, square(90.0, 90.0, 1.0));
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn outside_insert_is_rejected() {
        let mut tree = QuadTree::new(world(), 4, 4);
        assert!(!tree.insert(0, square(500.0, 500.0, 1.0)));
        assert!(tree.is_empty());
    }

    #[test]
    fn pairs_only_for_overlapping_boxes() {
        let mut tree = QuadTree::new(world(), 8, 4);
        tree.insert(0, square(10.0, 10.0, 2.0));
        tree.insert(1, square(12.0, 10.0, 2.0));
        tree.insert(2, square(80.0, 80.0, 2.0));
        assert_eq!(tree.candidate_pairs(), vec![(0, 1)]);
    }
}
