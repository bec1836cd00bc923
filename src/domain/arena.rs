//! Arena-backed tree assembled from bounds or parent references

use std::collections::{HashMap, HashSet};

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::NestedNode;

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode<N> {
    /// Row data for this node
    pub data: N,
    /// Index of parent node in the arena, None for root nodes
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in sibling order
    pub children: Vec<Index>,
}

/// Bounds computed for an arena node by [`TreeArena::assign_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    pub index: Index,
    pub left: i64,
    pub right: i64,
    pub level: i64,
}

/// Arena-based forest assembled from flat rows.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// Holds one or more roots: a single tree scope may be a forest when multiple roots
/// are allowed.
#[derive(Debug)]
pub struct TreeArena<N> {
    /// Arena storage for all tree nodes
    arena: Arena<TreeNode<N>>,
    /// Root indices in sibling order
    roots: Vec<Index>,
}

impl<N> Default for TreeArena<N> {
    fn default() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
        }
    }
}

impl<N: NestedNode> TreeArena<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble from interval containment.
    ///
    /// Each row becomes a child of the nearest row whose interval encloses it; the
    /// parent reference column is not consulted.
    #[instrument(level = "debug", skip(rows))]
    pub fn from_intervals(mut rows: Vec<N>) -> Self {
        rows.sort_by_key(|r| r.left());
        let mut tree = Self::new();
        let mut stack: Vec<(Index, i64)> = Vec::new();

        for row in rows {
            while let Some(&(_, right)) = stack.last() {
                if right < row.left() {
                    stack.pop();
                } else {
                    break;
                }
            }
            let parent = stack.last().map(|&(idx, _)| idx);
            let right = row.right();
            let idx = tree.insert_node(row, parent);
            stack.push((idx, right));
        }
        tree
    }

    /// Assemble from parent references.
    ///
    /// Siblings keep the order of their current left bound. Rows whose parent is
    /// absent from `rows` become roots, and parent-reference cycles are broken by
    /// promoting the leftmost node of each cycle to a root.
    #[instrument(level = "debug", skip(rows))]
    pub fn from_parent_refs(mut rows: Vec<N>) -> Self {
        rows.sort_by_key(|r| r.left());
        let mut tree = Self::new();
        let mut by_key: HashMap<N::Key, Index> = HashMap::new();
        let mut order = Vec::with_capacity(rows.len());

        for row in rows {
            let key = row.key().cloned();
            let idx = tree.arena.insert(TreeNode {
                data: row,
                parent: None,
                children: Vec::new(),
            });
            if let Some(key) = key {
                by_key.insert(key, idx);
            }
            order.push(idx);
        }

        for &idx in &order {
            let parent = tree.arena[idx]
                .data
                .parent()
                .and_then(|p| by_key.get(p).copied())
                .filter(|&p| p != idx);
            match parent {
                Some(p) => {
                    tree.arena[idx].parent = Some(p);
                    tree.arena[p].children.push(idx);
                }
                None => tree.roots.push(idx),
            }
        }

        loop {
            let reachable: HashSet<Index> = tree.iter().map(|(idx, _)| idx).collect();
            let Some(&stray) = order.iter().find(|idx| !reachable.contains(*idx)) else {
                break;
            };
            tree.detach(stray);
            tree.roots.push(stray);
        }
        tree.roots
            .sort_by_key(|&idx| tree.arena[idx].data.left());

        tree
    }

    fn detach(&mut self, idx: Index) {
        if let Some(parent) = self.arena[idx].parent.take() {
            self.arena[parent].children.retain(|&c| c != idx);
        }
    }

    #[instrument(level = "trace", skip(self, data))]
    pub fn insert_node(&mut self, data: N, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        match parent.and_then(|p| self.arena.get_mut(p)) {
            Some(parent) => parent.children.push(node_idx),
            None => {
                self.arena[node_idx].parent = None;
                self.roots.push(node_idx);
            }
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode<N>> {
        self.arena.get(idx)
    }

    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Parent row of a node, if it has one.
    pub fn parent_data(&self, idx: Index) -> Option<&N> {
        let parent = self.get_node(idx)?.parent?;
        self.get_node(parent).map(|p| &p.data)
    }

    /// Depth of a node counted from its root (root = 0).
    pub fn level_of(&self, idx: Index) -> i64 {
        let mut level = 0;
        let mut current = self.get_node(idx).and_then(|n| n.parent);
        while let Some(p) = current {
            level += 1;
            current = self.get_node(p).and_then(|n| n.parent);
        }
        level
    }

    pub fn iter(&self) -> TreeIterator<'_, N> {
        TreeIterator::new(self)
    }

    /// Number of levels in the deepest tree.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Gap-free bounds for the whole forest, starting at `base`.
    ///
    /// Roots are laid out one after another, children in sibling order.
    #[instrument(level = "debug", skip(self))]
    pub fn assign_bounds(&self, base: i64) -> Vec<Placed> {
        let mut placed = Vec::with_capacity(self.len());
        let mut counter = base;
        let mut lefts: HashMap<Index, i64> = HashMap::new();
        let mut stack: Vec<(Index, i64, bool)> =
            self.roots.iter().rev().map(|&r| (r, 0, false)).collect();

        while let Some((idx, level, visited)) = stack.pop() {
            let Some(node) = self.get_node(idx) else {
                continue;
            };
            if visited {
                placed.push(Placed {
                    index: idx,
                    left: lefts.get(&idx).copied().unwrap_or(counter),
                    right: counter,
                    level,
                });
                counter += 1;
            } else {
                lefts.insert(idx, counter);
                counter += 1;
                stack.push((idx, level, true));
                for &child in node.children.iter().rev() {
                    stack.push((child, level + 1, false));
                }
            }
        }
        placed
    }
}

/// Pre-order (document order) traversal over every root.
pub struct TreeIterator<'a, N> {
    arena: &'a TreeArena<N>,
    stack: Vec<Index>,
}

impl<'a, N> TreeIterator<'a, N> {
    fn new(arena: &'a TreeArena<N>) -> Self {
        let stack = arena.roots.iter().rev().copied().collect();
        Self { arena, stack }
    }
}

impl<'a, N> Iterator for TreeIterator<'a, N> {
    type Item = (Index, &'a TreeNode<N>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.arena.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Row;

    fn row(id: u64, parent: Option<u64>, left: i64, right: i64) -> Row {
        Row {
            id: Some(id),
            parent_id: parent,
            left,
            right,
            ..Row::new(format!("n{id}"))
        }
    }

    fn sample() -> Vec<Row> {
        // R[1,8] -> C[2,3], A[4,5], B[6,7]
        vec![
            row(3, Some(1), 6, 7),
            row(1, None, 1, 8),
            row(4, Some(1), 2, 3),
            row(2, Some(1), 4, 5),
        ]
    }

    #[test]
    fn given_rows_when_assembling_from_intervals_then_children_follow_left_order() {
        let tree = TreeArena::from_intervals(sample());

        assert_eq!(tree.roots().len(), 1);
        let root = tree.get_node(tree.roots()[0]).unwrap();
        let labels: Vec<_> = root
            .children
            .iter()
            .map(|&c| tree.get_node(c).unwrap().data.label.clone())
            .collect();
        assert_eq!(labels, vec!["n4", "n2", "n3"]);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn given_scrambled_bounds_when_assigning_then_bounds_follow_parent_refs() {
        let rows = vec![
            row(1, None, 1, 2),
            row(2, Some(1), 7, 9),
            row(3, Some(2), 20, 21),
        ];
        let tree = TreeArena::from_parent_refs(rows);
        let placed = tree.assign_bounds(1);

        let by_id: HashMap<u64, Placed> = placed
            .iter()
            .map(|p| (tree.get_node(p.index).unwrap().data.id.unwrap(), *p))
            .collect();
        assert_eq!((by_id[&1].left, by_id[&1].right, by_id[&1].level), (1, 6, 0));
        assert_eq!((by_id[&2].left, by_id[&2].right, by_id[&2].level), (2, 5, 1));
        assert_eq!((by_id[&3].left, by_id[&3].right, by_id[&3].level), (3, 4, 2));
    }

    #[test]
    fn given_parent_cycle_when_assembling_then_cycle_is_broken_into_root() {
        let rows = vec![
            row(1, None, 1, 2),
            row(2, Some(3), 3, 4),
            row(3, Some(2), 5, 6),
        ];
        let tree = TreeArena::from_parent_refs(rows);

        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.iter().count(), 3);
    }
}
