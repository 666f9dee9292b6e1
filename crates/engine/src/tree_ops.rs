//! Tree-wide operations: selection, backpropagation, and pruning.
//!
//! The tree is a `Vec`-backed arena so it can be built up across
//! multiple independent roots (one per initial branch) without any
//! shared mutable state beyond the single `Tree` owner.

use crate::node::{Node, NodeId};

/// An arena of [`Node`]s, addressed by index, with one entry point per
/// initial branch explored from the conversation's current turn.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    /// Index of each independently-explored root.
    pub roots: Vec<NodeId>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached node and return its id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Insert `node` as a new root.
    pub fn insert_root(&mut self, node: Node) -> NodeId {
        let id = self.insert(node);
        self.roots.push(id);
        id
    }

    /// Attach `child` under `parent`, recording the back-pointer.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> crate::error::Result<()> {
        self.nodes[parent].attach_child(child)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Number of nodes across every root's subtree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// UCB1 score of `child` given its parent's current visit count.
    ///
    /// Unvisited children score `+infinity` so selection always expands
    /// an unvisited sibling before exploiting a visited one.
    pub fn ucb1(&self, parent: NodeId, child: NodeId, exploration_constant: f64) -> f64 {
        let child = self.node(child);
        if child.visits == 0 {
            return f64::INFINITY;
        }
        let parent_visits = self.node(parent).visits as f64;
        let exploitation = child.avg_score();
        let exploration =
            exploration_constant * (2.0 * parent_visits.ln() / child.visits as f64).sqrt();
        exploitation + exploration
    }

    /// Pick the child of `parent` with the highest UCB1 score, breaking
    /// ties by the lowest node index.
    pub fn select_child(&self, parent: NodeId, exploration_constant: f64) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let score_a = self.ucb1(parent, a, exploration_constant);
                let score_b = self.ucb1(parent, b, exploration_constant);
                score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.cmp(&a))
            })
    }

    /// Descend from `root` via UCB1 until reaching a node that still has
    /// room to expand (or has no children at all).
    pub fn select_for_expansion(
        &self,
        root: NodeId,
        max_children: usize,
        exploration_constant: f64,
    ) -> NodeId {
        let mut current = root;
        loop {
            let node = self.node(current);
            if node.children.is_empty() || !node.is_fully_expanded(max_children) {
                return current;
            }
            match self.select_child(current, exploration_constant) {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    /// Apply `score` to `leaf` and every ancestor up to (and including)
    /// its root.
    pub fn backpropagate(&mut self, leaf: NodeId, score: f64) {
        let mut current = Some(leaf);
        while let Some(id) = current {
            self.node_mut(id).update(score);
            current = self.node(id).parent;
        }
    }

    /// Remove descendants whose average score has fallen far enough
    /// below their root's average score.
    ///
    /// The comparison threshold is derived from the root once and then
    /// applied unchanged at every depth, which makes pruning
    /// deliberately more aggressive near the root than a
    /// parent-relative threshold would be.
    pub fn prune_from_root(&mut self, root: NodeId, threshold_ratio: f64, min_visits: u32) {
        let threshold = self.node(root).avg_score() * threshold_ratio;
        self.prune_children(root, threshold, min_visits);
    }

    fn prune_children(&mut self, node: NodeId, threshold: f64, min_visits: u32) {
        let children = self.node(node).children.clone();
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            let c = self.node(child);
            let prunable = c.visits >= min_visits && c.avg_score() < threshold;
            if prunable {
                continue;
            }
            kept.push(child);
            self.prune_children(child, threshold, min_visits);
        }
        self.node_mut(node).children = kept;
    }

    /// Number of nodes reachable from `node`, inclusive. Used to measure
    /// how many nodes a pruning pass removed.
    pub fn subtree_size(&self, node: NodeId) -> usize {
        let n = self.node(node);
        1 + n
            .children
            .iter()
            .map(|&c| self.subtree_size(c))
            .sum::<usize>()
    }

    /// Average leaf depth across every root in the tree.
    pub fn average_depth(&self) -> f64 {
        let depths = self.leaf_depths();
        if depths.is_empty() {
            return 0.0;
        }
        depths.iter().sum::<usize>() as f64 / depths.len() as f64
    }

    /// The depth of every leaf (childless node) reachable from any root.
    pub fn leaf_depths(&self) -> Vec<usize> {
        let mut depths = Vec::new();
        for &root in &self.roots {
            self.collect_leaf_depths(root, &mut depths);
        }
        depths
    }

    fn collect_leaf_depths(&self, node: NodeId, out: &mut Vec<usize>) {
        let n = self.node(node);
        if n.children.is_empty() {
            out.push(n.depth);
            return;
        }
        for &child in &n.children {
            self.collect_leaf_depths(child, out);
        }
    }
}
