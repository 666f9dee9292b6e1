//! Picks the winning branch out of a completed search tree and explains it.

use std::collections::HashMap;
use std::sync::Arc;

use convo_mcts_core::Message;
use tracing::warn;

use crate::node::NodeId;
use crate::oracle::{default_explanation, Analyzer as AnalyzerOracle};
use crate::tree_ops::Tree;

/// Weight given to average score in the final winner's blended ranking.
const SCORE_WEIGHT_QUALITY: f64 = 0.7;
/// Weight given to visit share in the final winner's blended ranking.
const SCORE_WEIGHT_VISITS: f64 = 0.3;

/// One fully-explored candidate branch, flattened for reporting.
#[derive(Debug, Clone)]
pub struct Branch {
    /// Index of this branch's root among all roots, in insertion order.
    pub index: usize,
    /// The root reply this branch explores.
    pub response: String,
    /// Mean score across every visit to this root.
    pub avg_score: f64,
    /// Total visits this root received.
    pub visits: u32,
    /// The root's last simulator `user_reactions` output.
    pub simulated_reactions: Vec<String>,
    /// The root's last simulator `simulation` output.
    pub sub_history: Vec<Message>,
    /// The root's last scorer `general_metrics` output.
    pub general_metrics: HashMap<String, f64>,
    /// The root's last scorer `goal_metrics` output.
    pub goal_metrics: HashMap<String, f64>,
    /// Indices of this root's direct children within the tree's arena.
    pub children: Vec<NodeId>,
}

/// The selected branch plus a human-readable rationale.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Every explored branch, in root order.
    pub branches: Vec<Branch>,
    /// Index into `branches` of the winner.
    pub best_index: usize,
    /// Rationale text for the winner.
    pub explanation: String,
}

/// Flattens `tree`'s roots into [`Branch`]es and explains the winner.
pub struct BranchAnalyzer {
    oracle: Arc<dyn AnalyzerOracle>,
}

impl BranchAnalyzer {
    /// Build an analyzer around an [`AnalyzerOracle`] implementation.
    pub fn new(oracle: Arc<dyn AnalyzerOracle>) -> Self {
        Self { oracle }
    }

    /// Flatten every root into a [`Branch`], select the winner by blended
    /// score, and fetch its rationale.
    pub async fn analyze(
        &self,
        tree: &Tree,
        history: &[Message],
        goal: Option<&str>,
        max_tokens: usize,
    ) -> AnalysisResult {
        let branches = self.branches(tree);
        let best_index = Self::select_best(&branches);
        let winner = &branches[best_index];

        let explanation = self
            .oracle
            .explain(
                winner.index,
                branches.len(),
                winner.avg_score,
                winner.visits,
                history,
                goal,
                max_tokens,
            )
            .await;
        let explanation = if explanation.trim().is_empty() {
            warn!(index = winner.index, "analyzer oracle returned empty explanation, using fallback");
            default_explanation(winner.index, winner.avg_score, winner.visits)
        } else {
            explanation
        };

        AnalysisResult {
            branches,
            best_index,
            explanation,
        }
    }

    fn branches(&self, tree: &Tree) -> Vec<Branch> {
        tree.roots
            .iter()
            .enumerate()
            .map(|(index, &root)| {
                let node = tree.node(root);
                Branch {
                    index,
                    response: node.response.clone().unwrap_or_default(),
                    avg_score: node.avg_score(),
                    visits: node.visits,
                    simulated_reactions: node.simulated_reactions.clone(),
                    sub_history: node.sub_history.clone(),
                    general_metrics: node.general_metrics.clone(),
                    goal_metrics: node.goal_metrics.clone(),
                    children: node.children.clone(),
                }
            })
            .collect()
    }

    /// Pick the branch maximizing `0.7 * avg_score + 0.3 * visit share`,
    /// breaking ties by the lowest root index.
    fn select_best(branches: &[Branch]) -> usize {
        let total_visits: u32 = branches.iter().map(|b| b.visits).sum();
        let blended = |b: &Branch| -> f64 {
            let visit_share = if total_visits == 0 {
                0.0
            } else {
                b.visits as f64 / total_visits as f64
            };
            SCORE_WEIGHT_QUALITY * b.avg_score + SCORE_WEIGHT_VISITS * visit_share
        };

        let mut best = 0;
        for (i, branch) in branches.iter().enumerate().skip(1) {
            if blended(branch) > blended(&branches[best]) {
                best = i;
            }
        }
        best
    }
}

/// A leaf-to-root reply chain plus the id of its originating root,
/// useful for callers that want full conversation context for the
/// winning path rather than just its root reply.
pub fn deepest_path(tree: &Tree, root: NodeId) -> Vec<String> {
    let mut node = root;
    loop {
        let current = tree.node(node);
        let Some(&next) = current.children.first() else {
            break;
        };
        node = next;
    }
    let mut path = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        let n = tree.node(id);
        if let Some(r) = &n.response {
            path.push(r.clone());
        }
        current = n.parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use async_trait::async_trait;

    struct StubOracle;

    #[async_trait]
    impl AnalyzerOracle for StubOracle {
        async fn explain(
            &self,
            index: usize,
            _total: usize,
            avg_score: f64,
            visits: u32,
            _history: &[Message],
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> String {
            default_explanation(index, avg_score, visits)
        }
    }

    struct EmptyOracle;

    #[async_trait]
    impl AnalyzerOracle for EmptyOracle {
        async fn explain(
            &self,
            _index: usize,
            _total: usize,
            _avg_score: f64,
            _visits: u32,
            _history: &[Message],
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> String {
            String::new()
        }
    }

    fn two_root_tree() -> Tree {
        let mut tree = Tree::new();
        let low = tree.insert_root(Node::new(Some("low".into()), None, 0));
        let high = tree.insert_root(Node::new(Some("high".into()), None, 0));
        tree.node_mut(low).update(0.2);
        tree.node_mut(high).update(0.9);
        tree.node_mut(high).update(0.9);
        tree
    }

    #[tokio::test]
    async fn selects_higher_blended_score_branch() {
        let tree = two_root_tree();
        let analyzer = BranchAnalyzer::new(Arc::new(StubOracle));
        let result = analyzer.analyze(&tree, &[], None, 250).await;
        assert_eq!(result.best_index, 1);
        assert_eq!(result.branches[result.best_index].response, "high");
    }

    #[tokio::test]
    async fn falls_back_to_default_explanation_on_empty_oracle_response() {
        let tree = two_root_tree();
        let analyzer = BranchAnalyzer::new(Arc::new(EmptyOracle));
        let result = analyzer.analyze(&tree, &[], None, 250).await;
        assert!(result.explanation.starts_with("Selected response"));
    }
}
