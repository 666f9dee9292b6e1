//! The MCTS iteration loop: select, expand, simulate, score, backpropagate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use convo_mcts_core::Message;
use tracing::{info, instrument, warn};

use crate::config::SearchConfig;
use crate::error::{EngineError, Result};
use crate::node::{Node, NodeId};
use crate::oracle::{normalize_branch_count, ResponseGen, Scorer, Simulator};
use crate::tree_ops::Tree;

/// Drives a tree of candidate replies to convergence using pluggable
/// oracles for generation, simulation, and scoring.
pub struct SearchEngine {
    config: SearchConfig,
    response_gen: Arc<dyn ResponseGen>,
    simulator: Arc<dyn Simulator>,
    scorer: Arc<dyn Scorer>,
}

/// Running counters surfaced alongside the tree a search produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Iterations actually completed.
    pub total_iterations: usize,
    /// New nodes created, including the initial root candidates.
    pub nodes_created: usize,
    /// Selection targets that received a backpropagated score.
    pub nodes_evaluated: usize,
    /// Nodes removed across every pruning pass.
    pub pruned_branches: usize,
    /// Oracle fan-out tasks launched across the whole run.
    pub parallel_evaluations: usize,
}

/// What a single root's fan-out task produced for its selection target
/// `t_r`, computed without touching the tree so the per-root tasks stay
/// side-effect free until the sequential integration step.
struct IterationResult {
    /// The selection target itself: always simulated, scored, and
    /// backpropagated from, regardless of whether expansion also fires.
    target: NodeId,
    target_depth: usize,
    sub_history: Vec<Message>,
    simulated_reactions: Vec<String>,
    general_metrics: HashMap<String, f64>,
    goal_metrics: HashMap<String, f64>,
    overall_score: f64,
    /// A freshly generated sibling response, attached as an unvisited
    /// child of `target` during integration. `None` when `target` had
    /// never been visited, was already fully expanded, or the expansion
    /// oracle produced nothing usable.
    new_child: Option<String>,
}

impl SearchEngine {
    /// Build an engine over the given oracles.
    pub fn new(
        config: SearchConfig,
        response_gen: Arc<dyn ResponseGen>,
        simulator: Arc<dyn Simulator>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            config,
            response_gen,
            simulator,
            scorer,
        }
    }

    /// Run the search to completion and return the populated tree with
    /// its run statistics.
    ///
    /// If `deadline` elapses before the configured iteration count is
    /// reached, the search is abandoned entirely: [`EngineError::Cancelled`]
    /// is returned rather than whatever partial tree had been built.
    #[instrument(skip(self, history))]
    pub async fn run(&self, history: &[Message], deadline: Option<Duration>) -> Result<(Tree, SearchStats)> {
        let search = self.run_unbounded(history);
        match deadline {
            Some(d) => match tokio::time::timeout(d, search).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Cancelled(format!(
                    "search exceeded deadline of {d:?}"
                ))),
            },
            None => search.await,
        }
    }

    async fn run_unbounded(&self, history: &[Message]) -> Result<(Tree, SearchStats)> {
        let mut tree = Tree::new();
        let mut stats = SearchStats::default();
        let goal = self.config.goal.as_deref();

        let branches = self
            .response_gen
            .initial_branches(history, self.config.num_branches, goal, self.config.max_tokens)
            .await;
        if branches.len() != self.config.num_branches {
            warn!(
                got = branches.len(),
                want = self.config.num_branches,
                "response_gen returned the wrong number of initial branches, normalizing"
            );
        }
        let branches = normalize_branch_count(branches, self.config.num_branches);
        for branch in branches {
            tree.insert_root(Node::new(Some(branch), None, 0));
            stats.nodes_created += 1;
        }

        for iteration in 0..self.config.iterations {
            self.run_iteration(&mut tree, history, &mut stats).await?;
            stats.total_iterations += 1;

            if self.config.pruning_interval > 0
                && (iteration + 1) % self.config.pruning_interval == 0
            {
                let roots = tree.roots.clone();
                for root in roots {
                    let before = tree.subtree_size(root);
                    tree.prune_from_root(
                        root,
                        self.config.pruning_threshold_ratio,
                        self.config.min_visits_for_pruning,
                    );
                    stats.pruned_branches += before - tree.subtree_size(root);
                }
            }
        }

        info!(nodes = tree.len(), "search complete");
        Ok((tree, stats))
    }

    async fn run_iteration(
        &self,
        tree: &mut Tree,
        history: &[Message],
        stats: &mut SearchStats,
    ) -> Result<()> {
        let roots = tree.roots.clone();
        let selections: Vec<NodeId> = roots
            .into_iter()
            .map(|root| {
                tree.select_for_expansion(
                    root,
                    self.config.max_children,
                    self.config.exploration_constant,
                )
            })
            .collect();

        stats.parallel_evaluations += selections.len();
        let goal = self.config.goal.as_deref().map(str::to_string);

        let futures = selections.into_iter().map(|target| {
            let history = history.to_vec();
            let path = self.path_responses(tree, target);
            let node = tree.node(target);
            let expansion_eligible =
                node.visits > 0 && !node.is_fully_expanded(self.config.max_children);
            let depth = node.depth;
            let response_gen = Arc::clone(&self.response_gen);
            let simulator = Arc::clone(&self.simulator);
            let scorer = Arc::clone(&self.scorer);
            let sim_depth = self.config.simulation_depth;
            let max_tokens = self.config.max_tokens;
            let goal = goal.clone();
            async move {
                Self::expand_and_simulate(
                    &*response_gen,
                    &*simulator,
                    &*scorer,
                    &history,
                    &path,
                    sim_depth,
                    goal.as_deref(),
                    max_tokens,
                    target,
                    depth,
                    expansion_eligible,
                )
                .await
            }
        });

        let outcomes: Vec<IterationResult> = futures::future::join_all(futures).await;

        for outcome in outcomes {
            if let Some(response) = outcome.new_child {
                let child = Node::new(Some(response), Some(outcome.target), outcome.target_depth + 1);
                let child_id = tree.insert(child);
                tree.attach(outcome.target, child_id)?;
                stats.nodes_created += 1;
            }

            let node = tree.node_mut(outcome.target);
            node.sub_history = outcome.sub_history;
            node.simulated_reactions = outcome.simulated_reactions;
            node.general_metrics = outcome.general_metrics;
            node.goal_metrics = outcome.goal_metrics;

            tree.backpropagate(outcome.target, outcome.overall_score);
            stats.nodes_evaluated += 1;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn expand_and_simulate(
        response_gen: &dyn ResponseGen,
        simulator: &dyn Simulator,
        scorer: &dyn Scorer,
        history: &[Message],
        path: &[String],
        simulation_depth: usize,
        goal: Option<&str>,
        max_tokens: usize,
        target: NodeId,
        target_depth: usize,
        expansion_eligible: bool,
    ) -> IterationResult {
        let new_child = if expansion_eligible {
            match response_gen.expansion(history, path, goal, max_tokens).await {
                Some(r) => Some(r),
                None => {
                    warn!(?target, "expansion oracle produced no candidate, skipping");
                    None
                }
            }
        } else {
            None
        };

        let sim = simulator
            .simulate(history, path, simulation_depth, goal, max_tokens)
            .await;
        let score = scorer.score(history, path, &sim, goal, max_tokens).await;

        IterationResult {
            target,
            target_depth,
            sub_history: sim.simulation,
            simulated_reactions: sim.user_reactions,
            general_metrics: score.general_metrics,
            goal_metrics: score.goal_metrics,
            overall_score: score.overall_score,
            new_child,
        }
    }

    /// The conversation path to `node`: the base history followed by the
    /// assistant replies from root to `node`, excluding the root's own
    /// response (it is the candidate reply itself, not prior context).
    fn path_responses(&self, tree: &Tree, node: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = tree.node(id);
            if let Some(response) = &n.response {
                path.push(response.clone());
            }
            current = n.parent;
        }
        path.reverse();
        if !path.is_empty() {
            path.remove(0);
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Analyzer, ScoreResult, SimulationResult};
    use async_trait::async_trait;
    use convo_mcts_core::Role;

    struct StubResponseGen;

    #[async_trait]
    impl ResponseGen for StubResponseGen {
        async fn initial_branches(
            &self,
            _history: &[Message],
            num_branches: usize,
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> Vec<String> {
            (0..num_branches).map(|i| format!("branch-{i}")).collect()
        }

        async fn expansion(
            &self,
            _history: &[Message],
            path: &[String],
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> Option<String> {
            Some(format!("expansion-{}", path.len()))
        }
    }

    struct StubSimulator;

    #[async_trait]
    impl Simulator for StubSimulator {
        async fn simulate(
            &self,
            _history: &[Message],
            _path: &[String],
            _depth: usize,
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> SimulationResult {
            SimulationResult::default()
        }
    }

    struct StubScorer;

    #[async_trait]
    impl Scorer for StubScorer {
        async fn score(
            &self,
            _history: &[Message],
            path: &[String],
            _sim: &SimulationResult,
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> ScoreResult {
            ScoreResult::validated(Default::default(), None, Some(path.len() as f64 * 0.1))
        }
    }

    struct FailingResponseGen;

    #[async_trait]
    impl ResponseGen for FailingResponseGen {
        async fn initial_branches(
            &self,
            _history: &[Message],
            _num_branches: usize,
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> Vec<String> {
            Vec::new()
        }

        async fn expansion(
            &self,
            _history: &[Message],
            _path: &[String],
            _goal: Option<&str>,
            _max_tokens: usize,
        ) -> Option<String> {
            None
        }
    }

    struct StubAnalyzer;

    #[async_trait]
    impl Analyzer for StubAnalyzer {
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
            crate::oracle::default_explanation(index, avg_score, visits)
        }
    }

    fn history() -> Vec<Message> {
        vec![Message::new(Role::User, "hi there")]
    }

    #[tokio::test]
    async fn first_iteration_scores_roots_without_creating_children() {
        let config = SearchConfig {
            iterations: 1,
            num_branches: 2,
            pruning_interval: 0,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(
            config,
            Arc::new(StubResponseGen),
            Arc::new(StubSimulator),
            Arc::new(StubScorer),
        );
        let (tree, stats) = engine.run(&history(), None).await.unwrap();
        assert_eq!(tree.roots.len(), 2);
        for root in &tree.roots {
            assert_eq!(tree.node(*root).children.len(), 0);
            assert_eq!(tree.node(*root).visits, 1);
        }
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.nodes_evaluated, 2);
    }

    #[tokio::test]
    async fn second_iteration_expands_already_visited_roots_without_scoring_the_child() {
        let config = SearchConfig {
            iterations: 2,
            num_branches: 2,
            pruning_interval: 0,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(
            config,
            Arc::new(StubResponseGen),
            Arc::new(StubSimulator),
            Arc::new(StubScorer),
        );
        let (tree, stats) = engine.run(&history(), None).await.unwrap();
        for root in &tree.roots {
            assert_eq!(tree.node(*root).children.len(), 1);
            // Both iterations' selection target was the root itself (it
            // was never fully expanded), so it alone gets backpropagated.
            assert_eq!(tree.node(*root).visits, 2);
            let child = tree.node(*root).children[0];
            assert_eq!(tree.node(child).visits, 0);
        }
        assert_eq!(stats.nodes_created, 4);
        assert_eq!(stats.nodes_evaluated, 4);
        assert_eq!(tree.average_depth(), 1.0);
    }

    #[tokio::test]
    async fn falls_back_to_default_branches_when_oracle_yields_none() {
        let config = SearchConfig {
            iterations: 1,
            num_branches: 3,
            pruning_interval: 0,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(
            config,
            Arc::new(FailingResponseGen),
            Arc::new(StubSimulator),
            Arc::new(StubScorer),
        );
        let (tree, _stats) = engine.run(&history(), None).await.unwrap();
        assert_eq!(tree.roots.len(), 3);
        for root in &tree.roots {
            assert!(tree.node(*root).children.is_empty());
        }
    }

    #[tokio::test]
    async fn truncates_an_over_long_initial_branch_list() {
        struct OverLongResponseGen;
        #[async_trait]
        impl ResponseGen for OverLongResponseGen {
            async fn initial_branches(
                &self,
                _history: &[Message],
                _num_branches: usize,
                _goal: Option<&str>,
                _max_tokens: usize,
            ) -> Vec<String> {
                vec!["a".into(), "b".into(), "c".into(), "d".into()]
            }
            async fn expansion(
                &self,
                _history: &[Message],
                _path: &[String],
                _goal: Option<&str>,
                _max_tokens: usize,
            ) -> Option<String> {
                None
            }
        }
        let config = SearchConfig {
            iterations: 1,
            num_branches: 2,
            pruning_interval: 0,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(
            config,
            Arc::new(OverLongResponseGen),
            Arc::new(StubSimulator),
            Arc::new(StubScorer),
        );
        let (tree, _stats) = engine.run(&history(), None).await.unwrap();
        assert_eq!(tree.roots.len(), 2);
    }

    #[tokio::test]
    async fn stores_simulator_and_scorer_output_on_the_target_node() {
        struct ReportingSimulator;
        #[async_trait]
        impl Simulator for ReportingSimulator {
            async fn simulate(
                &self,
                _history: &[Message],
                _path: &[String],
                _depth: usize,
                _goal: Option<&str>,
                _max_tokens: usize,
            ) -> SimulationResult {
                SimulationResult {
                    simulation: vec![Message::new(Role::Assistant, "ok")],
                    user_reactions: vec!["great".into()],
                }
            }
        }
        struct ReportingScorer;
        #[async_trait]
        impl Scorer for ReportingScorer {
            async fn score(
                &self,
                _history: &[Message],
                _path: &[String],
                _sim: &SimulationResult,
                _goal: Option<&str>,
                _max_tokens: usize,
            ) -> ScoreResult {
                let mut metrics = HashMap::new();
                metrics.insert("clarity".to_string(), 0.9);
                ScoreResult::validated(metrics, None, Some(0.7))
            }
        }
        let config = SearchConfig {
            iterations: 1,
            num_branches: 1,
            pruning_interval: 0,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(
            config,
            Arc::new(StubResponseGen),
            Arc::new(ReportingSimulator),
            Arc::new(ReportingScorer),
        );
        let (tree, _stats) = engine.run(&history(), None).await.unwrap();
        let root = tree.roots[0];
        assert_eq!(tree.node(root).sub_history.len(), 1);
        assert_eq!(tree.node(root).simulated_reactions, vec!["great".to_string()]);
        assert_eq!(tree.node(root).general_metrics["clarity"], 0.9);
    }

    #[tokio::test]
    async fn deadline_of_zero_cancels_the_search() {
        let config = SearchConfig {
            iterations: 1000,
            num_branches: 2,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(
            config,
            Arc::new(StubResponseGen),
            Arc::new(StubSimulator),
            Arc::new(StubScorer),
        );
        let result = engine.run(&history(), Some(Duration::from_nanos(1))).await;
        assert!(matches!(result, Err(EngineError::Cancelled(_))));
    }
}
