//! The public entry point: validate, search, analyze, summarize.

use std::sync::Arc;
use std::time::Duration;

use convo_mcts_core::Message;
use tracing::instrument;

use crate::analyzer::{AnalysisResult, Branch, BranchAnalyzer};
use crate::config::SearchConfig;
use crate::engine::{SearchEngine, SearchStats};
use crate::error::{EngineError, Result};
use crate::oracle::{Analyzer, ResponseGen, Scorer, Simulator};

/// Aggregate score statistics over every explored branch.
#[derive(Debug, Clone, Copy)]
pub struct ScoreStats {
    /// The winning branch's average score.
    pub best: f64,
    /// Mean average score across all branches.
    pub mean: f64,
    /// Population variance of average scores across all branches.
    pub variance: f64,
}

/// The final report handed back to a caller: the winning reply, why it
/// won, and summary statistics over the whole search.
#[derive(Debug, Clone)]
pub struct ConversationAnalysis {
    /// The selected reply text.
    pub best_response: String,
    /// Why it was selected.
    pub explanation: String,
    /// Every explored branch.
    pub branches: Vec<Branch>,
    /// Aggregate score statistics.
    pub scores: ScoreStats,
    /// Average leaf depth across the whole tree.
    pub average_depth: f64,
    /// Run counters from the search itself.
    pub mcts_statistics: SearchStats,
}

/// Runs a full search-and-analyze pass over a conversation.
pub struct Orchestrator {
    response_gen: Arc<dyn ResponseGen>,
    simulator: Arc<dyn Simulator>,
    scorer: Arc<dyn Scorer>,
    analyzer_oracle: Arc<dyn Analyzer>,
}

impl Orchestrator {
    /// Build an orchestrator over a full set of oracle implementations.
    pub fn new(
        response_gen: Arc<dyn ResponseGen>,
        simulator: Arc<dyn Simulator>,
        scorer: Arc<dyn Scorer>,
        analyzer_oracle: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            response_gen,
            simulator,
            scorer,
            analyzer_oracle,
        }
    }

    /// Validate `history`/`config`, run the search, and return the
    /// winning reply with its rationale and statistics.
    #[instrument(skip(self, history))]
    pub async fn analyze(
        &self,
        history: &[Message],
        config: SearchConfig,
        deadline: Option<Duration>,
    ) -> Result<ConversationAnalysis> {
        if history.is_empty() {
            return Err(EngineError::NoHistory);
        }
        config.validate()?;
        let goal = config.goal.clone();
        let max_tokens = config.max_tokens;

        let engine = SearchEngine::new(
            config,
            Arc::clone(&self.response_gen),
            Arc::clone(&self.simulator),
            Arc::clone(&self.scorer),
        );
        let (tree, mcts_statistics) = engine.run(history, deadline).await?;

        let analyzer = BranchAnalyzer::new(Arc::clone(&self.analyzer_oracle));
        let AnalysisResult {
            branches,
            best_index,
            explanation,
        } = analyzer
            .analyze(&tree, history, goal.as_deref(), max_tokens)
            .await;

        let scores = Self::score_stats(&branches, best_index);
        let average_depth = tree.average_depth();
        let best_response = branches[best_index].response.clone();

        Ok(ConversationAnalysis {
            best_response,
            explanation,
            branches,
            scores,
            average_depth,
            mcts_statistics,
        })
    }

    fn score_stats(branches: &[Branch], best_index: usize) -> ScoreStats {
        let values: Vec<f64> = branches.iter().map(|b| b.avg_score).collect();
        let mean = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        let variance = if values.is_empty() {
            0.0
        } else {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
        };
        ScoreStats {
            best: branches[best_index].avg_score,
            mean,
            variance,
        }
    }
}
