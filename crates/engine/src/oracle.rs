//! Pluggable LLM-backed interfaces the search engine drives.
//!
//! Every oracle call can fail (network error, malformed JSON, model
//! refusal) without aborting the search: each trait documents a
//! non-fatal fallback the engine substitutes instead, logging the
//! failure at `warn` level.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use convo_mcts_core::Message;

/// Generates candidate assistant replies.
///
/// Implementations call out to an LLM; on transport or parse failure the
/// engine falls back to a small fixed set of generic replies rather than
/// failing the whole search.
#[async_trait]
pub trait ResponseGen: Send + Sync {
    /// Produce `num_branches` independent opening replies to `history`.
    async fn initial_branches(
        &self,
        history: &[Message],
        num_branches: usize,
        goal: Option<&str>,
        max_tokens: usize,
    ) -> Vec<String>;

    /// Produce one continuation reply given the path explored so far.
    ///
    /// Returns `None` when the oracle could not produce a usable
    /// continuation; the caller treats that node as a dead end for this
    /// iteration rather than retrying.
    async fn expansion(
        &self,
        history: &[Message],
        path: &[String],
        goal: Option<&str>,
        max_tokens: usize,
    ) -> Option<String>;
}

/// Default canned replies used when [`ResponseGen`] fails. Taken from the
/// small fixed set the original service fell back to.
pub const DEFAULT_RESPONSES: &[&str] = &[
    "I understand. Could you tell me more about that?",
    "That's interesting. How does that make you feel?",
    "I hear you. What would be most helpful right now?",
];

/// Build a fallback list of `n` initial branches by cycling the fixed
/// default replies.
pub fn default_initial_branches(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| DEFAULT_RESPONSES[i % DEFAULT_RESPONSES.len()].to_string())
        .collect()
}

/// Enforce the wire contract's exact-length rule on an oracle's initial
/// branch list: extra entries are truncated, any shortfall is filled from
/// the fixed default set.
pub fn normalize_branch_count(mut branches: Vec<String>, n: usize) -> Vec<String> {
    branches.truncate(n);
    let mut i = branches.len();
    while branches.len() < n {
        branches.push(DEFAULT_RESPONSES[i % DEFAULT_RESPONSES.len()].to_string());
        i += 1;
    }
    branches
}

/// Simulates how a conversation continues after a candidate reply.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Roll the conversation forward `depth` turns past `path`.
    async fn simulate(
        &self,
        history: &[Message],
        path: &[String],
        depth: usize,
        goal: Option<&str>,
        max_tokens: usize,
    ) -> SimulationResult;
}

/// The outcome of a simulated continuation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Simulated turns, alternating user/assistant.
    #[serde(default)]
    pub simulation: Vec<Message>,
    /// Simulated user reactions to the candidate reply.
    #[serde(default)]
    pub user_reactions: Vec<String>,
}

/// Metrics every scoring call must report, regardless of goal.
pub const GENERAL_METRICS: &[&str] = &[
    "clarity",
    "relevance",
    "engagement",
    "authenticity",
    "coherence",
    "respectfulness",
];

/// Scores a simulated conversation path.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score the conversation resulting from `path` plus its simulation.
    async fn score(
        &self,
        history: &[Message],
        path: &[String],
        sim: &SimulationResult,
        goal: Option<&str>,
        max_tokens: usize,
    ) -> ScoreResult;
}

/// A scoring oracle's response, already defaulted for any missing field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Score per required general metric, always fully populated.
    pub general_metrics: HashMap<String, f64>,
    /// Score per caller-supplied goal metric; may be empty.
    #[serde(default)]
    pub goal_metrics: HashMap<String, f64>,
    /// The overall score used by the search engine's UCB1 selection.
    pub overall_score: f64,
}

impl ScoreResult {
    /// Fill in any missing general metric with `0.0`, default
    /// `goal_metrics` to empty, and default `overall_score` to the mean
    /// of the *present* general metrics (or `0.0` if none were reported).
    ///
    /// This is the defensive validation applied to a scorer response that
    /// parsed but came back incomplete — distinct from [`ScoreResult::fallback`],
    /// which covers a scorer call that failed outright.
    ///
    /// Out-of-range scores are left untouched rather than clamped into
    /// `[0, 1]`.
    pub fn validated(general_metrics: HashMap<String, f64>, goal_metrics: Option<HashMap<String, f64>>, overall_score: Option<f64>) -> Self {
        let overall_score = overall_score.unwrap_or_else(|| {
            if general_metrics.is_empty() {
                0.0
            } else {
                general_metrics.values().sum::<f64>() / general_metrics.len() as f64
            }
        });
        let mut general_metrics = general_metrics;
        for metric in GENERAL_METRICS {
            general_metrics.entry((*metric).to_string()).or_insert(0.0);
        }
        Self {
            general_metrics,
            goal_metrics: goal_metrics.unwrap_or_default(),
            overall_score,
        }
    }

    /// The fallback used when a [`Scorer`] call fails outright (transport
    /// error, unparseable response): every required metric scores `0.5`.
    pub fn fallback() -> Self {
        let general_metrics = GENERAL_METRICS.iter().map(|m| (m.to_string(), 0.5)).collect();
        Self {
            general_metrics,
            goal_metrics: HashMap::new(),
            overall_score: 0.5,
        }
    }
}

/// Explains why the winning branch was selected.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Produce a human-readable rationale for picking `index` among
    /// `total` candidates, given its final stats and the conversation
    /// it was chosen for.
    #[allow(clippy::too_many_arguments)]
    async fn explain(
        &self,
        index: usize,
        total: usize,
        avg_score: f64,
        visits: u32,
        history: &[Message],
        goal: Option<&str>,
        max_tokens: usize,
    ) -> String;
}

/// The fallback rationale used when an [`Analyzer`] call fails.
pub fn default_explanation(index: usize, avg_score: f64, visits: u32) -> String {
    format!(
        "Selected response {} based on MCTS evaluation, score {:.2} over {} visits.",
        index + 1,
        avg_score,
        visits
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validated_fills_missing_general_metrics_with_zero() {
        let mut partial = HashMap::new();
        partial.insert("clarity".to_string(), 0.9);
        let result = ScoreResult::validated(partial, None, None);
        assert_eq!(result.general_metrics.len(), GENERAL_METRICS.len());
        assert_eq!(result.general_metrics["relevance"], 0.0);
    }

    #[test]
    fn validated_defaults_overall_score_to_mean_of_general_metrics() {
        let mut metrics = HashMap::new();
        metrics.insert("clarity".to_string(), 1.0);
        metrics.insert("relevance".to_string(), 0.0);
        metrics.insert("engagement".to_string(), 0.0);
        metrics.insert("authenticity".to_string(), 0.0);
        metrics.insert("coherence".to_string(), 0.0);
        metrics.insert("respectfulness".to_string(), 0.0);
        let result = ScoreResult::validated(metrics, None, None);
        assert!((result.overall_score - (1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn validated_does_not_clamp_out_of_range_overall_score() {
        let result = ScoreResult::validated(HashMap::new(), None, Some(1.5));
        assert_eq!(result.overall_score, 1.5);
    }

    #[test]
    fn fallback_scores_every_metric_at_one_half() {
        let result = ScoreResult::fallback();
        assert!(result.goal_metrics.is_empty());
        assert_eq!(result.overall_score, 0.5);
        assert_eq!(result.general_metrics.len(), GENERAL_METRICS.len());
        assert!(result.general_metrics.values().all(|&v| v == 0.5));
    }

    #[test]
    fn default_initial_branches_cycles_the_fixed_set() {
        let branches = default_initial_branches(5);
        assert_eq!(branches.len(), 5);
        assert_eq!(branches[0], branches[3]);
    }

    #[test]
    fn default_explanation_matches_documented_template() {
        let text = default_explanation(0, 0.42, 7);
        assert_eq!(
            text,
            "Selected response 1 based on MCTS evaluation, score 0.42 over 7 visits."
        );
    }

    #[test]
    fn normalize_branch_count_truncates_excess() {
        let branches = vec!["a".into(), "b".into(), "c".into()];
        let result = normalize_branch_count(branches, 2);
        assert_eq!(result, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn normalize_branch_count_fills_shortfall_from_defaults() {
        let branches = vec!["a".into()];
        let result = normalize_branch_count(branches, 3);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], "a");
        assert_eq!(result[1], DEFAULT_RESPONSES[0]);
        assert_eq!(result[2], DEFAULT_RESPONSES[1]);
    }

    #[test]
    fn normalize_branch_count_fills_entirely_when_empty() {
        let result = normalize_branch_count(Vec::new(), 2);
        assert_eq!(result, default_initial_branches(2));
    }
}
