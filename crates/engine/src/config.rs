//! Search configuration and its defaults.

use crate::error::{EngineError, Result};

/// Tunables for a single search run.
///
/// Defaults mirror the values the search has historically been tuned
/// with; callers that don't have an opinion should use [`SearchConfig::default`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of MCTS iterations to run.
    pub iterations: usize,
    /// Number of initial branches to fan out from the root.
    pub num_branches: usize,
    /// Maximum children a node may have before it stops expanding.
    pub max_children: usize,
    /// How many simulated turns deep a rollout goes.
    pub simulation_depth: usize,
    /// UCB1 exploration weight (`k` in the select formula).
    pub exploration_constant: f64,
    /// Run pruning every this many iterations. Zero disables pruning.
    pub pruning_interval: usize,
    /// A descendant is pruned when its avg_score falls below
    /// `root.avg_score * pruning_threshold_ratio`.
    pub pruning_threshold_ratio: f64,
    /// Nodes visited fewer than this many times are never pruned.
    pub min_visits_for_pruning: u32,
    /// Maximum tokens a single oracle call may spend.
    pub max_tokens: usize,
    /// Optional steering goal threaded through every oracle call.
    pub goal: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            num_branches: 5,
            max_children: 3,
            simulation_depth: 3,
            exploration_constant: std::f64::consts::SQRT_2,
            pruning_interval: 5,
            pruning_threshold_ratio: 0.7,
            min_visits_for_pruning: 5,
            max_tokens: 250,
            goal: None,
        }
    }
}

impl SearchConfig {
    /// Check that every value is in a usable range.
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(EngineError::InvalidConfig("iterations must be positive".into()));
        }
        if self.num_branches == 0 {
            return Err(EngineError::InvalidConfig("num_branches must be positive".into()));
        }
        if self.max_children == 0 {
            return Err(EngineError::InvalidConfig("max_children must be positive".into()));
        }
        if self.simulation_depth == 0 {
            return Err(EngineError::InvalidConfig("simulation_depth must be positive".into()));
        }
        if self.exploration_constant <= 0.0 {
            return Err(EngineError::InvalidConfig("exploration_constant must be positive".into()));
        }
        if self.pruning_threshold_ratio <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "pruning_threshold_ratio must be positive".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(EngineError::InvalidConfig("max_tokens must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_iterations_rejected() {
        let cfg = SearchConfig {
            iterations: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn non_positive_exploration_constant_rejected() {
        let cfg = SearchConfig {
            exploration_constant: 0.0,
            ..SearchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
