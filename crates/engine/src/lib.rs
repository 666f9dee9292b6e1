#![warn(missing_docs)]

//! Conversation MCTS - explores candidate chat replies via Monte Carlo
//! Tree Search and picks the best one.
//!
//! Each iteration selects a promising branch with UCB1, asks a
//! [`ResponseGen`] oracle for a continuation, rolls the conversation
//! forward with a [`Simulator`], and scores the result with a
//! [`Scorer`]. A final [`Analyzer`] pass picks the winning branch and
//! explains the choice.
//!
//! ## Example
//!
//! ```ignore
//! use convo_mcts_engine::{Orchestrator, SearchConfig};
//! use convo_mcts_core::Message;
//!
//! let orchestrator = Orchestrator::new(response_gen, simulator, scorer, analyzer);
//! let analysis = orchestrator.analyze(&history, SearchConfig::default(), None).await?;
//! println!("Best reply: {}", analysis.best_response);
//! ```

pub use convo_mcts_core::{Message, Role};

pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod json_util;
pub mod node;
pub mod oracle;
pub mod orchestrator;
pub mod tree_ops;

pub use analyzer::{AnalysisResult, Branch, BranchAnalyzer};
pub use config::SearchConfig;
pub use engine::{SearchEngine, SearchStats};
pub use error::{EngineError, Result};
pub use node::{Node, NodeId};
pub use oracle::{Analyzer, ResponseGen, ScoreResult, Scorer, SimulationResult, Simulator};
pub use orchestrator::{ConversationAnalysis, Orchestrator, ScoreStats};
pub use tree_ops::Tree;

/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
