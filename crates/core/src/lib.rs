#![warn(missing_docs)]

//! Shared types and transport traits for conversation MCTS implementations.
//!
//! This crate provides the common abstractions that the search engine and
//! any concrete oracle adapters build on: conversation messages, shared
//! error types, and the generic [`ModelClient`] transport trait.

pub mod client;
pub mod error;
pub mod message;

pub use client::{ContentItem, ModelClient, Prompt, ResponseEvent, ResponseItem, TokenUsage};
pub use error::{CoreError, Result};
pub use message::{Message, Role};

/// Core version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
