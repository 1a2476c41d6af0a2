//! Tiered answer-resolution chat engine.
//!
//! Turns an incoming chat message into a reply by escalating through
//! progressively more expensive knowledge sources: a semantic document
//! index, a generative model conditioned on retrieved context, a cached or
//! live web search, and finally unconditioned general knowledge. Each turn
//! records which tier produced the reply and persists both halves of the
//! turn to the history store.

pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod retrieval;
pub mod search;
pub mod types;

// Re-export primary types for convenience
pub use chat::engine::ChatEngine;
pub use chat::VaguenessClassifier;
pub use config::ChatConfig;
pub use error::{ChatError, Stage};
pub use history::{HistoryStore, MemoryStore, SessionStore};
pub use llm::{
    ApiProvider, BlockingGenerator, BlockingSynthesizer, ExternalProvider, GenerationConfig,
    SynthesisPool, Synthesizer,
};
pub use retrieval::{KeywordRetriever, SemanticRetriever};
pub use search::{GoogleSearchProvider, MemorySearchCache, SearchCache, WebSearch};
pub use types::{
    Fragment, Message, Role, SearchCacheEntry, SearchSnippet, Session, Tier, TurnOutcome,
};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
