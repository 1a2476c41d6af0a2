//! Typed failure taxonomy for the resolution pipeline.
//!
//! Collaborators return `anyhow::Result` at their boundaries; the engine
//! maps each outcome into one of these variants so callers can
//! pattern-match instead of catching broad errors. Recovered failures
//! (title generation, cache writes, search fallback) never surface here —
//! they are logged and absorbed inside the engine.

use thiserror::Error;

/// Pipeline stage names, used for timeout attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieval,
    Synthesis,
    Search,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Retrieval => "semantic retrieval",
            Stage::Synthesis => "answer synthesis",
            Stage::Search => "web search",
        };
        f.write_str(name)
    }
}

/// An unrecovered turn failure. The turn produced no reply and, unless the
/// failure happened during the final writes, nothing was persisted.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The semantic index was unreachable or errored. Not locally
    /// recoverable; the turn fails with nothing persisted.
    #[error("semantic retrieval failed")]
    Retrieval(#[source] anyhow::Error),

    /// Generation failed on the primary documents or search-summary path.
    /// The turn fails rather than silently degrading.
    #[error("answer synthesis failed")]
    Synthesis(#[source] anyhow::Error),

    /// Web search was unreachable. Normally recovered by falling through
    /// to general knowledge; kept in the taxonomy for callers that invoke
    /// the search collaborator directly.
    #[error("web search fallback failed")]
    SearchFallback(#[source] anyhow::Error),

    /// History or session write failed. A failure between the user-message
    /// and assistant-message writes can leave an orphaned turn; no
    /// transaction spans the two writes.
    #[error("history persistence failed")]
    Persistence(#[source] anyhow::Error),

    /// A stage exceeded its configured deadline.
    #[error("{stage} timed out after {waited_ms}ms")]
    Timeout { stage: Stage, waited_ms: u64 },
}
