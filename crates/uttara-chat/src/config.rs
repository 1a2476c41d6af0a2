use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chat::{DEFAULT_GREETINGS, DEFAULT_VAGUE_PHRASES, GREETING_REPLY};

/// Engine configuration. Every knob the resolution pipeline consults lives
/// here; collaborator clients (model endpoint, search credentials) are
/// configured on the collaborators themselves at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub data_dir: PathBuf,
    pub history: HistoryConfig,
    pub retrieval: RetrievalConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub synthesis: SynthesisConfig,
    pub timeouts: TimeoutConfig,
    /// Messages that get the canned reply with no retrieval at all.
    /// Matched after trim + lowercase, exact.
    pub greetings: Vec<String>,
    pub greeting_reply: String,
    /// Substrings that mark a synthesized answer as non-informative.
    /// Conservative by construction: over-triggering escalates, which is
    /// the accepted tradeoff.
    pub vague_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// How many recent messages feed the synthesizer as context.
    pub recent_limit: usize,
    /// Title generation runs only while the session holds at most this
    /// many messages.
    pub title_message_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub num_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    /// Entry lifetime in seconds; `None` disables expiry.
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Upper bound on generations in flight across all sessions.
    pub max_concurrent: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

/// Per-stage deadlines. A search timeout degrades to general knowledge;
/// retrieval and synthesis timeouts fail the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub retrieval_ms: u64,
    pub synthesis_ms: u64,
    pub search_ms: u64,
}

impl ChatConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.history.recent_limit == 0 {
            return Err("history.recent_limit must be > 0".into());
        }
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be > 0".into());
        }
        if self.search.num_results == 0 {
            return Err("search.num_results must be > 0".into());
        }
        if self.cache.capacity == 0 {
            return Err("cache.capacity must be > 0".into());
        }
        if self.synthesis.max_concurrent == 0 {
            return Err("synthesis.max_concurrent must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.synthesis.temperature) {
            return Err("synthesis.temperature must be in [0.0, 2.0]".into());
        }
        if !(0.0..=1.0).contains(&self.synthesis.top_p) {
            return Err("synthesis.top_p must be in [0.0, 1.0]".into());
        }
        if self.timeouts.retrieval_ms == 0
            || self.timeouts.synthesis_ms == 0
            || self.timeouts.search_ms == 0
        {
            return Err("timeouts must be > 0".into());
        }
        if self.greetings.is_empty() {
            return Err("greetings must not be empty".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, validating the result.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("uttara-chat");

        Self {
            data_dir,
            history: HistoryConfig {
                recent_limit: 10,
                title_message_threshold: 2,
            },
            retrieval: RetrievalConfig { top_k: 5 },
            search: SearchConfig { num_results: 5 },
            cache: CacheConfig {
                capacity: 1024,
                ttl_secs: Some(7 * 24 * 3600),
            },
            synthesis: SynthesisConfig {
                max_concurrent: 4,
                max_tokens: 2048,
                temperature: 0.5,
                top_p: 0.95,
            },
            timeouts: TimeoutConfig {
                retrieval_ms: 10_000,
                synthesis_ms: 60_000,
                search_ms: 10_000,
            },
            greetings: DEFAULT_GREETINGS.iter().map(|s| s.to_string()).collect(),
            greeting_reply: GREETING_REPLY.to_string(),
            vague_phrases: DEFAULT_VAGUE_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChatConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_recent_limit_is_rejected() {
        let mut config = ChatConfig::default();
        config.history.recent_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut config = ChatConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_greeting_set_is_rejected() {
        let mut config = ChatConfig::default();
        config.greetings.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ChatConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ChatConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(back.vague_phrases.len(), config.vague_phrases.len());
    }
}
