//! Answer synthesis backends.
//!
//! The engine talks to a single [`Synthesizer`] trait; concrete providers
//! live in [`external`] (hosted APIs) or behind [`BlockingSynthesizer`]
//! (in-process models that block a thread). All engine calls go through
//! [`SynthesisPool`], which bounds concurrent generations and applies the
//! configured deadline.

pub mod external;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::SynthesisConfig;
use crate::error::{ChatError, Stage};

pub use external::{ApiProvider, ExternalProvider};

/// Sampling parameters passed to every generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.5,
            top_p: 0.95,
        }
    }
}

impl From<&SynthesisConfig> for GenerationConfig {
    fn from(config: &SynthesisConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// Core trait for answer generation backends.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Generate a completion for a fully rendered prompt.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

/// Synchronous generation backend (in-process model). Wrapped by
/// [`BlockingSynthesizer`] so the call runs on the blocking thread pool
/// instead of stalling the cooperative scheduler.
pub trait BlockingGenerator: Send + Sync + 'static {
    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

/// Adapter that offloads a [`BlockingGenerator`] onto `spawn_blocking`.
pub struct BlockingSynthesizer<G> {
    inner: Arc<G>,
}

impl<G: BlockingGenerator> BlockingSynthesizer<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<G: BlockingGenerator> Synthesizer for BlockingSynthesizer<G> {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let inner = self.inner.clone();
        let prompt = prompt.to_string();
        let config = config.clone();
        tokio::task::spawn_blocking(move || inner.generate(&prompt, &config))
            .await
            .map_err(|e| anyhow!("synthesis worker panicked: {}", e))?
    }
}

/// Bounded front door for all generation calls. A semaphore caps the number
/// of generations in flight across all sessions, and every call carries the
/// configured deadline.
pub struct SynthesisPool {
    provider: Arc<dyn Synthesizer>,
    permits: Arc<Semaphore>,
    deadline: Duration,
    generation: GenerationConfig,
}

impl SynthesisPool {
    pub fn new(
        provider: Arc<dyn Synthesizer>,
        max_concurrent: usize,
        deadline: Duration,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            deadline,
            generation,
        }
    }

    /// Generate under the pool's concurrency bound and deadline. The
    /// deadline covers generation only, not time spent queued for a permit.
    pub async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ChatError::Synthesis(anyhow!("synthesis pool closed")))?;

        let waited_ms = self.deadline.as_millis() as u64;
        match tokio::time::timeout(self.deadline, self.provider.generate(prompt, &self.generation))
            .await
        {
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(e)) => Err(ChatError::Synthesis(e)),
            Err(_) => Err(ChatError::Timeout {
                stage: Stage::Synthesis,
                waited_ms,
            }),
        }
    }

    /// Permits currently available (observability hook).
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
