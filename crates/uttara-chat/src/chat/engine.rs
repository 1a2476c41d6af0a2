//! Tiered answer-resolution state machine.
//!
//! One [`ChatEngine::resolve_turn`] call handles one chat turn, escalating
//! through progressively more expensive knowledge sources:
//!
//! greeting short-circuit → document retrieval + synthesis → (vague?) →
//! search cache → live web search + summary → general knowledge.
//!
//! Within a turn the stages are strictly sequential — each stage's output
//! decides whether the next runs at all. Collaborators are injected
//! service objects shared via `Arc`; the engine holds no global state.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::chat::{
    document_answer_prompt, general_knowledge_prompt, is_greeting, is_meaningful_message,
    search_summary_prompt, title_prompt, VaguenessClassifier,
};
use crate::config::ChatConfig;
use crate::error::{ChatError, Stage};
use crate::history::{HistoryStore, SessionStore};
use crate::llm::{GenerationConfig, SynthesisPool, Synthesizer};
use crate::retrieval::SemanticRetriever;
use crate::search::{SearchCache, WebSearch};
use crate::types::{Message, Role, Tier, TurnOutcome};

pub struct ChatEngine {
    config: ChatConfig,
    retriever: Arc<dyn SemanticRetriever>,
    synthesis: Arc<SynthesisPool>,
    search: Arc<dyn WebSearch>,
    cache: Arc<dyn SearchCache>,
    history: Arc<dyn HistoryStore>,
    sessions: Arc<dyn SessionStore>,
    vagueness: VaguenessClassifier,
}

impl ChatEngine {
    pub fn new(
        config: ChatConfig,
        retriever: Arc<dyn SemanticRetriever>,
        synthesizer: Arc<dyn Synthesizer>,
        search: Arc<dyn WebSearch>,
        cache: Arc<dyn SearchCache>,
        history: Arc<dyn HistoryStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let synthesis = Arc::new(SynthesisPool::new(
            synthesizer,
            config.synthesis.max_concurrent,
            Duration::from_millis(config.timeouts.synthesis_ms),
            GenerationConfig::from(&config.synthesis),
        ));
        let vagueness = VaguenessClassifier::new(&config.vague_phrases);
        Self {
            config,
            retriever,
            synthesis,
            search,
            cache,
            history,
            sessions,
            vagueness,
        }
    }

    /// Resolve one chat turn. On success the user and assistant messages are
    /// persisted and the session's last-response fields updated; on error
    /// nothing is persisted (unless the failure was the persistence itself).
    pub async fn resolve_turn(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, ChatError> {
        if is_greeting(message, &self.config.greetings) {
            let reply = self.config.greeting_reply.clone();
            self.persist_turn(user_id, session_id, message, &reply, None)
                .await?;
            tracing::debug!(session_id, "greeting short-circuit");
            return Ok(TurnOutcome { reply, tier: None });
        }

        let recent = self
            .history
            .recent(user_id, session_id, self.config.history.recent_limit)
            .await
            .map_err(ChatError::Persistence)?;
        let mut chronological = recent;
        chronological.reverse();

        // Independent side effect; never awaited, never fails the turn.
        self.maybe_spawn_title_task(session_id, message).await;

        let fragments = {
            let deadline = Duration::from_millis(self.config.timeouts.retrieval_ms);
            let fut = self
                .retriever
                .retrieve(message, self.config.retrieval.top_k);
            match tokio::time::timeout(deadline, fut).await {
                Ok(Ok(fragments)) => fragments,
                Ok(Err(e)) => return Err(ChatError::Retrieval(e)),
                Err(_) => {
                    return Err(ChatError::Timeout {
                        stage: Stage::Retrieval,
                        waited_ms: self.config.timeouts.retrieval_ms,
                    })
                }
            }
        };

        let (reply, tier) = if !fragments.is_empty() {
            let prompt = document_answer_prompt(message, &fragments, &chronological);
            let answer = self.synthesis.generate(&prompt).await?;
            if self.vagueness.is_vague(&answer) {
                tracing::info!(session_id, "documents answer judged vague, escalating");
                self.escalate_search(message).await?
            } else {
                (answer, Tier::Documents)
            }
        } else if let Some(entry) = self.cached_summary(message).await {
            tracing::info!(session_id, "search cache hit");
            (entry, Tier::GoogleSearchCached)
        } else {
            self.escalate_search(message).await?
        };

        self.persist_turn(user_id, session_id, message, &reply, Some(tier))
            .await?;
        self.sessions
            .update_tier(session_id, tier, Utc::now())
            .await
            .map_err(ChatError::Persistence)?;

        tracing::info!(session_id, %tier, "turn resolved");
        Ok(TurnOutcome {
            reply,
            tier: Some(tier),
        })
    }

    /// Live search → summary, or general knowledge when search yields
    /// nothing (including provider failure and timeout — both recoverable).
    async fn escalate_search(&self, message: &str) -> Result<(String, Tier), ChatError> {
        if let Some(snippets) = self.search_snippets(message).await {
            let combined = snippets.join("\n\n");
            let reply = self
                .synthesis
                .generate(&search_summary_prompt(&combined))
                .await?;
            if let Err(e) = self.cache.put(message, &reply, Utc::now()).await {
                // Forfeits future hits for this query, nothing more.
                tracing::warn!(error = %e, "search cache write failed");
            }
            Ok((reply, Tier::GoogleSearchLive))
        } else {
            let reply = self
                .synthesis
                .generate(&general_knowledge_prompt(message))
                .await?;
            Ok((reply, Tier::GeneralKnowledge))
        }
    }

    /// Top-n snippets, or `None` when the provider returned nothing, errored,
    /// or timed out.
    async fn search_snippets(&self, query: &str) -> Option<Vec<String>> {
        let deadline = Duration::from_millis(self.config.timeouts.search_ms);
        let fut = self.search.search(query, self.config.search.num_results);
        match tokio::time::timeout(deadline, fut).await {
            Ok(Ok(results)) if !results.is_empty() => Some(
                results
                    .into_iter()
                    .take(self.config.search.num_results)
                    .map(|r| r.snippet)
                    .collect(),
            ),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "web search failed, falling back to general knowledge");
                None
            }
            Err(_) => {
                tracing::warn!(
                    waited_ms = self.config.timeouts.search_ms,
                    "web search timed out, falling back to general knowledge"
                );
                None
            }
        }
    }

    /// Cache lookup keyed by the raw message. Read failures degrade to a
    /// miss — only the write path is part of the error taxonomy.
    async fn cached_summary(&self, message: &str) -> Option<String> {
        match self.cache.get(message).await {
            Ok(entry) => entry.map(|e| e.summary),
            Err(e) => {
                tracing::warn!(error = %e, "search cache read failed, treating as miss");
                None
            }
        }
    }

    /// Persist the turn as two sequential message writes (user, then
    /// assistant) sharing one timestamp. No transaction spans them.
    async fn persist_turn(
        &self,
        user_id: &str,
        session_id: &str,
        user_msg: &str,
        reply: &str,
        tier: Option<Tier>,
    ) -> Result<(), ChatError> {
        let now = Utc::now();
        let messages = vec![
            Message {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                role: Role::User,
                content: user_msg.to_string(),
                created_time: now,
                tier: None,
            },
            Message {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                role: Role::Assistant,
                content: reply.to_string(),
                created_time: now,
                tier,
            },
        ];
        self.history
            .append(messages)
            .await
            .map_err(ChatError::Persistence)
    }

    /// Fire-and-forget session titling. The count check runs inline (cheap
    /// CRUD, and it must see the pre-turn count); generation and the title
    /// write are spawned so the primary reply never waits on them.
    async fn maybe_spawn_title_task(&self, session_id: &str, message: &str) {
        let count = match self.history.count_messages(session_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "message count for title check failed");
                return;
            }
        };
        if count > self.config.history.title_message_threshold {
            return;
        }
        if !is_meaningful_message(message) {
            return;
        }

        let synthesis = self.synthesis.clone();
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();
        let message = message.to_string();
        tokio::spawn(async move {
            match synthesis.generate(&title_prompt(&message)).await {
                Ok(title) => {
                    let title = title.trim().trim_matches('"').to_string();
                    if let Err(e) = sessions.update_title(&session_id, &title).await {
                        tracing::warn!(%session_id, error = %e, "session title update failed");
                    } else {
                        tracing::debug!(%session_id, %title, "session titled");
                    }
                }
                Err(e) => tracing::warn!(%session_id, error = %e, "title generation failed"),
            }
        });
    }
}
