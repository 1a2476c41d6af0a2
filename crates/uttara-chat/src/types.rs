use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Knowledge source that ultimately produced a reply.
///
/// Ordered from cheapest/most-grounded to most expensive/least-grounded;
/// the engine escalates through these per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Documents,
    GoogleSearchLive,
    GoogleSearchCached,
    GeneralKnowledge,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Documents => "documents",
            Tier::GoogleSearchLive => "google_search_live",
            Tier::GoogleSearchCached => "google_search_cached",
            Tier::GeneralKnowledge => "general_knowledge",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single persisted chat turn half. Immutable once written; ordering
/// within a session is by `created_time` ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub user_id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_time: DateTime<Utc>,
    /// Present only on assistant messages that went through resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

/// Persistent conversation thread, scoped to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub created_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response_tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response_time: Option<DateTime<Utc>>,
}

/// A retrieved chunk of indexed document text with its similarity score.
/// Owned by the external semantic index; the engine only consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
    pub score: f32,
}

/// One web search result, reduced to the snippet the summarizer consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub snippet: String,
}

/// Memoized summary of a live web-search resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    /// The original query as the user typed it (pre-normalization).
    pub query: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of one resolved chat turn. `tier` is `None` only for the
/// canned greeting path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub tier: Option<Tier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&Tier::GoogleSearchLive).unwrap();
        assert_eq!(json, "\"google_search_live\"");
        let back: Tier = serde_json::from_str("\"general_knowledge\"").unwrap();
        assert_eq!(back, Tier::GeneralKnowledge);
    }

    #[test]
    fn tier_display_matches_wire_format() {
        for tier in [
            Tier::Documents,
            Tier::GoogleSearchLive,
            Tier::GoogleSearchCached,
            Tier::GeneralKnowledge,
        ] {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier));
        }
    }

    #[test]
    fn user_message_omits_tier_field() {
        let msg = Message {
            user_id: "u1".into(),
            session_id: "s1".into(),
            role: Role::User,
            content: "hello".into(),
            created_time: Utc::now(),
            tier: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("tier").is_none());
        assert_eq!(json["role"], "user");
    }
}
