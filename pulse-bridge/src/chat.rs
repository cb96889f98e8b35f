//! The conversational assistant and its session store.
//!
//! One turn: assemble the context, gate on the cached health probe,
//! generate, validate, and fall back. `process_message` never returns
//! an error — the worst case is the capability statement. Conversation
//! history is an explicitly owned, per-user session store with idle
//! eviction and explicit clear, not ambient global state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use pulse_pipeline::record_store::RecordStore;

use crate::answers::deterministic_answer;
use crate::context::{CompactContext, ContextAssembler};
use crate::llm::LlmClient;
use crate::response_validator::{format_reply, validate};

/// Sessions idle longer than this are evicted on the next access.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One message in a conversation.
#[derive(Clone, Debug, Serialize)]
pub struct ChatTurn {
    /// "user" or "assistant".
    pub role: &'static str,
    pub content: String,
    pub at: DateTime<Utc>,
}

struct Conversation {
    turns: Vec<ChatTurn>,
    last_active: Instant,
}

/// Per-user conversation history. Last write wins; no cross-process
/// consistency.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Conversation>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Append a turn to a user's conversation, evicting idle sessions
    /// on the way in.
    pub fn record(&self, user_id: &str, role: &'static str, content: &str) {
        let mut sessions = self.sessions.lock();
        let timeout = self.idle_timeout;
        sessions.retain(|_, conv| conv.last_active.elapsed() < timeout);
        let conversation = sessions.entry(user_id.to_string()).or_insert(Conversation {
            turns: Vec::new(),
            last_active: Instant::now(),
        });
        conversation.turns.push(ChatTurn {
            role,
            content: content.to_string(),
            at: Utc::now(),
        });
        conversation.last_active = Instant::now();
    }

    /// Read a user's history. Idle-evicted or unknown users read empty.
    pub fn history(&self, user_id: &str) -> Vec<ChatTurn> {
        let sessions = self.sessions.lock();
        sessions
            .get(user_id)
            .filter(|conv| conv.last_active.elapsed() < self.idle_timeout)
            .map(|conv| conv.turns.clone())
            .unwrap_or_default()
    }

    /// Explicitly drop a user's conversation.
    pub fn clear(&self, user_id: &str) {
        self.sessions.lock().remove(user_id);
    }
}

/// One chat turn's result.
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub context: CompactContext,
    pub suggestions: Vec<String>,
}

/// The conversational analytics assistant.
pub struct Assistant {
    llm: Option<LlmClient>,
    assembler: ContextAssembler,
    sessions: SessionStore,
}

impl Assistant {
    /// An assistant with a model endpoint. `None` means deterministic
    /// answers only.
    pub fn new(llm: Option<LlmClient>) -> Self {
        Self {
            llm,
            assembler: ContextAssembler::default(),
            sessions: SessionStore::default(),
        }
    }

    pub fn with_assembler(llm: Option<LlmClient>, assembler: ContextAssembler) -> Self {
        Self {
            llm,
            assembler,
            sessions: SessionStore::default(),
        }
    }

    /// Answer one user message. Infallible: every failure path lands on
    /// the deterministic answer for the same context.
    pub async fn process_message(
        &self,
        store: &RecordStore,
        user_id: &str,
        message: &str,
    ) -> ChatReply {
        let context = self.assembler.build(message, store, user_id);
        log::debug!(
            "chat turn for {user_id}: {} ({} customers in context)",
            context.intent.describe(),
            context.total_customers
        );
        self.sessions.record(user_id, "user", message);

        let response = match &self.llm {
            Some(llm) if llm.is_healthy().await => {
                let prompt = self.build_prompt(&context, message);
                match llm.generate(&prompt).await {
                    Ok(raw) => match validate(&raw, &context) {
                        Ok(reply) => format_reply(&reply),
                        Err(failure) => {
                            log::warn!("model reply rejected ({failure}); using fallback answer");
                            deterministic_answer(&context)
                        }
                    },
                    Err(err) => {
                        log::warn!("model call failed ({err}); using fallback answer");
                        deterministic_answer(&context)
                    }
                }
            }
            _ => deterministic_answer(&context),
        };

        self.sessions.record(user_id, "assistant", &response);
        let suggestions = context
            .intent
            .suggestions()
            .iter()
            .map(|s| s.to_string())
            .collect();
        ChatReply {
            response,
            context,
            suggestions,
        }
    }

    /// Read a user's conversation history.
    pub fn history(&self, user_id: &str) -> Vec<ChatTurn> {
        self.sessions.history(user_id)
    }

    /// Clear a user's conversation history.
    pub fn clear_history(&self, user_id: &str) {
        self.sessions.clear(user_id)
    }

    fn build_prompt(&self, context: &CompactContext, message: &str) -> String {
        let context_json = self.assembler.to_prompt_json(context);
        format!(
            "You are a CRM analytics assistant. Answer strictly from the \
             customer data below; do not invent customers or numbers.\n\n\
             Customer data:\n{context_json}\n\n\
             Question: {message}\n\n\
             Reply with a single JSON object: {{\"answer\": \"...\", \
             \"references\": [\"company names you used\"], \
             \"actions\": [\"suggested next steps\"]}}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_history_round_trip() {
        let sessions = SessionStore::default();
        sessions.record("u1", "user", "hello");
        sessions.record("u1", "assistant", "hi");
        let history = sessions.history("u1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].content, "hi");
    }

    #[test]
    fn sessions_are_per_user() {
        let sessions = SessionStore::default();
        sessions.record("u1", "user", "mine");
        assert!(sessions.history("u2").is_empty());
    }

    #[test]
    fn clear_empties_history() {
        let sessions = SessionStore::default();
        sessions.record("u1", "user", "hello");
        sessions.clear("u1");
        assert!(sessions.history("u1").is_empty());
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let sessions = SessionStore::new(Duration::from_millis(0));
        sessions.record("u1", "user", "hello");
        // Zero timeout: anything already recorded reads as expired.
        assert!(sessions.history("u1").is_empty());
        // And the next write sweeps it out of the map entirely.
        sessions.record("u2", "user", "hi");
        assert!(sessions.history("u1").is_empty());
    }
}
