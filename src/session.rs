use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::llm::{ChatBackend, ChatContext, Turn};

/// Session key used by callers that do not supply one.
pub const DEFAULT_SESSION: &str = "default";

/// What every new conversation handle is bound to
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub system_instruction: String,
}

impl From<&RelayConfig> for SessionSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_instruction: config.system_instruction.clone(),
        }
    }
}

/// Conversation handle: the state of one remote chat session
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    settings: SessionSettings,
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Send a prompt through `backend`; the turn is recorded only when the call succeeds.
    pub async fn send_message(&mut self, backend: &dyn ChatBackend, prompt: &str) -> Result<String> {
        let context = ChatContext {
            model: &self.settings.model,
            system_instruction: &self.settings.system_instruction,
            history: &self.turns,
        };
        let reply = backend.send_message(context, prompt).await?;

        self.turns.push(Turn::user(prompt));
        self.turns.push(Turn::model(reply.clone()));
        Ok(reply)
    }
}

/// A handle shared between requests; the async mutex allows one in-flight send per handle.
pub type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

/// Keyed handles kept by default before the least recently used is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Longest session key a caller may supply, in characters.
pub const MAX_SESSION_KEY_LEN: usize = 128;

struct Slot {
    session: SharedSession,
    last_used: u64,
}

#[derive(Default)]
struct Slots {
    by_key: HashMap<String, Slot>,
    clock: u64,
}

impl Slots {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Handles other than the default one
    fn keyed(&self) -> usize {
        self.by_key.len() - usize::from(self.by_key.contains_key(DEFAULT_SESSION))
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .by_key
            .iter()
            .filter(|(key, _)| key.as_str() != DEFAULT_SESSION)
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.by_key.remove(&key);
            tracing::debug!(session = %key, "idle chat session evicted");
        }
    }
}

/// Conversation handles keyed by caller-supplied session key.
///
/// At most `max_sessions` keyed handles are kept; the default handle is never evicted.
pub struct SessionStore {
    settings: SessionSettings,
    max_sessions: usize,
    sessions: Mutex<Slots>,
}

impl SessionStore {
    /// Create the store along with the default handle.
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_limit(settings, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_limit(settings: SessionSettings, max_sessions: usize) -> Self {
        let store = Self {
            settings,
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(Slots::default()),
        };
        store.handle(DEFAULT_SESSION);
        store
    }

    /// Get the handle for `key`, creating it on first use.
    pub fn handle(&self, key: &str) -> SharedSession {
        let mut slots = self.sessions.lock();
        let now = slots.tick();
        if let Some(slot) = slots.by_key.get_mut(key) {
            slot.last_used = now;
            return slot.session.clone();
        }

        if key != DEFAULT_SESSION {
            while slots.keyed() >= self.max_sessions {
                slots.evict_least_recent();
            }
        }

        let session = self.fresh();
        tracing::info!(session = key, "new stateful chat session started");
        slots.by_key.insert(
            key.to_string(),
            Slot {
                session: session.clone(),
                last_used: now,
            },
        );
        session
    }

    /// Discard the handle for `key` and bind a brand-new one in its place.
    ///
    /// Returns false when `key` has no handle; nothing is created then.
    /// Sends already holding the old handle finish against it; it is dropped afterwards.
    pub fn reset(&self, key: &str) -> bool {
        let mut slots = self.sessions.lock();
        let now = slots.tick();
        let Some(slot) = slots.by_key.get_mut(key) else {
            tracing::debug!(session = key, "reset for unknown session ignored");
            return false;
        };
        slot.session = self.fresh();
        slot.last_used = now;
        tracing::info!(session = key, "chat session reset");
        true
    }

    /// Number of live handles, the default one included
    pub fn len(&self) -> usize {
        self.sessions.lock().by_key.len()
    }

    fn fresh(&self) -> SharedSession {
        Arc::new(tokio::sync::Mutex::new(ChatSession::new(self.settings.clone())))
    }
}
