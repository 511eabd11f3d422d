//! Tracks which models are currently producing a reply, per chat scope.
//!
//! A scope is one place inside a chat where replies are generated (the main
//! thread, a reply thread, a group-chat round). Observers subscribe to a
//! single `(chat_id, scope_id)` pair and only see changes for that pair.

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

/// Identifies one scope inside one chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeKey {
    pub chat_id: String,
    pub scope_id: String,
}

impl ScopeKey {
    pub fn new(chat_id: impl Into<String>, scope_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            scope_id: scope_id.into(),
        }
    }
}

/// The models thinking in one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThinkingState {
    pub models: BTreeSet<String>,
}

impl ThinkingState {
    pub fn is_thinking(&self) -> bool {
        !self.models.is_empty()
    }
}

struct Slot {
    tx: watch::Sender<ThinkingState>,
}

impl Slot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(ThinkingState::default());
        Self { tx }
    }

    /// Idle and unobserved, so it can be dropped from the map.
    fn is_vacant(&self) -> bool {
        !self.tx.borrow().is_thinking() && self.tx.receiver_count() == 0
    }
}

/// Owned store of thinking state; share it by reference or `Arc`.
#[derive(Default)]
pub struct ThinkingTracker {
    slots: Mutex<HashMap<ScopeKey, Slot>>,
}

impl ThinkingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `model` as thinking in the scope. Returns `false` if it already was.
    pub fn start(&self, chat_id: &str, scope_id: &str, model: &str) -> bool {
        let key = ScopeKey::new(chat_id, scope_id);
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_insert_with(Slot::new);
        let added = slot.tx.send_if_modified(|state| state.models.insert(model.to_owned()));
        if added {
            tracing::debug!(chat_id, scope_id, model, "model started thinking");
        }
        added
    }

    /// Mark `model` as done in the scope. Returns `false` if it was not thinking.
    pub fn stop(&self, chat_id: &str, scope_id: &str, model: &str) -> bool {
        let key = ScopeKey::new(chat_id, scope_id);
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get(&key) else {
            return false;
        };
        let removed = slot.tx.send_if_modified(|state| state.models.remove(model));
        if removed {
            tracing::debug!(chat_id, scope_id, model, "model stopped thinking");
        }
        if slot.is_vacant() {
            slots.remove(&key);
        }
        removed
    }

    pub fn is_thinking(&self, chat_id: &str, scope_id: &str) -> bool {
        self.state(chat_id, scope_id).is_thinking()
    }

    /// Models thinking in the scope, sorted.
    pub fn thinking_models(&self, chat_id: &str, scope_id: &str) -> Vec<String> {
        self.state(chat_id, scope_id).models.into_iter().collect()
    }

    pub fn state(&self, chat_id: &str, scope_id: &str) -> ThinkingState {
        self.slots
            .lock()
            .get(&ScopeKey::new(chat_id, scope_id))
            .map(|slot| slot.tx.borrow().clone())
            .unwrap_or_default()
    }

    /// Watch one scope. The receiver starts at the current state and only
    /// changes when that scope does.
    ///
    /// Slots left idle by dropped receivers are released here.
    pub fn subscribe(&self, chat_id: &str, scope_id: &str) -> watch::Receiver<ThinkingState> {
        let mut slots = self.slots.lock();
        slots.retain(|_, slot| !slot.is_vacant());
        slots
            .entry(ScopeKey::new(chat_id, scope_id))
            .or_insert_with(Slot::new)
            .tx
            .subscribe()
    }

    /// Scopes of `chat_id` with at least one model thinking.
    pub fn active_scopes(&self, chat_id: &str) -> Vec<String> {
        let mut slots = self.slots.lock();
        slots.retain(|_, slot| !slot.is_vacant());
        let mut scopes: Vec<String> = slots
            .iter()
            .filter(|(key, slot)| key.chat_id == chat_id && slot.tx.borrow().is_thinking())
            .map(|(key, _)| key.scope_id.clone())
            .collect();
        scopes.sort();
        scopes
    }

    /// Stop every model in every scope of `chat_id` (chat deleted or
    /// generation aborted). Subscribers see the empty state. Returns the
    /// number of scopes that had a model thinking.
    pub fn clear_chat(&self, chat_id: &str) -> usize {
        let mut slots = self.slots.lock();
        let mut cleared = 0;
        for (_, slot) in slots.iter().filter(|(key, _)| key.chat_id == chat_id) {
            if slot.tx.send_if_modified(|state| {
                let had = state.is_thinking();
                state.models.clear();
                had
            }) {
                cleared += 1;
            }
        }
        slots.retain(|key, slot| key.chat_id != chat_id || !slot.is_vacant());
        if cleared > 0 {
            tracing::debug!(chat_id, scopes = cleared, "cleared thinking state");
        }
        cleared
    }
}

impl std::fmt::Debug for ThinkingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThinkingTracker")
            .field("scopes", &self.slots.lock().len())
            .finish()
    }
}
