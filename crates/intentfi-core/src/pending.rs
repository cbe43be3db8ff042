use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use intentfi_schema::ConversationId;

struct Entry {
    sender: String,
    inserted_at: Instant,
}

/// Conversations forwarded to the collaborator and awaiting its answer.
///
/// Bounded by `capacity`; entries older than `ttl` are dropped. When full,
/// the oldest entry is evicted to make room.
pub struct PendingConversations {
    entries: Mutex<HashMap<ConversationId, Entry>>,
    capacity: usize,
    ttl: Duration,
}

impl PendingConversations {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    pub fn insert(&self, id: ConversationId, sender: impl Into<String>) {
        self.insert_at(id, sender.into(), Instant::now());
    }

    /// Removes and returns the sender waiting on `id`. Consumed at most once.
    pub fn take(&self, id: &ConversationId) -> Option<String> {
        self.take_at(id, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConversationId, Entry>> {
        // a poisoned map only ever holds plain data
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_at(&self, id: ConversationId, sender: String, now: Instant) {
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries.retain(|_, e| now.duration_since(e.inserted_at) < ttl);

        if !entries.contains_key(&id) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::warn!(conversation_id = %oldest, "pending conversation evicted");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            id,
            Entry {
                sender,
                inserted_at: now,
            },
        );
    }

    fn take_at(&self, id: &ConversationId, now: Instant) -> Option<String> {
        let entry = self.lock().remove(id)?;
        if now.duration_since(entry.inserted_at) >= self.ttl {
            tracing::debug!(conversation_id = %id, "pending conversation expired");
            return None;
        }
        Some(entry.sender)
    }
}
