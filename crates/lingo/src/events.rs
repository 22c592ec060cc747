//! Translation lifecycle events.
//!
//! The namespace manager and dynamic store emit these on a broadcast
//! channel. Emission never blocks: subscribers that fall behind lose the
//! oldest events (standard broadcast semantics), which is acceptable for a
//! notification stream.

use tokio::sync::broadcast;

use crate::types::LanguageCode;

/// A lifecycle notification about the translation corpus.
#[derive(Debug, Clone)]
pub enum TranslationEvent {
    Created {
        namespace: String,
        key: String,
        language: LanguageCode,
    },
    Updated {
        namespace: String,
        key: String,
        language: LanguageCode,
        old: Option<String>,
        new: String,
    },
    Deleted {
        namespace: String,
        key: String,
        language: LanguageCode,
    },
    NamespaceReloaded {
        namespace: String,
        count: usize,
    },
}

/// Broadcast fan-out for [`TranslationEvent`].
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TranslationEvent>,
}

impl EventBus {
    /// A bus with the given buffered capacity per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<TranslationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Never blocks; with no subscribers the event is
    /// silently dropped.
    pub fn emit(&self, event: TranslationEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
