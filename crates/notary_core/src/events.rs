//! Notarization event fan-out to external observers.
//!
//! # Responsibility
//! - Deliver `DocumentNotarized` to registered observers.
//!
//! # Invariants
//! - Emission happens only after the binding transaction committed.
//! - Exactly one emission per successful bind; reads and rejected calls never
//!   emit.
//! - The emitter keeps no record of emitted events.

use crate::model::binding::DocumentNotarized;
use log::info;
use std::sync::Arc;

/// Receiver of notarization events.
pub trait NotarizationObserver: Send + Sync {
    fn on_document_notarized(&self, event: &DocumentNotarized);
}

/// Observer that writes one structured log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl NotarizationObserver for LogObserver {
    fn on_document_notarized(&self, event: &DocumentNotarized) {
        info!(
            "event=document_notarized module=events status=ok org={} doc_id={} digest={} timestamp={}",
            event.org,
            event.id,
            event.digest,
            event.timestamp
        );
    }
}

/// Ordered list of observers.
#[derive(Clone, Default)]
pub struct EventEmitter {
    observers: Vec<Arc<dyn NotarizationObserver>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitter with the structured log observer attached.
    pub fn with_log_observer() -> Self {
        let mut emitter = Self::new();
        emitter.subscribe(Arc::new(LogObserver));
        emitter
    }

    pub fn subscribe(&mut self, observer: Arc<dyn NotarizationObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notifies observers in subscription order.
    pub fn emit(&self, event: &DocumentNotarized) {
        for observer in &self.observers {
            observer.on_document_notarized(event);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("observers", &self.observers.len())
            .finish()
    }
}
