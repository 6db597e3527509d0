//! Status events for observers of a running extraction.
//!
//! This is the channel a UI hangs off. Delivery is best-effort and never
//! applies back-pressure to the crawl; with no observer attached events
//! are dropped without cost.

#![allow(dead_code)] // Event payloads are for observers; the built-in progress view reads a subset

use std::sync::mpsc::Sender;

/// Progress events reported by the crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A new attribute path entered the work queue.
    Queued { attribute_path: String },
    /// A worker started describing the path.
    Started { attribute_path: String },
    /// The path was described and its record emitted.
    Described { attribute_path: String },
    /// Description failed; `kind` is the error category. No record is
    /// emitted for this path.
    Failed {
        attribute_path: String,
        kind: &'static str,
    },
    /// The finder stream ended; only dependency edges can queue work now.
    FinderDone,
    /// The pool drained and the sink flushed; no further events follow.
    Drained,
}

/// Handle used by the crawler to report events.
#[derive(Debug, Clone, Default)]
pub struct StatusSender {
    tx: Option<Sender<StatusEvent>>,
}

impl StatusSender {
    /// A sender that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(tx: Sender<StatusEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Send without blocking; a gone observer never fails the crawl.
    pub fn emit(&self, event: StatusEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
