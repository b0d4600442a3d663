//! The registry of active inbound consumers.
//!
//! Reads vastly outnumber writes here: every inbound request performs a
//! lookup, while attach/detach only happen when routes are added or
//! removed.  The registry therefore keeps an immutable snapshot behind an
//! [`ArcSwap`]: lookups are lock-free, and writers clone-and-replace the
//! snapshot under a small mutex.  A consumer detached while a request is in
//! flight stays alive through the request's own `Arc`, so delivery either
//! completes or the next lookup misses — never a crash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::debug;

use crate::consumer::Consumer;

/// Opaque handle identifying an attached consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerHandle(u64);

#[derive(Clone)]
struct Entry {
    id: u64,
    consumer: Arc<Consumer>,
}

/// Copy-on-write set of attached consumers.
pub struct ConsumerRegistry {
    snapshot: ArcSwap<Vec<Entry>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a consumer; later requests observe it atomically.
    pub fn attach(&self, consumer: Consumer) -> ConsumerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry { id, consumer: Arc::new(consumer) };
        debug!(
            path = %entry.consumer.effective_path,
            service = %entry.consumer.definition.name,
            "attaching consumer"
        );

        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = (**self.snapshot.load()).clone();
        next.push(entry);
        self.snapshot.store(Arc::new(next));
        ConsumerHandle(id)
    }

    /// Remove a consumer.  Requests already dispatched to it complete
    /// normally; returns `false` if the handle was already detached.
    pub fn detach(&self, handle: ConsumerHandle) -> bool {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot.load();
        if !current.iter().any(|e| e.id == handle.0) {
            return false;
        }
        let next: Vec<Entry> = current
            .iter()
            .filter(|e| e.id != handle.0)
            .cloned()
            .collect();
        debug!(handle = handle.0, "detaching consumer");
        self.snapshot.store(Arc::new(next));
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Select the consumer for a request, or `None` for a 404.
    ///
    /// Candidates share the request path and satisfy all their filters.
    /// Among those, the one with strictly more filters wins; ties go to
    /// the earliest attached.  The result is a pure function of the
    /// snapshot and the request.
    pub fn lookup(&self, path: &str, headers: &HashMap<String, String>) -> Option<Arc<Consumer>> {
        let snapshot = self.snapshot.load();
        let mut best: Option<&Entry> = None;
        for entry in snapshot.iter() {
            if entry.consumer.effective_path != path || !entry.consumer.matches(headers) {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => {
                    entry.consumer.filter_count() > current.consumer.filter_count()
                }
            };
            if better {
                best = Some(entry);
            }
        }
        best.map(|e| e.consumer.clone())
    }
}
