//! Deduplication of discovered attribute paths.

use std::collections::HashSet;
use std::sync::Mutex;

/// The set of attribute paths that have ever been queued for description.
///
/// This is the only state shared between workers. Insertion doubles as the
/// scheduling decision: whichever caller inserts first owns the work unit.
/// Paths are never removed.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path`, returning true when it was not seen before. The
    /// caller that gets true must schedule the description.
    pub fn try_insert(&self, path: &str) -> bool {
        let mut inner = self.inner.lock().expect("visited set mutex poisoned");
        inner.insert(path.to_owned())
    }

    /// Number of distinct paths seen so far.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("visited set mutex poisoned").len()
    }
}
