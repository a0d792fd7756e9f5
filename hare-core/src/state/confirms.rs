//! Publisher-confirm bookkeeping.
//!
//! Tags are handed out in publish order starting at 1, so the outstanding
//! set is always sorted and a cumulative ack removes a prefix of it.

use std::collections::VecDeque;

/// Result of applying a `basic.ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckOutcome {
    /// Number of outstanding tags retired.
    pub removed: usize,
    /// The outstanding set went from non-empty to empty.
    pub drained: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmTracker {
    /// `0` while confirms are disabled.
    next_delivery_tag: u64,
    unconfirmed: VecDeque<u64>,
}

impl ConfirmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.next_delivery_tag > 0
    }

    pub fn next_delivery_tag(&self) -> u64 {
        self.next_delivery_tag
    }

    /// Start tagging at 1. No-op when already enabled.
    pub fn enable(&mut self) -> bool {
        if self.is_enabled() {
            return false;
        }
        self.next_delivery_tag = 1;
        true
    }

    /// Tag the next published message. `None` while confirms are disabled.
    pub fn assign(&mut self) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }
        let tag = self.next_delivery_tag;
        self.unconfirmed.push_back(tag);
        self.next_delivery_tag += 1;
        Some(tag)
    }

    /// Apply an ack.
    ///
    /// Tag `0` confirms everything. With `multiple`, every outstanding tag
    /// up to and including `tag` is retired; otherwise only `tag` itself.
    /// A tag that is not outstanding is ignored, even with `multiple`.
    pub fn ack(&mut self, tag: u64, multiple: bool) -> AckOutcome {
        let before = self.unconfirmed.len();
        if tag == 0 {
            self.unconfirmed.clear();
        } else if let Ok(idx) = self.unconfirmed.binary_search(&tag) {
            if multiple {
                self.unconfirmed.drain(..=idx);
            } else {
                self.unconfirmed.remove(idx);
            }
        }

        let removed = before - self.unconfirmed.len();
        AckOutcome {
            removed,
            drained: removed > 0 && self.unconfirmed.is_empty(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.unconfirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unconfirmed.is_empty()
    }

    /// Outstanding tags in publish order.
    pub fn unconfirmed(&self) -> Vec<u64> {
        self.unconfirmed.iter().copied().collect()
    }
}
