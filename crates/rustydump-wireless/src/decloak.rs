//! Decloak detection ring
//!
//! A cloaking AP re-sends frames with four bytes added or removed. Recent
//! frames of an AP are kept here and each new one is compared against them.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use crate::traffic::elapsed;

/// How long a stored frame stays comparable
pub const DECLOAK_WINDOW: Duration = Duration::from_millis(3000);

/// Upper bound on stored frames per AP
pub const DECLOAK_RING_CAPACITY: usize = 256;

/// Bytes skipped at both ends of the compared range (header + IV)
const COMPARE_MARGIN: usize = 28;

#[derive(Debug, Clone)]
struct StoredFrame {
    bytes: Vec<u8>,
    captured: SystemTime,
}

/// Recent frames, newest first.
#[derive(Debug, Clone, Default)]
pub struct DecloakRing {
    frames: VecDeque<StoredFrame>,
}

impl DecloakRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: &[u8], now: SystemTime) {
        if frame.is_empty() {
            return;
        }
        self.frames.push_front(StoredFrame {
            bytes: frame.to_vec(),
            captured: now,
        });
        self.frames.truncate(DECLOAK_RING_CAPACITY);
    }

    /// True if some stored frame differs from `frame` by exactly four bytes
    /// appended or prepended.
    pub fn matches(&self, frame: &[u8]) -> bool {
        self.frames.iter().any(|stored| shifted_copy(&stored.bytes, frame))
    }

    /// Drop everything older than `max_age`.
    pub fn purge_older_than(&mut self, now: SystemTime, max_age: Duration) {
        // newest first, so everything after the first stale frame is stale
        if let Some(first_stale) = self
            .frames
            .iter()
            .position(|stored| elapsed(now, stored.captured) > max_age)
        {
            self.frames.truncate(first_stale);
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Compare the shorter frame against the longer one directly and with a
/// four byte offset, over `28..longer_len - 28`.
fn shifted_copy(a: &[u8], b: &[u8]) -> bool {
    let (shorter, longer) = if a.len() + 4 == b.len() {
        (a, b)
    } else if b.len() + 4 == a.len() {
        (b, a)
    } else {
        return false;
    };

    let end = longer.len().saturating_sub(COMPARE_MARGIN);
    if end <= COMPARE_MARGIN {
        return false;
    }
    let range = COMPARE_MARGIN..end;

    let appended = shorter[range.clone()] == longer[range.clone()];
    appended || shorter[range.clone()] == longer[range.start + 4..range.end + 4]
}
