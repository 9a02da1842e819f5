//! The ordered event buffer.
//!
//! Events are kept newest first. Insertion checks the two common cases
//! before scanning: live messages usually arrive newer than the head, and
//! historical backfill usually arrives older than the tail.
//!
//! The middle-of-buffer path is a linear scan. That is fine for the small,
//! caller-bounded capacities a timeline shows; a large capacity would want
//! an index-ordered structure keyed by timestamp instead.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use chrono::{DateTime, TimeZone};
use tideline_types::{Event, EventGroup};

use crate::grouping::group_by_relative_day;

/// Default number of events shown by a timeline.
pub const DEFAULT_LIMIT: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(limit) => limit,
    None => NonZeroUsize::MIN,
};

/// Whether an insertion enforces the capacity bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Evict from the tail until the buffer is back at its limit.
    Bounded,
    /// Never evict. Used for historical pages.
    Unbounded,
}

/// Newest-first sequence of events with a sliding-window capacity.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    limit: NonZeroUsize,
}

impl EventBuffer {
    /// Create an empty buffer holding at most `limit` events on the
    /// bounded path.
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            events: VecDeque::with_capacity(limit.get()),
            limit,
        }
    }

    /// Configured capacity.
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Newest event.
    pub fn head(&self) -> Option<&Event> {
        self.events.front()
    }

    /// Oldest event.
    pub fn tail(&self) -> Option<&Event> {
        self.events.back()
    }

    /// Iterate newest to oldest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Event> {
        self.events.iter()
    }

    /// Copy the events out, newest first.
    pub fn to_vec(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Insert `event` keeping timestamps non-increasing from head to tail.
    ///
    /// With [`Eviction::Bounded`] the tail is evicted afterwards until the
    /// buffer is back at its limit; the inserted event itself is evicted
    /// if it is the oldest. Returns how many events were evicted.
    pub fn insert_ordered(&mut self, event: Event, eviction: Eviction) -> usize {
        match (self.events.front(), self.events.back()) {
            (Some(head), _) if event.timestamp > head.timestamp => self.events.push_front(event),
            (_, Some(tail)) if event.timestamp < tail.timestamp => self.events.push_back(event),
            (None, _) | (_, None) => self.events.push_back(event),
            _ => {
                let position = self
                    .events
                    .iter()
                    .position(|item| item.timestamp <= event.timestamp)
                    .unwrap_or(self.events.len());
                self.events.insert(position, event);
            }
        }

        match eviction {
            Eviction::Bounded => self.enforce_limit(),
            Eviction::Unbounded => 0,
        }
    }

    /// Remove and return the oldest event.
    pub fn evict_tail(&mut self) -> Option<Event> {
        self.events.pop_back()
    }

    /// Drop every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Partition the buffer into day groups relative to `now`.
    ///
    /// Read-only; see [`group_by_relative_day`].
    pub fn group_by_relative_day<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<EventGroup> {
        group_by_relative_day(self.events.iter(), now)
    }

    fn enforce_limit(&mut self) -> usize {
        let mut evicted = 0_usize;
        while self.events.len() > self.limit.get() && self.evict_tail().is_some() {
            evicted = evicted.saturating_add(1);
        }
        evicted
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}
