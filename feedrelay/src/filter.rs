use chrono::{DateTime, Duration, Utc};
use common::WindowMode;

use crate::feed::{FeedDocument, FeedEntry};

/// Publish-time range one cycle dispatches: `after < published <= until`.
/// An open `until` accepts anything newer than `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub after: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

impl Window {
    /// Everything strictly newer than `threshold`.
    pub fn since(threshold: DateTime<Utc>) -> Self {
        Self {
            after: threshold,
            until: None,
        }
    }

    pub fn between(after: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            after,
            until: Some(until),
        }
    }

    pub fn contains(&self, published: DateTime<Utc>) -> bool {
        published > self.after && self.until.map_or(true, |until| published <= until)
    }
}

/// Entries whose publish time falls inside `window`, in document order.
/// Entries without a usable publish date are dropped.
pub fn filter_entries(document: &FeedDocument, window: &Window) -> Vec<FeedEntry> {
    document
        .entries
        .iter()
        .filter(|e| e.published.is_some_and(|p| window.contains(p)))
        .cloned()
        .collect()
}

/// Computes the dispatch window at the start of each cycle.
#[derive(Debug, Clone)]
pub struct PollWindow {
    mode: WindowMode,
    interval: Duration,
    last_start: Option<DateTime<Utc>>,
}

impl PollWindow {
    pub fn new(mode: WindowMode, interval: std::time::Duration) -> Self {
        Self {
            mode,
            interval: Duration::milliseconds(interval.as_millis().min(i64::MAX as u128) as i64),
            last_start: None,
        }
    }

    /// Window for a cycle starting at `now`.
    ///
    /// `Fixed` is `(now - interval, ..)` with no upper bound. `Contiguous` is
    /// `(previous start, now]`: entries published while this cycle runs are left
    /// for the next one, so consecutive windows share no instant.
    pub fn next(&mut self, now: DateTime<Utc>) -> Window {
        let fixed = now
            .checked_sub_signed(self.interval)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let window = match (self.mode, self.last_start) {
            (WindowMode::Fixed, _) => Window::since(fixed),
            (WindowMode::Contiguous, Some(prev)) if prev <= now => Window::between(prev, now),
            (WindowMode::Contiguous, _) => Window::between(fixed, now),
        };
        self.last_start = Some(now);
        window
    }
}
