//! Reveal scheduling for parsed reply items.
//!
//! A reply that parses into several display items is not shown at once. Each
//! item gets an absolute due instant when it is scheduled, and the tick loop
//! drains whatever has come due. Due instants never move after scheduling, so
//! a slow tick releases a burst in order rather than stretching the cadence.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::reply::DisplayItem;

/// Spacing between consecutive reveals.
pub const REVEAL_GAP: Duration = Duration::from_millis(300);

/// Extra pause before a text bubble that follows an image card, so the image
/// registers before the caption lands.
pub const IMAGE_TO_TEXT_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct Pending {
    due: Instant,
    item: DisplayItem,
}

/// Items from the latest reply waiting for their reveal moment.
#[derive(Debug, Default)]
pub struct RevealQueue {
    pending: VecDeque<Pending>,
}

impl RevealQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `items` in order. The first is due immediately; each later one
    /// follows its predecessor by [`REVEAL_GAP`], plus [`IMAGE_TO_TEXT_PAUSE`]
    /// when an image card precedes a text bubble.
    pub fn schedule(&mut self, items: Vec<DisplayItem>, now: Instant) {
        let mut due = now;
        let mut items = items.into_iter().peekable();
        while let Some(item) = items.next() {
            let gap = match (&item, items.peek()) {
                (DisplayItem::Image { .. }, Some(DisplayItem::TextWithActions { .. })) => {
                    REVEAL_GAP + IMAGE_TO_TEXT_PAUSE
                }
                _ => REVEAL_GAP,
            };
            self.pending.push_back(Pending { due, item });
            due += gap;
        }
    }

    /// Remove and return every item due at `now`, oldest first.
    pub fn release_due(&mut self, now: Instant) -> Vec<DisplayItem> {
        let mut released = Vec::new();
        while self.pending.front().is_some_and(|next| next.due <= now) {
            if let Some(next) = self.pending.pop_front() {
                released.push(next.item);
            }
        }
        released
    }

    /// Drop everything still pending. Items already released stay wherever
    /// the caller put them.
    pub fn cancel(&mut self) {
        self.pending.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
