//! Transcript state: the ordered message list plus the typing indicator.
//!
//! Bubbles are append-only and exist only for the lifetime of the widget;
//! nothing here is persisted. All timing flows in through explicit `now`
//! instants so every transition is deterministic under test.

use std::time::{Duration, Instant};

/// How long a dismissed typing indicator lingers before removal. Removal is
/// unconditional once the deadline passes.
pub const TYPING_DISSOLVE: Duration = Duration::from_millis(300);

/// Animation step for the indicator dots.
const TYPING_FRAME: Duration = Duration::from_millis(300);

const TYPING_FRAMES: &[&str] = &["\u{b7}", "\u{b7}\u{b7}", "\u{b7}\u{b7}\u{b7}"];

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub id: String,
    pub kind: BubbleKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleKind {
    /// Right-aligned user message, shown verbatim.
    User { text: String },
    /// Bot message with zero or more quick-reply chips.
    Bot { text: String, actions: Vec<String> },
    /// An image card; failed cards stay in the list but are never drawn.
    Image { url: String, state: ImageState },
}

/// Lifecycle of one image card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Loading,
    Loaded { width: u32, height: u32 },
    Failed,
}

impl Bubble {
    fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: BubbleKind::User { text: text.into() },
        }
    }

    fn bot(text: impl Into<String>, actions: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: BubbleKind::Bot {
                text: text.into(),
                actions,
            },
        }
    }

    fn image(url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: BubbleKind::Image {
                url: url.into(),
                state: ImageState::Loading,
            },
        }
    }
}

/// Identifies one installed typing indicator. A handle from a superseded
/// indicator is stale and ends nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypingState {
    Hidden,
    Active { handle: TypingHandle, since: Instant },
    Leaving { until: Instant },
}

/// What the drawing layer needs to know about the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingView {
    Hidden,
    /// Animated dots.
    Active { frame: &'static str },
    /// Dismissed but still on screen, drawn dimmed.
    Leaving,
}

/// The message list, the single typing-indicator slot, and the scroll
/// position (lines above the bottom; 0 means stuck to the newest entry).
#[derive(Debug)]
pub struct Transcript {
    bubbles: Vec<Bubble>,
    typing: TypingState,
    next_handle: u64,
    scroll_offset: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            bubbles: Vec::new(),
            typing: TypingState::Hidden,
            next_handle: 0,
            scroll_offset: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Bubbles
    // -------------------------------------------------------------------------

    /// Append a user bubble. User text is never parsed for markup.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.bubbles.push(Bubble::user(text));
        self.stick_to_bottom();
    }

    /// Append a bot bubble with its quick-reply chips.
    pub fn push_bot(&mut self, text: impl Into<String>, actions: Vec<String>) {
        self.bubbles.push(Bubble::bot(text, actions));
        self.stick_to_bottom();
    }

    /// Append a loading image card and return its id for later resolution.
    pub fn push_image(&mut self, url: impl Into<String>) -> String {
        let bubble = Bubble::image(url);
        let id = bubble.id.clone();
        self.bubbles.push(bubble);
        self.stick_to_bottom();
        id
    }

    /// Settle an image card. Unknown ids are ignored; the scroll position is
    /// left alone, a settling card is not new content.
    pub fn resolve_image(&mut self, id: &str, state: ImageState) {
        for bubble in &mut self.bubbles {
            if bubble.id == id {
                if let BubbleKind::Image {
                    state: ref mut current,
                    ..
                } = bubble.kind
                {
                    *current = state;
                }
                return;
            }
        }
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    /// The quick-reply labels of the most recent bot bubble.
    pub fn last_bot_actions(&self) -> &[String] {
        for bubble in self.bubbles.iter().rev() {
            if let BubbleKind::Bot { actions, .. } = &bubble.kind {
                return actions;
            }
        }
        &[]
    }

    // -------------------------------------------------------------------------
    // Typing indicator
    // -------------------------------------------------------------------------

    /// Install a fresh indicator, replacing whatever occupied the slot. The
    /// animation restarts from `now`.
    pub fn begin_typing(&mut self, now: Instant) -> TypingHandle {
        self.next_handle += 1;
        let handle = TypingHandle(self.next_handle);
        self.typing = TypingState::Active { handle, since: now };
        self.stick_to_bottom();
        handle
    }

    /// Dismiss the indicator behind `handle`. It lingers for the dissolve
    /// window and is then removed by `tick`. Stale handles end nothing.
    pub fn end_typing(&mut self, handle: TypingHandle, now: Instant) {
        if let TypingState::Active { handle: active, .. } = self.typing {
            if active == handle {
                self.typing = TypingState::Leaving {
                    until: now + TYPING_DISSOLVE,
                };
            }
        }
    }

    /// Drop the indicator immediately, dissolve or not.
    pub fn clear_typing(&mut self) {
        self.typing = TypingState::Hidden;
    }

    /// Advance time-driven state: a lingering indicator past its deadline
    /// disappears.
    pub fn tick(&mut self, now: Instant) {
        if let TypingState::Leaving { until } = self.typing {
            if now >= until {
                self.typing = TypingState::Hidden;
            }
        }
    }

    pub fn typing_view(&self, now: Instant) -> TypingView {
        match self.typing {
            TypingState::Hidden => TypingView::Hidden,
            TypingState::Active { since, .. } => {
                let elapsed = now.saturating_duration_since(since);
                let step = (elapsed.as_millis() / TYPING_FRAME.as_millis()) as usize;
                TypingView::Active {
                    frame: TYPING_FRAMES[step % TYPING_FRAMES.len()],
                }
            }
            TypingState::Leaving { .. } => TypingView::Leaving,
        }
    }

    // -------------------------------------------------------------------------
    // Scrolling
    // -------------------------------------------------------------------------

    /// Lines above the bottom of the transcript. The drawing layer clamps
    /// this against the actual content height.
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn stick_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
