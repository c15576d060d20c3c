//! Widget state and the handlers that advance it.
//!
//! `ChatWidget` is the single owner of conversation state. Key handling,
//! network completions, and the tick all arrive as `&mut self` calls taking
//! an explicit `now`, which keeps the send and reveal pipeline deterministic
//! under test. Network work never blocks the UI task: webhook exchanges and
//! image fetches run as spawned tasks that report back through the widget's
//! event channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{self, ChatTransport, ImageFetcher, ReplyOutcome};
use crate::reply::{self, DisplayItem};
use crate::session::SessionId;
use crate::theme::Theme;

use super::stage::RevealQueue;
use super::transcript::{ImageState, Transcript, TypingHandle};

/// Greeting shown once the first open of an empty transcript has let the
/// typing indicator run its course.
pub const WELCOME_REPLY: &str = "Hello! How can I help you today?";

/// How long the indicator runs before the greeting lands.
const WELCOME_TYPING: Duration = Duration::from_secs(1);

/// Completion notices from spawned network tasks. The shell pumps these back
/// into [`ChatWidget::on_event`] on the UI task.
#[derive(Debug)]
pub enum WidgetEvent {
    /// The webhook exchange started by send cycle `generation` finished.
    ReplyArrived {
        generation: u64,
        outcome: ReplyOutcome,
    },
    /// An image fetch settled; `card` names the transcript bubble to update.
    ImageSettled { card: String, state: ImageState },
}

/// Construction-time settings.
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// Panel header text.
    pub title: String,
    pub theme: Theme,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            title: "Chat Support".to_string(),
            theme: Theme::default(),
        }
    }
}

/// The chat widget proper: collapsed launcher or open panel, input line,
/// transcript, and the in-flight send state.
pub struct ChatWidget {
    config: WidgetConfig,
    transport: Arc<dyn ChatTransport>,
    fetcher: Arc<dyn ImageFetcher>,
    session: SessionId,
    events: mpsc::UnboundedSender<WidgetEvent>,

    open: bool,
    input: String,
    chip_focus: Option<usize>,
    transcript: Transcript,
    reveals: RevealQueue,

    awaiting_reply: bool,
    typing: Option<TypingHandle>,
    /// Send-cycle generation. Bumped on every send and on close, so replies
    /// from a superseded cycle are recognizably stale.
    cycle: u64,
    welcome_due: Option<Instant>,
}

impl ChatWidget {
    /// Build the widget plus the receiver half of its event channel. The
    /// shell owns the receiver and feeds events back via [`Self::on_event`].
    pub fn new(
        config: WidgetConfig,
        transport: Arc<dyn ChatTransport>,
        fetcher: Arc<dyn ImageFetcher>,
        session: SessionId,
    ) -> (Self, mpsc::UnboundedReceiver<WidgetEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let widget = Self {
            config,
            transport,
            fetcher,
            session,
            events,
            open: false,
            input: String::new(),
            chip_focus: None,
            transcript: Transcript::new(),
            reveals: RevealQueue::new(),
            awaiting_reply: false,
            typing: None,
            cycle: 0,
            welcome_due: None,
        };
        (widget, receiver)
    }

    // -------------------------------------------------------------------------
    // Open / close
    // -------------------------------------------------------------------------

    pub fn toggle(&mut self, now: Instant) {
        if self.open {
            self.close();
        } else {
            self.open(now);
        }
    }

    /// Open the panel. An empty transcript gets the welcome flow: indicator
    /// first, greeting after [`WELCOME_TYPING`].
    pub fn open(&mut self, now: Instant) {
        if self.open {
            return;
        }
        self.open = true;
        if self.transcript.is_empty() && self.welcome_due.is_none() {
            self.typing = Some(self.transcript.begin_typing(now));
            self.welcome_due = Some(now + WELCOME_TYPING);
        }
    }

    /// Collapse the panel. The transcript and the input line survive, but
    /// everything scheduled is cancelled and outstanding replies go stale.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.cycle = self.cycle.wrapping_add(1);
        self.awaiting_reply = false;
        self.welcome_due = None;
        self.typing = None;
        self.transcript.clear_typing();
        self.reveals.cancel();
        self.chip_focus = None;
    }

    // -------------------------------------------------------------------------
    // Input line and quick-reply focus
    // -------------------------------------------------------------------------

    pub fn insert_char(&mut self, ch: char) {
        self.input.push(ch);
        self.chip_focus = None;
    }

    pub fn backspace(&mut self) {
        self.input.pop();
        self.chip_focus = None;
    }

    /// Cycle focus forward through the latest bot bubble's chips, wrapping
    /// back to the input line after the last one.
    pub fn focus_next_chip(&mut self) {
        let count = self.transcript.last_bot_actions().len();
        if count == 0 {
            self.chip_focus = None;
            return;
        }
        self.chip_focus = match self.chip_focus {
            None => Some(0),
            Some(i) if i + 1 < count => Some(i + 1),
            Some(_) => None,
        };
    }

    pub fn focus_prev_chip(&mut self) {
        let count = self.transcript.last_bot_actions().len();
        if count == 0 {
            self.chip_focus = None;
            return;
        }
        self.chip_focus = match self.chip_focus {
            None => Some(count - 1),
            Some(0) => None,
            Some(i) => Some(i - 1),
        };
    }

    // -------------------------------------------------------------------------
    // Send path
    // -------------------------------------------------------------------------

    /// Send the input line's text. Whitespace-only input is a no-op, and so
    /// is submitting while a send is already outstanding; in both cases the
    /// input keeps its text.
    pub fn submit(&mut self, now: Instant) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.awaiting_reply {
            debug!("send already outstanding, ignoring submission");
            return;
        }
        self.input.clear();
        self.send(text, now);
    }

    /// Activate the focused chip: its label becomes the message and goes
    /// through the normal send path.
    pub fn activate_chip(&mut self, now: Instant) {
        let Some(index) = self.chip_focus else {
            return;
        };
        if self.awaiting_reply {
            debug!("send already outstanding, ignoring quick reply");
            return;
        }
        let Some(label) = self.transcript.last_bot_actions().get(index).cloned() else {
            self.chip_focus = None;
            return;
        };
        self.input = label;
        self.chip_focus = None;
        self.submit(now);
    }

    fn send(&mut self, text: String, now: Instant) {
        self.cycle = self.cycle.wrapping_add(1);
        self.welcome_due = None;
        self.reveals.cancel();
        self.chip_focus = None;

        self.transcript.push_user(text.as_str());
        self.typing = Some(self.transcript.begin_typing(now));
        self.awaiting_reply = true;

        let generation = self.cycle;
        let transport = Arc::clone(&self.transport);
        let session = self.session.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client::request_reply(transport.as_ref(), &session, &text).await;
            let _ = events.send(WidgetEvent::ReplyArrived { generation, outcome });
        });
    }

    // -------------------------------------------------------------------------
    // Event handling and the tick
    // -------------------------------------------------------------------------

    /// Apply one completion notice from a spawned task.
    pub fn on_event(&mut self, event: WidgetEvent, now: Instant) {
        match event {
            WidgetEvent::ReplyArrived {
                generation,
                outcome,
            } => self.on_reply(generation, outcome, now),
            WidgetEvent::ImageSettled { card, state } => {
                // No generation check: settling only flips the state of a
                // card that is already in the transcript, never appends.
                self.transcript.resolve_image(&card, state);
            }
        }
    }

    fn on_reply(&mut self, generation: u64, outcome: ReplyOutcome, now: Instant) {
        if generation != self.cycle {
            debug!(
                generation,
                current = self.cycle,
                "dropping reply from a superseded send"
            );
            return;
        }
        self.awaiting_reply = false;
        if let Some(handle) = self.typing.take() {
            self.transcript.end_typing(handle, now);
        }
        let items = reply::parse(outcome.text()).into_items();
        self.reveals.schedule(items, now);
    }

    /// Advance time-driven state: indicator dissolve, the pending welcome,
    /// and due reveals. The shell calls this roughly every 33 ms.
    pub fn tick(&mut self, now: Instant) {
        self.transcript.tick(now);

        if self.welcome_due.is_some_and(|due| due <= now) {
            self.welcome_due = None;
            if let Some(handle) = self.typing.take() {
                self.transcript.end_typing(handle, now);
            }
            self.transcript.push_bot(WELCOME_REPLY, Vec::new());
        }

        for item in self.reveals.release_due(now) {
            self.reveal(item);
        }
    }

    fn reveal(&mut self, item: DisplayItem) {
        match item {
            DisplayItem::Image { url } => {
                let card = self.transcript.push_image(url.as_str());
                let fetcher = Arc::clone(&self.fetcher);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let state = match fetcher.fetch(&url).await {
                        Ok(size) => ImageState::Loaded {
                            width: size.width,
                            height: size.height,
                        },
                        Err(err) => {
                            warn!(url = %url, error = %err, "image fetch failed, hiding the card");
                            ImageState::Failed
                        }
                    };
                    let _ = events.send(WidgetEvent::ImageSettled { card, state });
                });
            }
            DisplayItem::TextWithActions { text, actions } => {
                self.transcript.push_bot(text, actions);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Appearance
    // -------------------------------------------------------------------------

    /// The runtime recolor hook. Either color may be `None` to keep its
    /// current value; derived shades are recomputed either way.
    pub fn set_colors(&mut self, chat: Option<&str>, send: Option<&str>) {
        self.config.theme = self.config.theme.updated(chat, send);
    }

    // -------------------------------------------------------------------------
    // Read access for drawing and scrolling
    // -------------------------------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn theme(&self) -> &Theme {
        &self.config.theme
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn chip_focus(&self) -> Option<usize> {
        self.chip_focus
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.transcript.scroll_up(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.transcript.scroll_down(lines);
    }
}
