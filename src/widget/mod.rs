//! The terminal chat widget: a launcher bar plus a toggleable conversation
//! panel, backed by a webhook.
//!
//! ## Architecture
//!
//! ```text
//!      ┌─────────────┐ keys, resize   ┌───────────────────┐
//!      │ EventStream │───────┐        │   spawned tasks    │
//!      └─────────────┘       │        │ (webhook, images)  │
//!                            ▼        └─────────┬──────────┘
//!                      ┌───────────┐            │ WidgetEvent
//!                      │   shell   │◄───────────┘
//!                      │ run loop  │
//!                      └─────┬─────┘
//!                            │ key / event / tick
//!                      ┌─────▼──────┐
//!                      │ ChatWidget │──spawns──► transport / fetcher
//!                      └─────┬──────┘
//!              ┌─────────────┼─────────────┐
//!              ▼             ▼             ▼
//!         Transcript    RevealQueue    view::draw
//! ```
//!
//! [`ChatWidget`] owns all conversation state and is purely synchronous;
//! every timing decision takes an explicit `Instant`. The shell owns the
//! terminal, translates key events, and pumps [`WidgetEvent`]s from spawned
//! network tasks back into the widget. Rendering reads widget state and
//! draws it fresh each frame.

mod app;
mod shell;
mod stage;
mod transcript;
mod view;

pub use app::{ChatWidget, WidgetConfig, WidgetEvent, WELCOME_REPLY};
pub use shell::run;
pub use stage::{RevealQueue, IMAGE_TO_TEXT_PAUSE, REVEAL_GAP};
pub use transcript::{
    Bubble, BubbleKind, ImageState, Transcript, TypingHandle, TypingView, TYPING_DISSOLVE,
};
