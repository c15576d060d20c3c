//! teacup: a webhook-backed chat widget for the terminal.
//!
//! The widget sits in the corner of the terminal the way an embeddable chat
//! bubble sits in the corner of a web page: a collapsed launcher, a
//! toggleable conversation panel, quick-reply chips, and a webhook on the
//! other end answering as the bot.
//!
//! ## Main Components
//!
//! - [`client`] - Webhook transport and image fetching
//! - [`reply`] - Raw reply parsing into ordered display items
//! - [`session`] - Conversation identity, stable per terminal session
//! - [`theme`] - Widget colors and the shades derived from them
//! - [`widget`] - Transcript, reveal scheduling, event loop, drawing
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use teacup::{ChatWidget, HttpImageFetcher, WebhookClient, WidgetConfig};
//! use teacup::session::{FileSessionStore, SessionId};
//!
//! let session = SessionId::acquire(&FileSessionStore::per_terminal());
//! let (widget, events) = ChatWidget::new(
//!     WidgetConfig::default(),
//!     Arc::new(WebhookClient::new("https://example.test/webhook")),
//!     Arc::new(HttpImageFetcher::new()),
//!     session,
//! );
//! teacup::widget::run(widget, events).await?;
//! ```

pub mod client;
pub mod reply;
pub mod session;
pub mod theme;
pub mod widget;

// Re-export commonly used types
pub use client::{
    ChatTransport, ClientError, HttpImageFetcher, ImageFetcher, ReplyOutcome, WebhookClient,
};
pub use reply::{DisplayItem, ParsedReply};
pub use session::{FileSessionStore, MemorySessionStore, SessionId, SessionStore};
pub use theme::{Rgb, Theme};
pub use widget::{ChatWidget, WidgetConfig, WidgetEvent};
