//! cup - a webhook-backed chat widget for the terminal.
//!
//! Argument parsing, logging setup, and widget wiring. Everything after
//! startup happens inside [`teacup::widget::run`].

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nu_ansi_term::{Color, Style};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use teacup::session::{FileSessionStore, SessionId};
use teacup::{ChatWidget, HttpImageFetcher, Theme, WebhookClient, WidgetConfig};

/// Chat with a webhook bot without leaving the terminal
#[derive(Parser, Debug)]
#[command(name = "cup")]
#[command(version, about, long_about = None)]
struct Args {
    /// Webhook endpoint answering sendMessage requests
    #[arg(long, env = "CUP_WEBHOOK_URL")]
    webhook_url: String,

    /// Launcher and panel title
    #[arg(long, default_value = "Chat Support")]
    title: String,

    /// Widget color, hex "#rrggbb" or "rgb(r, g, b)"
    #[arg(long)]
    chat_color: Option<String>,

    /// Send-affordance color, same forms as --chat-color
    #[arg(long)]
    send_color: Option<String>,

    /// Session file override (default: a per-terminal file in the temp dir)
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(&args);

    if let Err(err) = run(args) {
        let red = Style::new().fg(Color::Red).bold();
        eprintln!("{} {err:#}", red.paint("error:"));
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let store = match &args.session_file {
        Some(path) => FileSessionStore::at(path.clone()),
        None => FileSessionStore::per_terminal(),
    };
    let session = SessionId::acquire(&store);
    debug!(session = session.as_str(), "session ready");

    let theme = Theme::default().updated(args.chat_color.as_deref(), args.send_color.as_deref());
    let (widget, events) = ChatWidget::new(
        WidgetConfig {
            title: args.title,
            theme,
        },
        Arc::new(WebhookClient::new(args.webhook_url)),
        Arc::new(HttpImageFetcher::new()),
        session,
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to build the async runtime")?;
    runtime.block_on(teacup::widget::run(widget, events))
}

/// Route diagnostics to a file under the cache dir; the TUI owns the screen
/// while running, so stderr is not available. Logging is best-effort: with
/// no writable cache dir the widget runs unlogged.
fn init_tracing(args: &Args) {
    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match open_log_file() {
        Some(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry().with(filter).init();
        }
    }
}

fn open_log_file() -> Option<File> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("cup");
    std::fs::create_dir_all(&dir).ok()?;
    File::create(dir.join("cup.log")).ok()
}
