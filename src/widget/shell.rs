//! Terminal ownership and the event loop.
//!
//! The shell puts the terminal into raw mode on the alternate screen, then
//! multiplexes three sources: terminal input, completion events from spawned
//! tasks, and a fixed tick. A drop guard restores the terminal on every exit
//! path, panics included.

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::cursor::Show;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::app::{ChatWidget, WidgetEvent};
use super::view;

/// Frame cadence. Drives indicator animation frames and due reveals.
const TICK: Duration = Duration::from_millis(33);

/// Restores the terminal on drop, so a panic cannot leave raw mode behind.
struct TerminalGuard;

impl TerminalGuard {
    fn install() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen)
            .context("failed to enter the alternate screen")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
    }
}

/// Run the widget until the user quits. Owns the terminal for the duration.
pub async fn run(
    mut widget: ChatWidget,
    mut events: mpsc::UnboundedReceiver<WidgetEvent>,
) -> Result<()> {
    let _guard = TerminalGuard::install()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).context("failed to build the terminal")?;
    terminal.clear().context("failed to clear the terminal")?;

    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let now = Instant::now();
        widget.tick(now);
        terminal
            .draw(|frame| view::draw(frame, &widget, now))
            .context("failed to draw a frame")?;

        tokio::select! {
            biased;

            maybe_event = input.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        if key.kind == KeyEventKind::Press
                            && !handle_key(&mut widget, key, Instant::now())
                        {
                            break;
                        }
                    }
                    // Resizes fall through to the redraw at the top.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        return Err(err).context("terminal event stream failed");
                    }
                    None => break,
                }
            }
            Some(event) = events.recv() => {
                widget.on_event(event, Instant::now());
            }
            _ = ticker.tick() => {}
        }
    }

    Ok(())
}

/// Translate one key press. Returns `false` when the user asked to quit.
fn handle_key(widget: &mut ChatWidget, key: KeyEvent, now: Instant) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => return false,
            KeyCode::Char('t') => {
                widget.toggle(now);
                return true;
            }
            _ => {}
        }
    }

    // Everything below only applies to the open panel.
    if !widget.is_open() {
        return true;
    }

    match key.code {
        KeyCode::Esc => widget.close(),
        KeyCode::Enter => {
            if widget.chip_focus().is_some() {
                widget.activate_chip(now);
            } else {
                widget.submit(now);
            }
        }
        KeyCode::Tab => widget.focus_next_chip(),
        KeyCode::BackTab => widget.focus_prev_chip(),
        KeyCode::Backspace => widget.backspace(),
        KeyCode::Up => widget.scroll_up(1),
        KeyCode::Down => widget.scroll_down(1),
        KeyCode::PageUp => widget.scroll_up(10),
        KeyCode::PageDown => widget.scroll_down(10),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            widget.insert_char(ch);
        }
        _ => {}
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        ChatTransport, ClientError, ImageDimensions, ImageFetchError, ImageFetcher,
    };
    use crate::session::{MemorySessionStore, SessionId};
    use crate::widget::{WidgetConfig, WELCOME_REPLY};

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::task::yield_now;

    struct ScriptedTransport {
        script: Mutex<VecDeque<String>>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, _session: &SessionId, text: &str) -> Result<String, ClientError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "ok".to_string()))
        }
    }

    struct NullFetcher;

    #[async_trait]
    impl ImageFetcher for NullFetcher {
        async fn fetch(&self, _url: &str) -> Result<ImageDimensions, ImageFetchError> {
            Ok(ImageDimensions {
                width: 1,
                height: 1,
            })
        }
    }

    fn test_widget(
        transport: Arc<ScriptedTransport>,
    ) -> (ChatWidget, mpsc::UnboundedReceiver<WidgetEvent>) {
        ChatWidget::new(
            WidgetConfig::default(),
            transport,
            Arc::new(NullFetcher),
            SessionId::acquire(&MemorySessionStore::new()),
        )
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_ctrl_c_requests_quit() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        assert!(!handle_key(&mut w, ctrl('c'), Instant::now()));
    }

    #[test]
    fn test_ctrl_t_toggles_open_and_closed() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        let now = Instant::now();

        assert!(handle_key(&mut w, ctrl('t'), now));
        assert!(w.is_open());
        assert!(handle_key(&mut w, ctrl('t'), now));
        assert!(!w.is_open());
    }

    #[test]
    fn test_keys_are_inert_while_closed() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        let now = Instant::now();

        assert!(handle_key(&mut w, press(KeyCode::Char('x')), now));
        assert!(handle_key(&mut w, press(KeyCode::Enter), now));
        assert!(handle_key(&mut w, press(KeyCode::Esc), now));
        assert_eq!(w.input(), "");
        assert!(w.transcript().is_empty());
    }

    #[test]
    fn test_escape_closes_the_panel() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        let now = Instant::now();

        handle_key(&mut w, ctrl('t'), now);
        assert!(w.is_open());
        handle_key(&mut w, press(KeyCode::Esc), now);
        assert!(!w.is_open());
    }

    #[test]
    fn test_typing_edits_the_input_line() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        let now = Instant::now();
        handle_key(&mut w, ctrl('t'), now);

        for ch in "hey!".chars() {
            handle_key(&mut w, press(KeyCode::Char(ch)), now);
        }
        handle_key(&mut w, press(KeyCode::Backspace), now);
        assert_eq!(w.input(), "hey");
    }

    #[test]
    fn test_control_chords_do_not_insert() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        let now = Instant::now();
        handle_key(&mut w, ctrl('t'), now);

        handle_key(&mut w, ctrl('x'), now);
        assert_eq!(w.input(), "");
    }

    #[test]
    fn test_scroll_keys_move_the_transcript() {
        let (mut w, _events) = test_widget(ScriptedTransport::new(&[]));
        let now = Instant::now();
        handle_key(&mut w, ctrl('t'), now);

        handle_key(&mut w, press(KeyCode::Up), now);
        handle_key(&mut w, press(KeyCode::PageUp), now);
        assert_eq!(w.transcript().scroll_offset(), 11);
        handle_key(&mut w, press(KeyCode::Down), now);
        assert_eq!(w.transcript().scroll_offset(), 10);
        handle_key(&mut w, press(KeyCode::PageDown), now);
        assert_eq!(w.transcript().scroll_offset(), 0);
    }

    #[tokio::test]
    async fn test_keyboard_round_trip_with_quick_reply() {
        let transport = ScriptedTransport::new(&["Pick a color ``Red`` ``Blue``", "Red it is"]);
        let (mut w, mut events) = test_widget(Arc::clone(&transport));
        let now = Instant::now();

        handle_key(&mut w, ctrl('t'), now);
        for ch in "colors?".chars() {
            handle_key(&mut w, press(KeyCode::Char(ch)), now);
        }
        handle_key(&mut w, press(KeyCode::Enter), now);

        for _ in 0..3 {
            yield_now().await;
        }
        while let Ok(event) = events.try_recv() {
            w.on_event(event, now);
        }
        w.tick(now);

        assert_eq!(w.transcript().last_bot_actions(), ["Red", "Blue"]);

        // Tab focuses the first chip; Enter activates it.
        let later = now + Duration::from_secs(1);
        handle_key(&mut w, press(KeyCode::Tab), later);
        handle_key(&mut w, press(KeyCode::Enter), later);

        for _ in 0..3 {
            yield_now().await;
        }
        while let Ok(event) = events.try_recv() {
            w.on_event(event, later);
        }
        w.tick(later);

        assert_eq!(transport.sent(), ["colors?", "Red"]);
        let bubble_count = w.transcript().bubbles().len();
        assert_eq!(bubble_count, 4);
    }

    #[tokio::test]
    async fn test_welcome_does_not_block_input() {
        let transport = ScriptedTransport::new(&["hi!"]);
        let (mut w, mut events) = test_widget(Arc::clone(&transport));
        let now = Instant::now();

        // Open and immediately send, before the welcome lands.
        handle_key(&mut w, ctrl('t'), now);
        handle_key(&mut w, press(KeyCode::Char('y')), now);
        handle_key(&mut w, press(KeyCode::Enter), now);

        for _ in 0..3 {
            yield_now().await;
        }
        while let Ok(event) = events.try_recv() {
            w.on_event(event, now);
        }
        w.tick(now + Duration::from_secs(2));

        assert_eq!(transport.sent(), ["y"]);
        let texts: Vec<_> = w
            .transcript()
            .bubbles()
            .iter()
            .map(|b| format!("{:?}", b.kind))
            .collect();
        assert!(!texts.iter().any(|t| t.contains(WELCOME_REPLY)));
    }
}
