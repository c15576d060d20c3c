//! Frame drawing: launcher bar, panel chrome, transcript lines.
//!
//! Everything here is a pure function of widget state; the shell calls
//! [`draw`] once per frame and state never changes during a draw.

use std::time::Instant;

use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use crate::theme::Theme;

use super::app::ChatWidget;
use super::transcript::{BubbleKind, ImageState, Transcript, TypingView};

/// Panel size in cells, bottom-right anchored. Sized like an embedded chat
/// bubble: tall enough for a short exchange, small enough to leave the host
/// terminal visible behind it.
const PANEL_WIDTH: u16 = 44;
const PANEL_HEIGHT: u16 = 18;

const PLACEHOLDER: &str = "Type a message...";
const GLYPH_CLOSED: &str = "\u{1f4ac}";
const GLYPH_OPEN: &str = "\u{25bc}";

/// Draw one frame: the launcher bar always, the panel when open.
pub fn draw(frame: &mut Frame, widget: &ChatWidget, now: Instant) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }

    let launcher = Rect {
        x: area.x,
        y: area.bottom() - 1,
        width: area.width,
        height: 1,
    };
    draw_launcher(frame, launcher, widget);

    if widget.is_open() {
        let panel = panel_area(area);
        if panel.width >= 16 && panel.height >= 4 {
            draw_panel(frame, panel, widget, now);
        }
    }
}

/// The panel rect: bottom-right, leaving the launcher row visible.
fn panel_area(area: Rect) -> Rect {
    let width = area.width.min(PANEL_WIDTH);
    let height = area.height.saturating_sub(1).min(PANEL_HEIGHT);
    Rect {
        x: area.right() - width,
        y: area.bottom() - 1 - height,
        width,
        height,
    }
}

fn draw_launcher(frame: &mut Frame, area: Rect, widget: &ChatWidget) {
    let theme = widget.theme();
    let glyph = if widget.is_open() {
        GLYPH_OPEN
    } else {
        GLYPH_CLOSED
    };
    let line = Line::from(vec![
        Span::styled(" Ctrl+T ", Style::new().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!(" {glyph} {} ", widget.title()),
            Style::new().fg(Color::White).bg(theme.chat.into()).bold(),
        ),
    ])
    .right_aligned();
    frame.render_widget(line, area);
}

fn draw_panel(frame: &mut Frame, area: Rect, widget: &ChatWidget, now: Instant) {
    let theme = widget.theme();
    let block = Block::bordered()
        .border_style(Style::new().fg(theme.chat.into()))
        .title(
            Line::from(format!(" {} ", widget.title()))
                .style(Style::new().fg(Color::White).bg(theme.chat.into()).bold()),
        )
        .title(
            Line::from(format!(" {GLYPH_OPEN} "))
                .right_aligned()
                .style(Style::new().fg(theme.chat.into())),
        )
        .title_bottom(
            Line::from(" Enter sends ")
                .right_aligned()
                .style(Style::new().fg(theme.send.into())),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [messages, input_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(inner);

    let lines = transcript_lines(
        widget.transcript(),
        theme,
        widget.chip_focus(),
        messages.width,
        now,
    );
    let total = lines.len();
    let height = messages.height as usize;
    let max_scroll = total.saturating_sub(height);
    let offset = widget.transcript().scroll_offset().min(max_scroll);
    let hidden_above = (max_scroll - offset) as u16;
    frame.render_widget(Paragraph::new(lines).scroll((hidden_above, 0)), messages);

    let typed_width = Span::raw(widget.input()).width() as u16;
    let content = if widget.input().is_empty() {
        Span::styled(PLACEHOLDER, Style::new().fg(Color::DarkGray))
    } else {
        Span::raw(widget.input().to_string())
    };
    let prompt = Line::from(vec![
        Span::styled("> ", Style::new().fg(theme.send.into()).bold()),
        content,
    ]);
    frame.render_widget(prompt, input_area);

    // The terminal cursor sits in the input line unless a chip holds focus.
    if widget.chip_focus().is_none() {
        let x = (input_area.x + 2 + typed_width).min(input_area.right().saturating_sub(1));
        frame.set_cursor_position(Position::new(x, input_area.y));
    }
}

/// Flatten the transcript into styled lines at the given wrap width.
/// `chip_focus` applies to the chips of the latest bot bubble only.
fn transcript_lines(
    transcript: &Transcript,
    theme: &Theme,
    chip_focus: Option<usize>,
    width: u16,
    now: Instant,
) -> Vec<Line<'static>> {
    let wrap_width = (width as usize).saturating_sub(2).max(8);
    let mut lines: Vec<Line<'static>> = Vec::new();

    let focus_at = transcript
        .bubbles()
        .iter()
        .rposition(|bubble| matches!(bubble.kind, BubbleKind::Bot { .. }));

    for (index, bubble) in transcript.bubbles().iter().enumerate() {
        // Failed cards stay in the transcript but are never drawn.
        if matches!(
            bubble.kind,
            BubbleKind::Image {
                state: ImageState::Failed,
                ..
            }
        ) {
            continue;
        }
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        match &bubble.kind {
            BubbleKind::User { text } => {
                let style = Style::new().fg(Color::White).bg(theme.chat.into());
                for piece in textwrap::wrap(text, wrap_width) {
                    lines.push(Line::from(Span::styled(format!(" {piece} "), style)).right_aligned());
                }
            }
            BubbleKind::Bot { text, actions } => {
                let style = Style::new().fg(Color::Black).bg(theme.bot_bubble.into());
                for piece in textwrap::wrap(text, wrap_width) {
                    lines.push(Line::from(Span::styled(format!(" {piece} "), style)));
                }
                if !actions.is_empty() {
                    let focus = if focus_at == Some(index) {
                        chip_focus
                    } else {
                        None
                    };
                    lines.push(chips_line(actions, focus, theme));
                }
            }
            BubbleKind::Image { url, state } => match state {
                ImageState::Loading => {
                    lines.push(Line::from(Span::styled(
                        "\u{25a2} image",
                        Style::new().fg(Color::DarkGray),
                    )));
                }
                ImageState::Loaded { width, height } => {
                    lines.push(Line::from(Span::styled(
                        format!("\u{25a3} image {width}x{height}"),
                        Style::new().fg(theme.chat.into()),
                    )));
                    lines.push(Line::from(Span::styled(
                        url.clone(),
                        Style::new().fg(Color::DarkGray),
                    )));
                }
                // Skipped before the separator above.
                ImageState::Failed => {}
            },
        }
    }

    match transcript.typing_view(now) {
        TypingView::Hidden => {}
        TypingView::Active { frame } => {
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(
                frame,
                Style::new().fg(Color::DarkGray),
            )));
        }
        TypingView::Leaving => {
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(
                "\u{b7}\u{b7}\u{b7}",
                Style::new().fg(Color::DarkGray).dim(),
            )));
        }
    }

    lines
}

fn chips_line(actions: &[String], focus: Option<usize>, theme: &Theme) -> Line<'static> {
    let mut spans = Vec::new();
    for (index, label) in actions.iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw(" "));
        }
        let style = if focus == Some(index) {
            Style::new().fg(Color::Black).bg(theme.chip_focus.into()).bold()
        } else {
            Style::new().fg(theme.chat.into())
        };
        spans.push(Span::styled(format!("[{label}]"), style));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        ChatTransport, ClientError, ImageDimensions, ImageFetchError, ImageFetcher,
    };
    use crate::session::{MemorySessionStore, SessionId};
    use crate::widget::{WidgetConfig, WidgetEvent};

    use std::sync::Arc;

    use async_trait::async_trait;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Alignment;
    use ratatui::Terminal;
    use tokio::sync::mpsc;

    struct NullTransport;

    #[async_trait]
    impl ChatTransport for NullTransport {
        async fn send(&self, _session: &SessionId, _text: &str) -> Result<String, ClientError> {
            Ok(String::new())
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

    fn test_widget() -> (ChatWidget, mpsc::UnboundedReceiver<WidgetEvent>) {
        ChatWidget::new(
            WidgetConfig::default(),
            Arc::new(NullTransport),
            Arc::new(NullFetcher),
            SessionId::acquire(&MemorySessionStore::new()),
        )
    }

    fn buffer_text(buffer: &Buffer) -> String {
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_collapsed_frame_shows_only_the_launcher() {
        let (widget, _events) = test_widget();
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).expect("terminal");
        terminal
            .draw(|frame| draw(frame, &widget, Instant::now()))
            .expect("draw");

        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Chat Support"));
        assert!(text.contains("Ctrl+T"));
        assert!(!text.contains(PLACEHOLDER));
    }

    #[test]
    fn test_open_frame_shows_panel_chrome() {
        let (mut widget, _events) = test_widget();
        let now = Instant::now();
        widget.open(now);

        let mut terminal = Terminal::new(TestBackend::new(60, 24)).expect("terminal");
        terminal
            .draw(|frame| draw(frame, &widget, now))
            .expect("draw");

        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains(" Chat Support "));
        assert!(text.contains(PLACEHOLDER));
        assert!(text.contains(GLYPH_OPEN));
        assert!(text.contains("Enter sends"));
    }

    #[test]
    fn test_tiny_terminal_never_panics() {
        let (mut widget, _events) = test_widget();
        let now = Instant::now();
        widget.open(now);

        for (w, h) in [(1, 1), (8, 2), (17, 3), (20, 5)] {
            let mut terminal = Terminal::new(TestBackend::new(w, h)).expect("terminal");
            terminal
                .draw(|frame| draw(frame, &widget, now))
                .expect("draw");
        }
    }

    #[test]
    fn test_overscroll_is_clamped_at_draw_time() {
        let (mut widget, _events) = test_widget();
        let now = Instant::now();
        widget.open(now);
        widget.scroll_up(10_000);

        let mut terminal = Terminal::new(TestBackend::new(60, 24)).expect("terminal");
        terminal
            .draw(|frame| draw(frame, &widget, now))
            .expect("draw");
    }

    #[test]
    fn test_user_lines_are_right_aligned() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello");
        transcript.push_bot("hi", Vec::new());

        let lines = transcript_lines(&transcript, &Theme::default(), None, 40, Instant::now());
        assert_eq!(lines[0].alignment, Some(Alignment::Right));
        // Bubbles are separated by a blank line; the bot line is unaligned.
        assert_eq!(lines[1].width(), 0);
        assert_eq!(lines[2].alignment, None);
    }

    #[test]
    fn test_long_text_wraps_to_width() {
        let mut transcript = Transcript::new();
        transcript.push_bot("a longer reply that cannot fit one line", Vec::new());

        let lines = transcript_lines(&transcript, &Theme::default(), None, 20, Instant::now());
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.width() <= 20));
    }

    #[test]
    fn test_failed_image_cards_are_hidden() {
        let mut transcript = Transcript::new();
        let id = transcript.push_image("https://i.postimg.cc/x/y.png");
        transcript.resolve_image(&id, ImageState::Failed);

        let lines = transcript_lines(&transcript, &Theme::default(), None, 40, Instant::now());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_image_card_states_render_distinctly() {
        let mut transcript = Transcript::new();
        let id = transcript.push_image("https://i.postimg.cc/x/y.png");

        let loading = transcript_lines(&transcript, &Theme::default(), None, 40, Instant::now());
        assert_eq!(loading.len(), 1);
        assert!(format!("{loading:?}").contains("image"));

        transcript.resolve_image(
            &id,
            ImageState::Loaded {
                width: 640,
                height: 480,
            },
        );
        let loaded = transcript_lines(&transcript, &Theme::default(), None, 40, Instant::now());
        // Card line plus the dimmed url line.
        assert_eq!(loaded.len(), 2);
        assert!(format!("{:?}", loaded[0]).contains("640x480"));
        assert!(format!("{:?}", loaded[1]).contains("postimg"));
    }

    #[test]
    fn test_only_latest_bot_chips_take_focus() {
        let mut transcript = Transcript::new();
        transcript.push_bot("old", vec!["Stale".to_string()]);
        transcript.push_bot("new", vec!["Red".to_string(), "Blue".to_string()]);

        let theme = Theme::default();
        let lines = transcript_lines(&transcript, &theme, Some(1), 40, Instant::now());

        let chip_bg = Some(theme.chip_focus.into());
        let focused: Vec<String> = lines
            .iter()
            .flat_map(|line| line.spans.iter())
            .filter(|span| span.style.bg == chip_bg)
            .map(|span| span.content.to_string())
            .collect();
        assert_eq!(focused, ["[Blue]"]);
    }

    #[test]
    fn test_typing_indicator_renders_dots() {
        let mut transcript = Transcript::new();
        let now = Instant::now();
        transcript.begin_typing(now);

        let lines = transcript_lines(&transcript, &Theme::default(), None, 40, now);
        assert_eq!(lines.len(), 1);
        assert!(format!("{:?}", lines[0]).contains('\u{b7}'));
    }
}
