use std::ops::Range;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use keysprint::{language::Difficulty, Phase, TimeLimit};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VISIBLE_LINES: usize = 3;
/// The cursor is kept on this visible line once the text scrolls
const CURSOR_LINE: usize = 2;

/// How a single target char renders against the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharState {
    Correct,
    Incorrect,
    Current,
    Pending,
}

pub fn char_states(target: &str, input: &str, show_cursor: bool) -> Vec<CharState> {
    let mut typed = input.chars();
    let cursor = input.chars().count();

    target
        .chars()
        .enumerate()
        .map(|(idx, expected)| match typed.next() {
            Some(c) if c == expected => CharState::Correct,
            Some(_) => CharState::Incorrect,
            None if idx == cursor && show_cursor => CharState::Current,
            None => CharState::Pending,
        })
        .collect()
}

/// Greedy word wrap. Each range holds the char indices of one line, the
/// trailing space of a word stays on that word's line.
pub fn wrap_lines(text: &str, width: usize) -> Vec<Range<usize>> {
    // keep a column free so a trailing space (and the cursor on it) stays visible
    let width = width.max(2) - 1;
    let words: Vec<&str> = text.split(' ').collect();

    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut line_width = 0;
    let mut pos = 0;

    for (i, word) in words.iter().enumerate() {
        let w = word.width();
        if line_width > 0 && line_width + w > width {
            lines.push(line_start..pos);
            line_start = pos;
            line_width = 0;
        }

        pos += word.chars().count();
        line_width += w;
        if i + 1 < words.len() {
            pos += 1;
            line_width += 1;
        }
    }

    if pos > line_start || lines.is_empty() {
        lines.push(line_start..pos);
    }
    lines
}

/// Index of the wrapped line holding char `cursor`
pub fn line_of(lines: &[Range<usize>], cursor: usize) -> usize {
    lines
        .iter()
        .position(|r| r.contains(&cursor))
        .unwrap_or(lines.len().saturating_sub(1))
}

/// First visible line so the cursor never sits below [`CURSOR_LINE`]
pub fn scroll_offset(cursor_line: usize) -> usize {
    cursor_line.saturating_sub(CURSOR_LINE)
}

fn option_span(label: String, active: bool) -> Span<'static> {
    let style = if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    Span::styled(label, style)
}

fn settings_line(app: &App) -> Line<'static> {
    let config = app.session.config();
    let sep = || Span::styled("  │  ", Style::default().add_modifier(Modifier::DIM));

    let mut spans = Vec::new();
    for secs in TimeLimit::ALLOWED {
        spans.push(option_span(format!("{secs} "), config.time_limit.secs() == secs));
    }
    spans.push(sep());
    for difficulty in Difficulty::ALL {
        spans.push(option_span(format!("{difficulty} "), config.difficulty == difficulty));
    }
    spans.push(sep());
    spans.push(option_span("numbers ".to_string(), config.include_numbers));
    spans.push(option_span("symbols".to_string(), config.include_symbols));

    Line::from(spans)
}

fn text_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
    let dim_bold_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);

    let target: Vec<char> = app.session.target_text().chars().collect();
    let states = char_states(
        app.session.target_text(),
        app.session.user_input(),
        !app.session.has_finished(),
    );

    let lines = wrap_lines(app.session.target_text(), width);
    let first = scroll_offset(line_of(&lines, app.session.input_len()));

    lines
        .iter()
        .skip(first)
        .take(VISIBLE_LINES)
        .map(|range| {
            let spans = range
                .clone()
                .map(|idx| {
                    let expected = target[idx];
                    match states[idx] {
                        CharState::Correct => Span::styled(expected.to_string(), green_bold_style),
                        CharState::Incorrect => Span::styled(
                            match expected {
                                ' ' => "·".to_owned(),
                                c => c.to_string(),
                            },
                            red_bold_style,
                        ),
                        CharState::Current => {
                            Span::styled(expected.to_string(), underlined_dim_bold_style)
                        }
                        CharState::Pending => Span::styled(expected.to_string(), dim_bold_style),
                    }
                })
                .collect::<Vec<Span>>();
            Line::from(spans)
        })
        .collect()
}

fn results_lines(app: &App) -> Vec<Line<'static>> {
    let m = app.session.metrics();
    vec![
        Line::from(Span::styled(
            format!("{} wpm", m.wpm),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "raw {}   acc {}%   time {:.1}s",
                m.raw_wpm,
                m.accuracy,
                app.session.elapsed_secs()
            ),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "next test ⏎",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ]
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = &self.session;
        let dim_bold_style = Style::default().add_modifier(Modifier::BOLD | Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let text_height = VISIBLE_LINES as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(1), // status
                Constraint::Length(1), // padding
                Constraint::Length(text_height),
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
                Constraint::Min(0),
            ])
            .split(area);

        let status = match session.phase() {
            Phase::Idle if !self.focused => Paragraph::new(Span::styled(
                "focus the terminal to start typing",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::ITALIC),
            )),
            Phase::Idle => Paragraph::new(settings_line(self)),
            Phase::Running => Paragraph::new(Span::styled(
                format!(
                    "{:.1}   {} wpm",
                    session.remaining_secs(),
                    session.metrics().wpm
                ),
                dim_bold_style,
            )),
            Phase::Finished => Paragraph::new(Span::styled("finished", dim_bold_style)),
        };
        status.alignment(Alignment::Center).render(chunks[1], buf);

        let body = match session.phase() {
            Phase::Finished => Paragraph::new(results_lines(self)).alignment(Alignment::Center),
            _ => Paragraph::new(text_lines(self, chunks[3].width.max(1) as usize)),
        };
        body.render(chunks[3], buf);

        let legend = match session.phase() {
            Phase::Idle => "(tab) time / (shift+tab) difficulty / (ctrl+n) numbers / (ctrl+s) symbols / (esc)ape",
            Phase::Running => "(→) restart / (esc)ape",
            Phase::Finished => "(enter) next test / (esc)ape",
        };
        Paragraph::new(Span::styled(legend, italic_style))
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keysprint::{clock::ManualClock, runtime::ManualTickScheduler, Session, SessionConfig};
    use rand::{rngs::StdRng, SeedableRng};
    use ratatui::{backend::TestBackend, Terminal};

    fn app_with_text(text: &str) -> App {
        let mut session = Session::with_parts(
            SessionConfig::default(),
            ManualTickScheduler::new(),
            ManualClock::new(),
            StdRng::seed_from_u64(0),
        );
        session.set_target_text(text);
        App::new(session)
    }

    fn rendered(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| f.render_widget(app, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_char_states() {
        use CharState::*;
        assert_eq!(
            char_states("cats", "cb", true),
            vec![Correct, Incorrect, Current, Pending]
        );
        assert_eq!(char_states("ab", "ab", false), vec![Correct, Correct]);
        assert_eq!(char_states("ab", "", false), vec![Pending, Pending]);
    }

    #[test]
    fn test_wrap_lines_keeps_words_whole() {
        let text = "the quick brown fox";
        let lines = wrap_lines(text, 11);
        let rendered: Vec<String> = lines
            .iter()
            .map(|r| text.chars().skip(r.start).take(r.len()).collect())
            .collect();
        assert_eq!(rendered, vec!["the quick ", "brown fox"]);
    }

    #[test]
    fn test_wrap_lines_covers_every_char() {
        let text = "asynchronous programming paradigms facilitate non-blocking operations";
        let lines = wrap_lines(text, 20);
        assert_eq!(lines.first().unwrap().start, 0);
        assert_eq!(lines.last().unwrap().end, text.chars().count());
        for pair in lines.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_wrap_lines_empty_text() {
        assert_eq!(wrap_lines("", 10), vec![0..0]);
    }

    #[test]
    fn test_scrolls_after_third_line() {
        let lines = vec![0..5, 5..10, 10..15, 15..20, 20..25];
        assert_eq!(scroll_offset(line_of(&lines, 0)), 0);
        assert_eq!(scroll_offset(line_of(&lines, 12)), 0);
        assert_eq!(scroll_offset(line_of(&lines, 15)), 1);
        assert_eq!(scroll_offset(line_of(&lines, 24)), 2);
        // cursor past the end stays on the last line
        assert_eq!(line_of(&lines, 25), 4);
    }

    #[test]
    fn test_idle_render_shows_settings_and_text() {
        let app = app_with_text("hello world");
        let content = rendered(&app, 100, 20);

        assert!(content.contains("hello world"));
        assert!(content.contains("medium"));
        assert!(content.contains("numbers"));
    }

    #[test]
    fn test_unfocused_idle_render_shows_hint() {
        let mut app = app_with_text("hello world");
        app.focused = false;
        let content = rendered(&app, 100, 20);

        assert!(content.contains("focus the terminal"));
    }

    #[test]
    fn test_running_render_shows_timer() {
        let mut app = app_with_text("hello world");
        app.session.type_char('h');
        let content = rendered(&app, 100, 20);

        assert!(content.contains("60.0"));
        assert!(content.contains("wpm"));
    }

    #[test]
    fn test_finished_render_shows_results() {
        let mut app = app_with_text("hi");
        app.session.on_input("hi");
        let content = rendered(&app, 100, 20);

        assert!(content.contains("wpm"));
        assert!(content.contains("acc"));
        assert!(content.contains("next test"));
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let app = app_with_text("hello world");
        let _ = rendered(&app, 4, 3);
    }
}
