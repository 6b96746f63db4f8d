pub mod charting;
pub mod stats_screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::{
    app::{App, AppState},
    result::TestResult,
    session::SessionState,
    test_type::{Choice, TestType},
    timer::Clock,
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Menu => render_menu(self, area, buf),
            AppState::Arena => render_arena(self, area, buf),
            AppState::Stats => match &self.stats_view {
                Some(view) => stats_screen::render_stats(view, area, buf),
                None => Paragraph::new("loading statistics")
                    .alignment(Alignment::Center)
                    .render(area, buf),
            },
        }
    }
}

fn render_menu<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(TestType::ALL.len() as u16 * 2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled("reflex: how fast are you?", bold_style))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let mut lines = Vec::new();
    for (idx, test_type) in TestType::ALL.iter().enumerate() {
        let config = test_type.config();
        let (marker, style) = if *test_type == app.selected {
            ("> ", bold_style.fg(Color::Cyan))
        } else {
            ("  ", Style::default())
        };
        lines.push(Line::from(Span::styled(
            format!("{marker}{}. {}", idx + 1, config.name),
            style,
        )));
        lines.push(Line::from(Span::styled(
            format!("     {}", config.description),
            Style::default().add_modifier(Modifier::DIM),
        )));
    }
    Paragraph::new(lines).render(chunks[1], buf);

    if let Some(notice) = storage_notice(app) {
        Paragraph::new(Span::styled(notice, Style::default().fg(Color::Yellow)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled(
        "(1-3) start / (enter) selected / (s)tats / (esc)ape",
        italic_style,
    ))
    .render(chunks[3], buf);
}

fn storage_notice<C: Clock>(app: &App<C>) -> Option<&'static str> {
    app.store
        .is_degraded()
        .then_some("storage unavailable: results will not survive this session")
}

fn render_arena<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let session = &app.session;
    let test_type = session.test_type().unwrap_or(app.selected);
    let config = test_type.config();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(vec![
        Line::from(Span::styled(config.name, bold_style)),
        Line::from(Span::styled(config.instruction, italic_style)),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[0], buf);

    let (color, lines) = reaction_panel(app, test_type);
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(color));
    let inner = block.inner(chunks[1]);
    block.render(chunks[1], buf);

    // vertically center the panel text
    let pad = inner.height.saturating_sub(lines.len() as u16) / 2;
    let text_area = Rect {
        y: inner.y + pad,
        height: inner.height.saturating_sub(pad),
        ..inner
    };
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(bold_style.fg(Color::White).bg(color))
        .render(text_area, buf);

    if let Some(left) = session.response_time_left() {
        Paragraph::new(format!("{:.1}s", left.as_secs_f64()))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(
            notice.as_str(),
            bold_style.fg(Color::Yellow),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);
    }

    let legend = if session.state() == SessionState::Complete {
        "(r)etry / (m)enu / (s)tats / (esc)ape"
    } else {
        "(esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[4], buf);
}

/// Background color and centered text for the reaction area
fn reaction_panel<C: Clock>(app: &App<C>, test_type: TestType) -> (Color, Vec<Line<'static>>) {
    match app.session.state() {
        SessionState::Idle | SessionState::Ready => (
            Color::Blue,
            vec![Line::from("Press space to start")],
        ),
        SessionState::Waiting => (
            Color::Red,
            vec![Line::from(match test_type {
                TestType::Audio => "Listen...",
                _ => "Wait for it...",
            })],
        ),
        SessionState::Active => (Color::Green, active_lines(app, test_type)),
        SessionState::Error => (Color::Magenta, vec![Line::from("Too early!")]),
        SessionState::Complete => (Color::DarkGray, complete_lines(app.last_result.as_ref())),
    }
}

fn active_lines<C: Clock>(app: &App<C>, test_type: TestType) -> Vec<Line<'static>> {
    match (test_type, app.session.correct_choice()) {
        (TestType::Choice, Some(target)) => vec![
            Line::from(format!("Choose: {target} {}", target.arrow())),
            Line::from(""),
            Line::from(
                Choice::ALL
                    .iter()
                    .map(|c| format!("{} {c}", c.arrow()))
                    .collect::<Vec<_>>()
                    .join("   "),
            ),
        ],
        (TestType::Audio, _) => vec![Line::from("BEEP! NOW!")],
        _ => vec![Line::from("NOW!")],
    }
}

fn complete_lines(result: Option<&TestResult>) -> Vec<Line<'static>> {
    let Some(result) = result else {
        return vec![Line::from("Done")];
    };

    let mut lines = vec![Line::from(if result.is_timeout() {
        "Timeout".to_string()
    } else {
        format!("{} ms", result.reaction_time_ms())
    })];

    if let Some(correct) = result.correct_choice() {
        lines.push(Line::from(match (result.success(), result.chosen_answer()) {
            (true, _) => "Correct!".to_string(),
            (false, Some(chosen)) => format!("Wrong: {chosen}, expected {correct}"),
            (false, None) => format!("Expected {correct}"),
        }));
    }
    lines
}
