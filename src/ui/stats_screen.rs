use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget, Wrap},
};

use crate::{
    app::StatsView,
    stats::{self, TypeBreakdown},
    test_type::TestType,
    ui::charting::{compute_chart_params, format_label},
};

/// Green under 250 ms, yellow under 400 ms, red beyond
pub fn time_color(ms: f64) -> Color {
    if ms < 250.0 {
        Color::Green
    } else if ms < 400.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn format_ms(ms: Option<f64>) -> String {
    match ms {
        Some(v) if v > 0.0 => format!("{}ms", v.round()),
        _ => "--".to_string(),
    }
}

/// Pure presenter for one row of the per-type table
pub fn present_row(test_type: TestType, data: &TypeBreakdown) -> Row<'static> {
    Row::new(vec![
        Cell::from(test_type.config().name),
        Cell::from(data.count.to_string()),
        Cell::from(format!("{}ms", data.average))
            .style(Style::default().fg(time_color(data.average as f64))),
        Cell::from(format!("{}ms", data.best))
            .style(Style::default().fg(time_color(data.best as f64))),
        Cell::from(format!("{:.0}%", data.accuracy)),
    ])
}

pub fn render_stats(view: &StatsView, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(4), // cards
            Constraint::Length(6), // per type
            Constraint::Min(6),    // trend chart
            Constraint::Length(2), // distribution + achievements
            Constraint::Length(1), // legend
        ])
        .split(area);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let user = &view.user_stats;

    let (accuracy, consistency, improvement) = match &view.summary {
        Some(s) => (
            format!("{}%", s.accuracy),
            format!("{}%", s.consistency),
            match s.improvement {
                0 => "--".to_string(),
                i if i > 0 => format!("improved {i}%"),
                i => format!("declined {}%", i.abs()),
            },
        ),
        None => ("--".into(), "--".into(), "--".into()),
    };

    let cards = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(format!("avg {}", format_ms(user.average_reaction_time)), bold),
            Span::raw("   "),
            Span::styled(
                format!("best {}", format_ms(user.best_reaction_time.map(|b| b as f64))),
                bold.fg(Color::Green),
            ),
            Span::raw("   "),
            Span::styled(format!("{} tests", user.total_tests), bold),
            Span::raw("   "),
            Span::styled(format!("{accuracy} acc"), bold),
        ]),
        Line::from(format!(
            "consistency {consistency}   trend {improvement}   streak {} (best {})",
            user.streaks.current, user.streaks.best
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("Statistics"));
    cards.render(chunks[0], buf);

    let rows: Vec<Row> = view
        .summary
        .as_ref()
        .map(|s| {
            s.test_type_performance
                .iter()
                .map(|(t, data)| present_row(*t, data))
                .collect()
        })
        .unwrap_or_default();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(36),
            Constraint::Percentage(14),
            Constraint::Percentage(16),
            Constraint::Percentage(16),
            Constraint::Percentage(18),
        ],
    )
    .header(
        Row::new(vec!["Test", "Count", "Average", "Best", "Accuracy"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("By test type"));
    Widget::render(table, chunks[1], buf);

    if view.trend.is_empty() {
        Paragraph::new("no reactions recorded yet")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Recent tests"))
            .render(chunks[2], buf);
    } else {
        let (x_max, y_max) = compute_chart_params(&view.trend);
        let datasets = vec![Dataset::default()
            .marker(Marker::Braille)
            .style(Style::default().fg(Color::Cyan))
            .graph_type(GraphType::Line)
            .data(&view.trend)];
        let chart = Chart::new(datasets)
            .block(Block::default().borders(Borders::ALL).title("Recent tests"))
            .x_axis(
                Axis::default()
                    .title("test")
                    .bounds([1.0, x_max])
                    .labels(vec![
                        Span::styled("1", bold),
                        Span::styled(format_label(x_max), bold),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("ms")
                    .bounds([0.0, y_max])
                    .labels(vec![
                        Span::styled("0", bold),
                        Span::styled(format_label(y_max), bold),
                    ]),
            );
        chart.render(chunks[2], buf);
    }

    let distribution = stats::type_distribution(&user.tests_by_type)
        .into_iter()
        .map(|(t, n, share)| format!("{t} {n} ({share}%)"))
        .collect::<Vec<_>>()
        .join("  ");
    let achievements = if user.achievements.is_empty() {
        "none yet".to_string()
    } else {
        user.achievements
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    Paragraph::new(vec![
        Line::from(distribution),
        Line::from(format!("achievements: {achievements}")),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(b)ack / (q)uit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}
