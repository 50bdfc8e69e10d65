//! Rendering for the board. Everything drawn comes from a [`BoardView`]
//! snapshot taken once per frame.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

pub struct RowView {
    pub name: &'static str,
    pub selected: bool,
    pub locally_enabled: bool,
    pub fully_enabled: bool,
    pub output_level: f32,
    pub audible_gain: f32,
    /// None for sounds without a running state (one-shot pops).
    pub playing: Option<bool>,
}

pub struct BoardView {
    pub device: String,
    pub sample_rate: f32,
    pub sound_enabled: bool,
    pub simulation_visible: bool,
    pub rows: Vec<RowView>,
    pub status: String,
}

pub fn render(frame: &mut Frame, view: &BoardView) {
    let area = frame.area();

    let mut constraints = vec![Constraint::Length(3)];
    constraints.extend(view.rows.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(1)); // Help bar

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_header(frame, chunks[0], view);
    for (row, &chunk) in view.rows.iter().zip(chunks.iter().skip(1)) {
        render_row(frame, chunk, row);
    }

    let help = Paragraph::new(
        " [Q] Quit  [↑↓] Select  [Space] Enable  [Enter] Trigger  [1-8] Pop  [M] Sound  [V] Visible  [+/-] Level",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[chunks.len() - 1]);
}

fn flag(label: &str, on: bool) -> Span<'static> {
    Span::styled(
        format!("{label}: {}  ", if on { "on" } else { "off" }),
        Style::default().fg(if on { Color::Green } else { Color::Red }),
    )
}

fn render_header(frame: &mut Frame, area: Rect, view: &BoardView) {
    let block = Block::default().title(" sfx-board ").borders(Borders::ALL);

    let line = Line::from(vec![
        Span::styled(
            format!(" {}  {:.1}kHz  ", view.device, view.sample_rate / 1000.0),
            Style::default().fg(Color::Cyan),
        ),
        flag("sound", view.sound_enabled),
        flag("visible", view.simulation_visible),
        Span::styled(view.status.clone(), Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_row(frame: &mut Frame, area: Rect, row: &RowView) {
    let marker = if row.selected { "▶ " } else { "  " };
    let state = match row.playing {
        Some(true) => " playing",
        Some(false) => " idle",
        None => "",
    };
    let title = format!(
        " {marker}{}{state}  local: {}  level {:.2} ",
        row.name,
        if row.locally_enabled { "on" } else { "off" },
        row.output_level,
    );

    let color = if row.fully_enabled {
        Color::Green
    } else {
        Color::DarkGray
    };
    let border = if row.selected { Color::Yellow } else { Color::White };

    // Gain can exceed 1 when a level amplifies; the meter tops out at 2.
    let ratio = (row.audible_gain as f64 / 2.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        )
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!("gain {:.2}", row.audible_gain));

    frame.render_widget(gauge, area);
}
