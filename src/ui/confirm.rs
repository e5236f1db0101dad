use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::centered_rect;
use crate::toggle::CONFIRM_SECONDS;

pub fn draw(f: &mut Frame, display_id: &str, remaining: u32, area: Rect) {
    let popup = centered_rect(40, 20, area);
    f.render_widget(Clear, popup);

    let bar_width = 20usize;
    let filled = ((remaining as f64 / CONFIRM_SECONDS as f64) * bar_width as f64).ceil() as usize;
    let filled = filled.min(bar_width);
    let bar = format!("[{}{}]", "█".repeat(filled), "░".repeat(bar_width - filled));

    let color = if remaining <= 3 { Color::Red } else { Color::Yellow };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Disable display {}?", display_id),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Cancelling in {}s", remaining),
            Style::default().fg(color),
        )),
        Line::from(Span::styled(bar, Style::default().fg(color))),
        Line::from(""),
        Line::from(Span::styled(
            "[Y / Enter] Disable   [N / Esc] Keep",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let para = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Confirm ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .alignment(Alignment::Center);

    f.render_widget(para, popup);
}
