use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, Editing, Overlay};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    match app.store.error() {
        Some(e) => {
            let hint = if e.is_retryable() { "  [R] Retry  [x] Dismiss" } else { "  [x] Dismiss" };
            lines.push(Line::from(vec![
                Span::styled(format!("Error: {}", e), Style::default().fg(Color::Red)),
                Span::styled(hint, Style::default().fg(Color::DarkGray)),
            ]));
        }
        None => {
            let msg_color = if app.store.is_loading() {
                Color::Yellow
            } else if app.status_msg.starts_with("Saved") || app.status_msg.starts_with("Applied") {
                Color::Green
            } else {
                Color::White
            };
            let mut spans = vec![Span::styled(app.status_msg.as_str(), Style::default().fg(msg_color))];
            let pending = app.store.pending_toggles();
            if !pending.is_empty() {
                let ids: Vec<String> = pending.iter().map(|(id, secs)| format!("{} ({}s)", id, secs)).collect();
                spans.push(Span::styled(
                    format!("  pending disable: {}", ids.join(", ")),
                    Style::default().fg(Color::Red),
                ));
            }
            lines.push(Line::from(spans));
        }
    }

    let help = match &app.overlay {
        Overlay::Confirm { .. } => "[Y/Enter] Disable  [N/Esc] Keep",
        Overlay::Presets { editing: Some(Editing::Name(_)), .. } => "Type name, [Enter] Next  [Esc] Cancel",
        Overlay::Presets { editing: Some(_), .. } => "Type shortcut, [Enter] OK  [Esc] Cancel",
        Overlay::Presets { .. } => "[j/k] Nav  [Enter] Apply  [s] Save  [h] Hotkey  [d] Delete  [Esc] Close",
        Overlay::None => {
            if app.changed {
                "[Tab] Select  [hjkl] Move  [d/e] Dis/En  [a] Apply  [r] Reload  [p] Presets  [q] Quit"
            } else {
                "[Tab] Select  [hjkl] Move  [d/e] Dis/En  [r] Reload  [p] Presets  [q] Quit"
            }
        }
    };
    lines.push(Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))));

    let para = Paragraph::new(lines).alignment(Alignment::Center);
    f.render_widget(para, area);
}
