use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::App;
use crate::toggle::ToggleState;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .store
        .devices()
        .displays()
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let is_selected = i == app.selected;

            let name_style = if !d.enabled {
                Style::default().fg(Color::DarkGray)
            } else if is_selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };

            let marker = if is_selected { "▸ " } else { "  " };

            let mut title = vec![
                Span::styled(marker, name_style),
                Span::styled(d.id.chars().take(40).collect::<String>(), name_style),
            ];
            if let ToggleState::PendingConfirmation { remaining_seconds } = app.store.toggle_state(&d.id) {
                title.push(Span::styled(
                    format!("  disabling in {}s", remaining_seconds),
                    Style::default().fg(Color::Red),
                ));
            }
            let mut lines = vec![Line::from(title)];

            if !d.enabled {
                lines.push(Line::from(vec![
                    Span::raw("    "),
                    Span::styled("[DISABLED]", Style::default().fg(Color::Red)),
                ]));
            } else {
                lines.push(Line::from(vec![
                    Span::raw("    "),
                    Span::styled(d.resolution_string(), Style::default().fg(Color::Green)),
                    Span::styled(format!("  {}", d.rotation), Style::default().fg(Color::Green)),
                ]));
                lines.push(Line::from(vec![
                    Span::raw("    "),
                    Span::styled(format!("Pos: {},{}", d.x, d.y), Style::default().fg(Color::Blue)),
                ]));
            }

            ListItem::new(lines)
        })
        .collect();

    let title = if app.changed { " Displays * " } else { " Displays " };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}
