use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::centered_rect;
use crate::app::{App, Editing};
use crate::hotkey::Shortcut;
use crate::preset::Preset;
use crate::Store;

pub fn draw(f: &mut Frame, app: &App, selected: usize, editing: Option<&Editing>, area: Rect) {
    let popup = centered_rect(50, 60, area);
    f.render_widget(Clear, popup);

    let presets = &app.store.presets().presets;
    match editing {
        Some(Editing::Name(input)) => {
            draw_input_dialog(f, " Save Preset ", "Enter preset name:", input, None, None, popup)
        }
        Some(Editing::Hotkey { input, .. }) => draw_input_dialog(
            f,
            " Save Preset ",
            "Hotkey (e.g. Ctrl+Alt+1), empty for none:",
            input,
            None,
            shortcut_feedback(&app.store, input, None),
            popup,
        ),
        Some(Editing::Rebind { preset_id, input }) => {
            let current = presets
                .iter()
                .find(|p| &p.id == preset_id)
                .and_then(|p| p.hotkey.as_deref());
            let feedback = shortcut_feedback(&app.store, input, current);
            draw_input_dialog(f, " Hotkey ", "New hotkey, empty to clear:", input, current, feedback, popup)
        }
        None => draw_preset_list(f, &app.store, presets, selected, popup),
    }
}

/// Live check of a shortcut being typed.
fn shortcut_feedback(store: &Store, input: &str, current: Option<&str>) -> Option<(String, Color)> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    Some(match store.is_shortcut_available(input) {
        Ok(true) => ("available".to_string(), Color::Green),
        Ok(false) if is_current(input, current) => ("current hotkey".to_string(), Color::DarkGray),
        Ok(false) => ("already in use".to_string(), Color::Red),
        Err(e) => (e.to_string(), Color::Red),
    })
}

fn is_current(input: &str, current: Option<&str>) -> bool {
    match (input.parse::<Shortcut>(), current) {
        (Ok(s), Some(c)) => s.to_string() == c,
        _ => false,
    }
}

fn draw_preset_list(f: &mut Frame, store: &Store, presets: &[Preset], selected: usize, area: Rect) {
    let active: Vec<&str> = store
        .hotkey_bindings()
        .into_iter()
        .map(|b| b.preset_id.as_str())
        .collect();

    let mut items = Vec::new();

    for (idx, p) in presets.iter().enumerate() {
        let num = if idx < 9 {
            format!(" [{}] ", idx + 1)
        } else {
            "     ".to_string()
        };

        let mut spans = vec![
            Span::styled(num, Style::default().fg(Color::DarkGray)),
            Span::styled("● ", Style::default().fg(Color::Cyan)),
            Span::styled(p.name.clone(), Style::default().fg(Color::White)),
        ];
        if let Some(h) = &p.hotkey {
            if active.contains(&p.id.as_str()) {
                spans.push(Span::styled(format!("  {}", h), Style::default().fg(Color::Magenta)));
            } else {
                spans.push(Span::styled(format!("  {} (inactive)", h), Style::default().fg(Color::DarkGray)));
            }
        }
        items.push(ListItem::new(Line::from(spans)));
    }

    if items.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            "  No saved presets - [s] saves the current layout",
            Style::default().fg(Color::DarkGray),
        ))));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Presets ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        );

    let mut state = ListState::default();
    if !presets.is_empty() {
        state.select(Some(selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_input_dialog(
    f: &mut Frame,
    title: &str,
    prompt: &str,
    input: &str,
    current: Option<&str>,
    feedback: Option<(String, Color)>,
    area: Rect,
) {
    let inner = centered_rect(80, 40, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(prompt, Style::default().fg(Color::White))),
    ];
    if let Some(current) = current {
        lines.push(Line::from(Span::styled(
            format!("current: {}", current),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(
            format!("▸ {}_", input),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    ]);
    match feedback {
        Some((text, color)) => lines.push(Line::from(Span::styled(text, Style::default().fg(color)))),
        None => lines.push(Line::from("")),
    }
    lines.push(Line::from(Span::styled(
        "[Enter] OK  [Esc] Cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let para = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        )
        .alignment(Alignment::Center);

    f.render_widget(para, inner);
}
