use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Rectangle},
        Block, Borders,
    },
    Frame,
};

use crate::app::{inner_area, App, CHAR_ASPECT};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Layout ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.store.devices().is_empty() {
        let msg = ratatui::widgets::Paragraph::new("No displays found")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(msg, area);
        return;
    }

    // Canvas units are cells horizontally and half-cells vertically, with
    // y growing downward like real coordinates.
    let inner = inner_area(area);
    let canvas_w = inner.width as f64;
    let canvas_h = inner.height as f64 * CHAR_ASPECT;
    let transform = app.canvas_transform();
    let selected = app.selected;
    let displays = app.store.devices().displays();

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, canvas_w])
        .y_bounds([0.0, canvas_h])
        .paint(move |ctx| {
            for (i, d) in displays.iter().enumerate() {
                if !d.has_geometry() {
                    continue;
                }
                let (x, y, w, h) = transform.rect(d);
                let color = if !d.enabled {
                    Color::DarkGray
                } else if i == selected {
                    Color::Yellow
                } else {
                    Color::Cyan
                };

                // Flip y: ratatui's canvas grows upward.
                let flipped_y = canvas_h - y - h;
                ctx.draw(&Rectangle { x, y: flipped_y, width: w, height: h, color });

                let cx = x + w / 2.0;
                let cy = flipped_y + h / 2.0;
                ctx.print(cx, cy + h * 0.12, Line::from(Span::styled(d.id.clone(), Style::default().fg(color))));
                ctx.print(
                    cx,
                    cy - h * 0.12,
                    Line::from(Span::styled(d.resolution_string(), Style::default().fg(Color::DarkGray))),
                );
            }
        });

    f.render_widget(canvas, area);
}
