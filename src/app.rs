use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use std::io::Stdout;
use std::time::Duration;
use tracing::{debug, info};

use crate::canvas::{self, CanvasTransform, DragState};
use crate::config::CanvasConfig;
use crate::hotkey::shortcut_from_key;
use crate::store::{HotkeyUpdate, PresetUpdate, StoreEvent};
use crate::Store;

const SLIDE_STEP: i32 = 50;
/// Terminal cells are about twice as tall as they are wide.
pub const CHAR_ASPECT: f64 = 2.0;

#[derive(Clone, Debug)]
pub enum Overlay {
    None,
    Confirm {
        display_id: String,
    },
    Presets {
        selected: usize,
        editing: Option<Editing>,
    },
}

/// Text entry inside the preset menu.
#[derive(Clone, Debug)]
pub enum Editing {
    Name(String),
    Hotkey { name: String, input: String },
    Rebind { preset_id: String, input: String },
}

/// External actions that can be re-issued after a retryable failure.
#[derive(Clone, Debug)]
enum Action {
    Load,
    Refresh,
    ApplyLayout,
    ApplyPreset(String),
    Enable(String),
}

pub struct App {
    pub store: Store,
    pub canvas_config: CanvasConfig,
    pub selected: usize,
    pub overlay: Overlay,
    pub status_msg: String,
    /// Local drag/nudge edits not yet sent to displayplacer.
    pub changed: bool,
    pub list_area: Rect,
    pub canvas_area: Rect,
    drag: Option<DragState>,
    last_action: Option<Action>,
}

impl App {
    pub fn new(store: Store, canvas_config: CanvasConfig) -> Self {
        App {
            store,
            canvas_config,
            selected: 0,
            overlay: Overlay::None,
            status_msg: "Welcome to dpui".to_string(),
            changed: false,
            list_area: Rect::default(),
            canvas_area: Rect::default(),
            drag: None,
            last_action: None,
        }
    }

    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> std::io::Result<()> {
        self.perform(Action::Load);

        loop {
            terminal.draw(|f| crate::ui::draw(f, self))?;

            self.store.advance_toggles();
            self.handle_store_events();

            let poll_timeout = match &self.overlay {
                Overlay::Confirm { .. } => Duration::from_millis(100),
                _ => Duration::from_millis(200),
            };

            if crossterm::event::poll(poll_timeout)? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind == KeyEventKind::Press && !self.handle_key(key) {
                            self.store.teardown();
                            return Ok(());
                        }
                    }
                    Event::Mouse(mouse) => match mouse.kind {
                        MouseEventKind::Down(MouseButton::Left) => {
                            self.handle_mouse_down(mouse.column, mouse.row);
                        }
                        MouseEventKind::Drag(MouseButton::Left) => {
                            self.handle_mouse_drag(mouse.column, mouse.row);
                        }
                        MouseEventKind::Up(MouseButton::Left) => {
                            self.handle_mouse_up();
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    }

    fn handle_store_events(&mut self) {
        for event in self.store.drain_events() {
            match event {
                StoreEvent::ToggleSessionChanged { display_id, remaining_seconds: None } => {
                    if matches!(&self.overlay, Overlay::Confirm { display_id: d } if *d == display_id) {
                        self.overlay = Overlay::None;
                        if self.store.devices().get(&display_id).is_some_and(|d| d.enabled) {
                            self.status_msg = format!("Display {} left enabled", display_id);
                        }
                    }
                }
                StoreEvent::DisplayListChanged => {
                    let len = self.store.devices().len();
                    if self.selected >= len {
                        self.selected = len.saturating_sub(1);
                    }
                }
                StoreEvent::HotkeyActivation { preset_id } => {
                    debug!(preset = %preset_id, "Hotkey pressed");
                }
                StoreEvent::Error { message, .. } => {
                    self.status_msg = format!("Error: {}", message);
                }
                StoreEvent::ToggleSessionChanged { .. } | StoreEvent::PresetListChanged => {}
            }
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.store.devices().displays().get(self.selected).map(|d| d.id.clone())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match &self.overlay {
            Overlay::Confirm { .. } => {
                self.handle_confirm_key(key);
                return true;
            }
            Overlay::Presets { editing: Some(_), .. } => {
                self.handle_edit_key(key);
                return true;
            }
            Overlay::Presets { .. } => {
                self.handle_preset_key(key);
                return true;
            }
            Overlay::None => {}
        }

        if let Some(shortcut) = shortcut_from_key(&key) {
            if self.store.is_shortcut_bound(&shortcut) {
                match self.store.handle_shortcut(&shortcut) {
                    Ok(Some(preset_id)) => {
                        self.changed = false;
                        self.status_msg = format!("Applied preset {} ({})", self.preset_name(&preset_id), shortcut);
                    }
                    Ok(None) => self.status_msg = format!("{} is no longer bound", shortcut),
                    Err(_) => {}
                }
                self.handle_store_events();
                return true;
            }
        }

        let count = self.store.devices().len();

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,

            KeyCode::Tab if count > 0 => {
                self.selected = (self.selected + 1) % count;
            }
            KeyCode::BackTab if count > 0 => {
                self.selected = if self.selected == 0 { count - 1 } else { self.selected - 1 };
            }

            KeyCode::Char('h') | KeyCode::Left => self.nudge(-SLIDE_STEP, 0),
            KeyCode::Char('j') | KeyCode::Down => self.nudge(0, SLIDE_STEP),
            KeyCode::Char('k') | KeyCode::Up => self.nudge(0, -SLIDE_STEP),
            KeyCode::Char('l') | KeyCode::Right => self.nudge(SLIDE_STEP, 0),

            KeyCode::Char('a') | KeyCode::Enter => {
                if self.changed {
                    self.perform(Action::ApplyLayout);
                } else {
                    self.status_msg = "No changes to apply".to_string();
                }
            }
            KeyCode::Char('r') => self.perform(Action::Refresh),
            KeyCode::Char('R') => self.retry(),
            KeyCode::Char('x') => {
                self.store.clear_error();
                self.status_msg.clear();
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_id() {
                    self.perform(Action::Enable(id));
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_id() {
                    self.request_disable(id);
                }
            }
            KeyCode::Char('p') => self.open_presets(),
            _ => {}
        }
        true
    }

    fn perform(&mut self, action: Action) {
        debug!(?action, "Performing");
        self.last_action = Some(action.clone());
        let result = match &action {
            Action::Load => self
                .store
                .load()
                .map(|_| format!("Found {} displays", self.store.devices().len())),
            Action::Refresh => self.store.refresh().map(|_| "Display list refreshed".to_string()),
            Action::ApplyLayout => self.store.apply_layout().map(|_| "Layout applied".to_string()),
            Action::ApplyPreset(id) => {
                let name = self.preset_name(id);
                self.store.apply_preset(id).map(|_| format!("Applied preset {}", name))
            }
            Action::Enable(id) => self.store.request_enable(id).map(|_| format!("Enabled {}", id)),
        };
        match result {
            Ok(msg) => {
                // Every successful action re-reads the device list.
                self.changed = false;
                self.status_msg = msg;
            }
            Err(e) => self.status_msg = format!("Error: {}", e),
        }
        self.handle_store_events();
    }

    fn retry(&mut self) {
        if !self.store.error().is_some_and(|e| e.is_retryable()) {
            return;
        }
        if let Some(action) = self.last_action.clone() {
            info!(?action, "Retrying");
            self.store.clear_error();
            self.perform(action);
        }
    }

    fn preset_name(&self, preset_id: &str) -> String {
        self.store
            .presets()
            .get(preset_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| preset_id.to_string())
    }

    fn nudge(&mut self, dx: i32, dy: i32) {
        let Some(d) = self.store.devices().displays().get(self.selected) else {
            return;
        };
        let (id, x, y) = (d.id.clone(), d.x.saturating_add(dx), d.y.saturating_add(dy));
        if self.store.move_display_local(&id, x, y).is_ok() {
            self.changed = true;
            self.status_msg = format!("{} at {},{} - [a] to apply", id, x, y);
        }
        self.handle_store_events();
    }

    // --- Mouse ---

    /// The transform the canvas is drawn with. Frozen while a drag is active.
    pub fn canvas_transform(&self) -> CanvasTransform {
        if let Some(drag) = &self.drag {
            return *drag.transform();
        }
        let inner = inner_area(self.canvas_area);
        let bounds = self
            .canvas_config
            .bounds(inner.width as f64, inner.height as f64 * CHAR_ASPECT);
        CanvasTransform::fit(self.store.devices(), bounds)
    }

    fn canvas_point(&self, col: u16, row: u16) -> Option<(f64, f64)> {
        let inner = inner_area(self.canvas_area);
        if col < inner.x || col >= inner.x + inner.width || row < inner.y || row >= inner.y + inner.height {
            return None;
        }
        let cx = (col - inner.x) as f64 + 0.5;
        let cy = ((row - inner.y) as f64 + 0.5) * CHAR_ASPECT;
        Some((cx, cy))
    }

    fn handle_mouse_down(&mut self, col: u16, row: u16) {
        if !matches!(self.overlay, Overlay::None) {
            return;
        }

        if contains(self.list_area, col, row) {
            let content_y = row.saturating_sub(self.list_area.y + 1);
            let mut y_offset = 0u16;
            for (i, d) in self.store.devices().displays().iter().enumerate() {
                let item_height: u16 = if d.enabled { 3 } else { 2 };
                if content_y >= y_offset && content_y < y_offset + item_height {
                    self.selected = i;
                    return;
                }
                y_offset += item_height;
            }
            return;
        }

        let Some((cx, cy)) = self.canvas_point(col, row) else {
            return;
        };
        let transform = self.canvas_transform();
        let displays = self.store.devices().displays();
        let Some(hit) = canvas::hit_test(&transform, displays, cx, cy) else {
            return;
        };
        if let Some(i) = displays.iter().position(|d| d.id == hit.id) {
            self.selected = i;
        }
        if hit.enabled {
            self.drag = Some(DragState::begin(transform, hit, cx, cy));
        }
    }

    fn handle_mouse_drag(&mut self, col: u16, row: u16) {
        let Some(drag) = &self.drag else {
            return;
        };
        let Some((cx, cy)) = self.canvas_point(col, row) else {
            return;
        };
        let (x, y) = drag.origin_at(cx, cy);
        let id = drag.display_id.clone();
        if self.store.move_display_local(&id, x, y).is_ok() {
            self.changed = true;
        }
        self.handle_store_events();
    }

    fn handle_mouse_up(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        if let Some(d) = self.store.devices().get(&drag.display_id) {
            if (d.x, d.y) != (drag.orig_x, drag.orig_y) {
                self.status_msg = format!("Moved {} to {},{} - [a] to apply", d.id, d.x, d.y);
            }
        }
    }

    // --- Toggle ---

    fn request_disable(&mut self, id: String) {
        if self.store.devices().get(&id).is_some_and(|d| !d.enabled) {
            self.status_msg = format!("{} is already disabled", id);
            return;
        }
        match self.store.request_disable(&id) {
            Ok(_) => {
                self.status_msg = format!("Confirm disabling {}", id);
                self.overlay = Overlay::Confirm { display_id: id };
            }
            Err(e) => self.status_msg = format!("Error: {}", e),
        }
        self.handle_store_events();
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let Overlay::Confirm { display_id } = self.overlay.clone() else {
            return;
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.overlay = Overlay::None;
                match self.store.confirm_disable(&display_id) {
                    Ok(true) => {
                        self.changed = false;
                        self.status_msg = format!("Disabled {}", display_id);
                    }
                    Ok(false) => self.status_msg = "Confirmation window expired".to_string(),
                    Err(e) => self.status_msg = format!("Error: {}", e),
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.store.cancel_disable(&display_id);
            }
            _ => {}
        }
        self.handle_store_events();
    }

    // --- Presets ---

    fn open_presets(&mut self) {
        self.overlay = Overlay::Presets { selected: 0, editing: None };
    }

    fn handle_preset_key(&mut self, key: KeyEvent) {
        let Overlay::Presets { selected, .. } = self.overlay.clone() else {
            return;
        };
        let presets = &self.store.presets().presets;
        let total = presets.len();
        let current = presets.get(selected).map(|p| p.id.clone());

        match key.code {
            KeyCode::Char('j') | KeyCode::Down if selected + 1 < total => {
                self.overlay = Overlay::Presets { selected: selected + 1, editing: None };
            }
            KeyCode::Char('k') | KeyCode::Up if selected > 0 => {
                self.overlay = Overlay::Presets { selected: selected - 1, editing: None };
            }
            KeyCode::Char('y') | KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(id) = current {
                    self.overlay = Overlay::None;
                    self.perform(Action::ApplyPreset(id));
                }
            }
            KeyCode::Char(c @ '1'..='9') => {
                let idx = (c as u8 - b'1') as usize;
                if let Some(p) = presets.get(idx) {
                    let id = p.id.clone();
                    self.overlay = Overlay::None;
                    self.perform(Action::ApplyPreset(id));
                }
            }
            KeyCode::Char('s') => {
                self.overlay = Overlay::Presets {
                    selected,
                    editing: Some(Editing::Name(String::new())),
                };
            }
            KeyCode::Char('h') => {
                if let Some(preset_id) = current {
                    self.overlay = Overlay::Presets {
                        selected,
                        editing: Some(Editing::Rebind { preset_id, input: String::new() }),
                    };
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = current {
                    let name = self.preset_name(&id);
                    match self.store.delete_preset(&id) {
                        Ok(()) => self.status_msg = format!("Deleted preset: {}", name),
                        Err(e) => self.status_msg = format!("Error: {}", e),
                    }
                    let total = self.store.presets().presets.len();
                    self.overlay = Overlay::Presets {
                        selected: selected.min(total.saturating_sub(1)),
                        editing: None,
                    };
                    self.handle_store_events();
                }
            }
            KeyCode::Esc => self.overlay = Overlay::None,
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let Overlay::Presets { selected, editing: Some(editing) } = &mut self.overlay else {
            return;
        };
        let selected = *selected;
        let input = match editing {
            Editing::Name(input) | Editing::Hotkey { input, .. } | Editing::Rebind { input, .. } => input,
        };

        match key.code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Esc => self.overlay = Overlay::Presets { selected, editing: None },
            KeyCode::Enter => {
                let editing = editing.clone();
                self.submit_edit(selected, editing);
            }
            _ => {}
        }
    }

    fn submit_edit(&mut self, selected: usize, editing: Editing) {
        match editing {
            Editing::Name(name) => {
                if name.trim().is_empty() {
                    return;
                }
                self.overlay = Overlay::Presets {
                    selected,
                    editing: Some(Editing::Hotkey { name, input: String::new() }),
                };
            }
            Editing::Hotkey { name, input } => {
                let hotkey = Some(input.trim()).filter(|h| !h.is_empty());
                match self.store.save_current_layout(&name, hotkey) {
                    Ok(p) => {
                        self.changed = false;
                        self.status_msg = format!("Saved preset: {}", p.name);
                        self.overlay = Overlay::None;
                    }
                    Err(e) => {
                        self.status_msg = format!("Error saving: {}", e);
                        self.overlay = Overlay::Presets { selected, editing: None };
                    }
                }
            }
            Editing::Rebind { preset_id, input } => {
                let hotkey = match input.trim() {
                    "" => HotkeyUpdate::Clear,
                    h => HotkeyUpdate::Set(h.to_string()),
                };
                let update = PresetUpdate { hotkey, ..Default::default() };
                match self.store.update_preset(&preset_id, update) {
                    Ok(p) => {
                        self.status_msg = match &p.hotkey {
                            Some(h) => format!("{} bound to {}", p.name, h),
                            None => format!("Cleared hotkey of {}", p.name),
                        };
                    }
                    Err(e) => self.status_msg = format!("Error: {}", e),
                }
                self.overlay = Overlay::Presets { selected, editing: None };
            }
        }
        self.handle_store_events();
    }
}

/// Area inside a bordered block.
pub fn inner_area(area: Rect) -> Rect {
    Rect {
        x: area.x.saturating_add(1),
        y: area.y.saturating_add(1),
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    }
}

fn contains(area: Rect, col: u16, row: u16) -> bool {
    col >= area.x && col < area.x + area.width && row >= area.y && row < area.y + area.height
}
