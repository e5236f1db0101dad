//! In-memory collaborators for tests.

use std::cell::Cell;
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::codec;
use crate::display::{DeviceSet, Display, Rotation};
use crate::error::{Error, Result};
use crate::hotkey::{HotkeyBackend, Shortcut};
use crate::preset::{PresetCollection, PresetStorage};
use crate::service::DisplayService;
use crate::toggle::Clock;

#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock { now: Rc::new(Cell::new(Instant::now())) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Pretends to be displayplacer: applies tokens to an in-memory arrangement.
#[derive(Debug, Default)]
pub struct FakeDisplayService {
    pub displays: Vec<Display>,
    pub applied: Vec<String>,
    pub list_calls: usize,
    pub fail_apply: Option<Error>,
    pub fail_list: Option<Error>,
}

impl FakeDisplayService {
    pub fn new(displays: Vec<Display>) -> Self {
        FakeDisplayService { displays, ..Default::default() }
    }

    pub fn disable_calls(&self) -> usize {
        self.applied.iter().filter(|c| c.contains("enabled:false")).count()
    }

    fn apply_token(&mut self, token: &str) -> Result<()> {
        let id = token
            .split_whitespace()
            .find_map(|p| p.strip_prefix("id:"))
            .ok_or_else(|| Error::InvalidConfig(token.to_string()))?;
        let display = self
            .displays
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::DisplayNotFound(id.to_string()))?;

        for part in token.split_whitespace() {
            if let Some(v) = part.strip_prefix("enabled:") {
                display.enabled = v == "true";
            } else if let Some(v) = part.strip_prefix("res:") {
                let (w, h) = v.split_once('x').ok_or_else(|| Error::InvalidConfig(v.to_string()))?;
                display.width = w.parse().map_err(|_| Error::InvalidConfig(v.to_string()))?;
                display.height = h.parse().map_err(|_| Error::InvalidConfig(v.to_string()))?;
            } else if let Some(v) = part.strip_prefix("origin:") {
                let inner = v.trim_matches(|c| c == '(' || c == ')');
                let (x, y) = inner.split_once(',').ok_or_else(|| Error::InvalidConfig(v.to_string()))?;
                display.x = x.parse().map_err(|_| Error::InvalidConfig(v.to_string()))?;
                display.y = y.parse().map_err(|_| Error::InvalidConfig(v.to_string()))?;
            } else if let Some(v) = part.strip_prefix("degree:") {
                let degrees: u16 = v.parse().map_err(|_| Error::InvalidConfig(v.to_string()))?;
                display.rotation = Rotation::try_from(degrees)?;
            }
        }
        Ok(())
    }
}

impl DisplayService for FakeDisplayService {
    fn list(&mut self) -> Result<DeviceSet> {
        self.list_calls += 1;
        if let Some(e) = self.fail_list.take() {
            return Err(e);
        }
        DeviceSet::new(self.displays.clone(), codec::encode(&self.displays)?)
    }

    fn apply(&mut self, config: &str) -> Result<()> {
        if let Some(e) = self.fail_apply.take() {
            return Err(e);
        }
        for token in codec::to_args(config, codec::TOOL_NAME)? {
            self.apply_token(&token)?;
        }
        self.applied.push(config.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPresetStorage {
    pub collection: PresetCollection,
    pub load_calls: usize,
    pub save_calls: usize,
    pub fail_save: Option<Error>,
}

impl PresetStorage for MemoryPresetStorage {
    fn load_presets(&mut self) -> Result<PresetCollection> {
        self.load_calls += 1;
        Ok(self.collection.clone())
    }

    fn save_presets(&mut self, presets: &PresetCollection) -> Result<()> {
        if let Some(e) = self.fail_save.take() {
            return Err(e);
        }
        self.save_calls += 1;
        self.collection = presets.clone();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingHotkeys {
    registered: BTreeSet<String>,
    register_calls: usize,
    rejected: HashSet<String>,
}

impl RecordingHotkeys {
    pub fn registered(&self) -> Vec<&str> {
        self.registered.iter().map(String::as_str).collect()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls
    }

    /// Make the "OS" refuse this shortcut.
    pub fn reject(&mut self, shortcut: &str) {
        self.rejected.insert(shortcut.to_string());
    }
}

impl HotkeyBackend for RecordingHotkeys {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
        self.register_calls += 1;
        let s = shortcut.to_string();
        if self.rejected.contains(&s) || !self.registered.insert(s.clone()) {
            return Err(Error::ShortcutUnavailable(s));
        }
        Ok(())
    }

    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()> {
        self.registered.remove(&shortcut.to_string());
        Ok(())
    }
}

pub fn display(id: &str, (w, h): (u32, u32), (x, y): (i32, i32)) -> Display {
    Display::new(id, (w, h), (x, y)).expect("valid test display")
}
