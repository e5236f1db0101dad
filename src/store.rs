//! The single owner of device and preset state.
//!
//! Every mutating action ends by re-reading the canonical state from the
//! collaborators: the device list after anything touching displays, and the
//! preset collection as well after preset changes. The only local write
//! that is ever trusted is the speculative drag position, and the next
//! re-read overwrites it.

use tracing::{debug, info, warn};

use crate::codec;
use crate::display::DeviceSet;
use crate::error::{Error, ErrorKind, Result};
use crate::hotkey::{HotkeyBackend, HotkeyBinding, HotkeyRegistry, Shortcut};
use crate::preset::{self, Preset, PresetCollection, PresetStorage};
use crate::service::DisplayService;
use crate::toggle::{Clock, SystemClock, TickOutcome, ToggleAction, ToggleSafetyController, ToggleState};

/// Notifications for the front-end.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    DisplayListChanged,
    PresetListChanged,
    ToggleSessionChanged {
        display_id: String,
        remaining_seconds: Option<u32>,
    },
    HotkeyActivation {
        preset_id: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

/// How `update_preset` should treat the hotkey.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HotkeyUpdate {
    #[default]
    Keep,
    Set(String),
    Clear,
}

#[derive(Clone, Debug, Default)]
pub struct PresetUpdate {
    pub name: Option<String>,
    pub config: Option<String>,
    pub hotkey: HotkeyUpdate,
}

pub struct DisplayStateStore<S, P, H, C = SystemClock>
where
    S: DisplayService,
    P: PresetStorage,
    H: HotkeyBackend,
    C: Clock,
{
    service: S,
    storage: P,
    devices: DeviceSet,
    presets: PresetCollection,
    toggle: ToggleSafetyController<C>,
    hotkeys: HotkeyRegistry<H>,
    loading: bool,
    error: Option<Error>,
    events: Vec<StoreEvent>,
}

impl<S, P, H, C> DisplayStateStore<S, P, H, C>
where
    S: DisplayService,
    P: PresetStorage,
    H: HotkeyBackend,
    C: Clock,
{
    pub fn new(service: S, storage: P, hotkeys: H, clock: C) -> Self {
        DisplayStateStore {
            service,
            storage,
            devices: DeviceSet::default(),
            presets: PresetCollection::default(),
            toggle: ToggleSafetyController::new(clock),
            hotkeys: HotkeyRegistry::new(hotkeys),
            loading: false,
            error: None,
            events: Vec::new(),
        }
    }

    // --- Read access ---

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    pub fn presets(&self) -> &PresetCollection {
        &self.presets
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn toggle_state(&self, display_id: &str) -> ToggleState {
        self.toggle.state(display_id)
    }

    pub fn pending_toggles(&self) -> Vec<(String, u32)> {
        self.toggle.pending().map(|(id, s)| (id.to_string(), s)).collect()
    }

    pub fn hotkey_bindings(&self) -> Vec<&HotkeyBinding> {
        self.hotkeys.bindings()
    }

    pub fn is_shortcut_bound(&self, shortcut: &Shortcut) -> bool {
        self.hotkeys.is_bound(shortcut)
    }

    pub fn is_shortcut_available(&self, shortcut: &str) -> Result<bool> {
        self.hotkeys.is_available(shortcut)
    }

    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    #[cfg(test)]
    pub fn service(&self) -> &S {
        &self.service
    }

    #[cfg(test)]
    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    #[cfg(test)]
    pub fn storage(&self) -> &P {
        &self.storage
    }

    #[cfg(test)]
    pub fn storage_mut(&mut self) -> &mut P {
        &mut self.storage
    }

    #[cfg(test)]
    pub fn hotkey_backend(&self) -> &H {
        self.hotkeys.backend()
    }

    // --- Plumbing ---

    /// Run an action with the loading flag held, recording any failure.
    fn run<T>(&mut self, action: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.loading = true;
        debug!(action, "Store action started");
        let result = f(self);
        self.loading = false;
        if let Err(e) = &result {
            warn!(action, error = %e, "Store action failed");
            self.error = Some(e.clone());
            self.events.push(StoreEvent::Error { kind: e.kind(), message: e.to_string() });
        }
        result
    }

    fn refresh_devices(&mut self) -> Result<()> {
        self.devices = self.service.list()?;
        debug!(count = self.devices.len(), raw = self.devices.raw(), "Device list refreshed");
        self.events.push(StoreEvent::DisplayListChanged);
        self.drop_moot_sessions();
        Ok(())
    }

    /// A pending disable for a display that is already off (or gone) would
    /// only hold back the last-display rule for the others.
    fn drop_moot_sessions(&mut self) {
        let devices = &self.devices;
        let moot: Vec<String> = self
            .toggle
            .pending()
            .filter(|(id, _)| !devices.get(id).is_some_and(|d| d.enabled))
            .map(|(id, _)| id.to_string())
            .collect();
        for id in moot {
            debug!(display = %id, "Dropping disable session, display is already off");
            self.cancel_disable(&id);
        }
    }

    fn refresh_presets(&mut self) -> Result<()> {
        self.presets = self.storage.load_presets()?;
        let presets = &self.presets;
        self.hotkeys.retain_presets(|id| presets.get(id).is_some());
        self.events.push(StoreEvent::PresetListChanged);
        Ok(())
    }

    /// Apply through the service, then re-read. A failed apply still
    /// re-reads so local state matches whatever the tool left behind.
    fn apply_and_resync(&mut self, config: &str) -> Result<()> {
        if let Err(e) = self.service.apply(config) {
            if let Err(resync) = self.refresh_devices() {
                warn!(error = %resync, "Resync after failed apply also failed");
            }
            return Err(e);
        }
        self.refresh_devices()
    }

    /// Re-read after a successful preset save.
    fn resync_presets(&mut self) -> Result<()> {
        self.refresh_presets()?;
        self.refresh_devices()
    }

    fn require_display(&self, display_id: &str) -> Result<()> {
        match self.devices.get(display_id) {
            Some(_) => Ok(()),
            None => Err(Error::DisplayNotFound(display_id.to_string())),
        }
    }

    fn require_preset(&self, preset_id: &str) -> Result<&Preset> {
        self.presets
            .get(preset_id)
            .ok_or_else(|| Error::PresetNotFound(preset_id.to_string()))
    }

    // --- Devices ---

    /// Initial load: devices, presets, and hotkeys stored on presets.
    pub fn load(&mut self) -> Result<()> {
        self.run("load", |s| {
            s.refresh_devices()?;
            s.refresh_presets()?;
            s.bind_stored_hotkeys();
            Ok(())
        })
    }

    fn bind_stored_hotkeys(&mut self) {
        let stored: Vec<(String, String, String)> = self
            .presets
            .presets
            .iter()
            .filter_map(|p| p.hotkey.clone().map(|h| (p.id.clone(), h, description(&p.name))))
            .collect();
        for (id, shortcut, desc) in stored {
            if let Err(e) = self.hotkeys.bind(&id, &shortcut, &desc) {
                warn!(preset = %id, shortcut = %shortcut, error = %e, "Skipping stored hotkey");
            }
        }
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.run("refresh", |s| s.refresh_devices())
    }

    pub fn apply_config(&mut self, config: &str) -> Result<()> {
        self.run("apply_config", |s| s.apply_and_resync(config))
    }

    /// Apply the current (possibly dragged) arrangement.
    pub fn apply_layout(&mut self) -> Result<()> {
        self.run("apply_layout", |s| {
            let config = codec::encode(s.devices.displays())?;
            s.apply_and_resync(&config)
        })
    }

    /// Speculative position update while dragging; never reaches the tool.
    pub fn move_display_local(&mut self, display_id: &str, x: i32, y: i32) -> Result<()> {
        let display = self
            .devices
            .get_mut(display_id)
            .ok_or_else(|| Error::DisplayNotFound(display_id.to_string()))?;
        if (display.x, display.y) != (x, y) {
            display.x = x;
            display.y = y;
            debug!(display = display_id, x, y, "Local position update");
            self.events.push(StoreEvent::DisplayListChanged);
        }
        Ok(())
    }

    // --- Toggle ---

    pub fn request_enable(&mut self, display_id: &str) -> Result<()> {
        self.run("enable", |s| {
            s.require_display(display_id)?;
            let had_session = s.toggle.state(display_id) != ToggleState::Idle;
            let action = s.toggle.request_enable(display_id);
            let id = action.display_id();
            if had_session {
                s.events.push(StoreEvent::ToggleSessionChanged {
                    display_id: id.to_string(),
                    remaining_seconds: None,
                });
            }
            info!(display = id, "Enabling display");
            s.apply_and_resync(&codec::toggle_command(id, true))
        })
    }

    /// Start the disable countdown. Nothing is sent to the tool yet.
    pub fn request_disable(&mut self, display_id: &str) -> Result<u32> {
        self.run("disable", |s| {
            s.require_display(display_id)?;
            if s.devices.get(display_id).is_some_and(|d| !d.enabled) {
                return Err(Error::InvalidConfig(format!("display {} is already disabled", display_id)));
            }
            let remaining = s.toggle.request_disable(display_id, s.devices.enabled_count())?;
            s.events.push(StoreEvent::ToggleSessionChanged {
                display_id: display_id.to_string(),
                remaining_seconds: Some(remaining),
            });
            Ok(remaining)
        })
    }

    /// Run the disable the user confirmed. `Ok(false)` when no session was
    /// pending (it may have timed out already).
    pub fn confirm_disable(&mut self, display_id: &str) -> Result<bool> {
        self.run("confirm_disable", |s| {
            let Some(ToggleAction::Disable(id)) = s.toggle.confirm(display_id) else {
                return Ok(false);
            };
            s.events.push(StoreEvent::ToggleSessionChanged {
                display_id: id.clone(),
                remaining_seconds: None,
            });

            // The arrangement may have changed during the countdown.
            s.refresh_devices()?;
            let display = s
                .devices
                .get(&id)
                .ok_or_else(|| Error::DisplayNotFound(id.clone()))?;
            if !display.enabled {
                return Ok(true);
            }
            if s.devices.enabled_count() <= 1 {
                return Err(Error::LastDisplayProtected);
            }

            info!(display = %id, "Disabling display");
            s.apply_and_resync(&codec::toggle_command(&id, false))?;
            Ok(true)
        })
    }

    pub fn cancel_disable(&mut self, display_id: &str) -> bool {
        let cancelled = self.toggle.cancel(display_id);
        if cancelled {
            self.events.push(StoreEvent::ToggleSessionChanged {
                display_id: display_id.to_string(),
                remaining_seconds: None,
            });
        }
        cancelled
    }

    /// One manual countdown step for a display's session.
    pub fn tick_disable(&mut self, display_id: &str) -> Option<TickOutcome> {
        let outcome = self.toggle.tick(display_id)?;
        self.push_tick(display_id, outcome);
        Some(outcome)
    }

    /// Fire any countdown ticks that are due by the clock.
    pub fn advance_toggles(&mut self) -> Vec<(String, TickOutcome)> {
        let fired = self.toggle.advance();
        for (id, outcome) in &fired {
            self.push_tick(id, *outcome);
        }
        fired
    }

    fn push_tick(&mut self, display_id: &str, outcome: TickOutcome) {
        let remaining_seconds = match outcome {
            TickOutcome::Counting(n) => Some(n),
            TickOutcome::RolledBack => None,
        };
        self.events.push(StoreEvent::ToggleSessionChanged {
            display_id: display_id.to_string(),
            remaining_seconds,
        });
    }

    // --- Presets ---

    /// Save the current arrangement as a new preset.
    pub fn save_current_layout(&mut self, name: &str, hotkey: Option<&str>) -> Result<Preset> {
        let config = match codec::encode(self.devices.displays()) {
            Ok(c) => c,
            Err(e) => return self.run("save_layout", |_| Err(e)),
        };
        self.add_preset(name, &config, hotkey)
    }

    pub fn add_preset(&mut self, name: &str, config: &str, hotkey: Option<&str>) -> Result<Preset> {
        self.run("add_preset", |s| {
            let mut preset = Preset::new(name, config, None)?;
            if let Some(h) = hotkey {
                let shortcut = s.hotkeys.bind(&preset.id, h, &description(&preset.name))?;
                preset.hotkey = Some(shortcut.to_string());
            }

            let mut collection = s.storage.load_presets()?;
            collection.presets.push(preset.clone());
            if let Err(e) = s.storage.save_presets(&collection) {
                s.restore_hotkey(&preset.id, None, &preset.name);
                return Err(e);
            }
            s.resync_presets()?;

            info!(preset = %preset.id, name = %preset.name, "Preset added");
            Ok(preset)
        })
    }

    pub fn update_preset(&mut self, preset_id: &str, update: PresetUpdate) -> Result<Preset> {
        self.run("update_preset", |s| {
            let mut collection = s.storage.load_presets()?;
            let preset = collection
                .get_mut(preset_id)
                .ok_or_else(|| Error::PresetNotFound(preset_id.to_string()))?;
            let previous_shortcut = s.hotkeys.shortcut_for(preset_id).cloned();
            let previous_name = preset.name.clone();

            if let Some(name) = &update.name {
                preset.name = preset::validate_name(name)?;
            }
            if let Some(config) = &update.config {
                preset.config = preset::validate_config(config)?;
            }
            match &update.hotkey {
                HotkeyUpdate::Keep => s.hotkeys.set_description(preset_id, &description(&preset.name)),
                HotkeyUpdate::Set(h) => {
                    let shortcut = s.hotkeys.bind(preset_id, h, &description(&preset.name))?;
                    s.hotkeys.set_description(preset_id, &description(&preset.name));
                    preset.hotkey = Some(shortcut.to_string());
                }
                HotkeyUpdate::Clear => {
                    s.hotkeys.unbind(preset_id)?;
                    preset.hotkey = None;
                }
            }
            let updated = preset.clone();

            if let Err(e) = s.storage.save_presets(&collection) {
                s.restore_hotkey(preset_id, previous_shortcut, &previous_name);
                return Err(e);
            }
            s.resync_presets()?;
            info!(preset = %updated.id, "Preset updated");
            Ok(updated)
        })
    }

    pub fn delete_preset(&mut self, preset_id: &str) -> Result<()> {
        self.run("delete_preset", |s| {
            let mut collection = s.storage.load_presets()?;
            if collection.remove(preset_id).is_none() {
                return Err(Error::PresetNotFound(preset_id.to_string()));
            }
            s.storage.save_presets(&collection)?;
            if let Err(e) = s.hotkeys.unbind(preset_id) {
                warn!(preset = preset_id, error = %e, "Failed to release hotkey of deleted preset");
            }
            s.resync_presets()?;
            info!(preset = preset_id, "Preset deleted");
            Ok(())
        })
    }

    /// Put a preset's binding back the way it was before an unsaved change.
    fn restore_hotkey(&mut self, preset_id: &str, previous: Option<Shortcut>, preset_name: &str) {
        let desc = description(preset_name);
        let restored = match &previous {
            Some(old) => self.hotkeys.bind(preset_id, &old.to_string(), &desc).map(|_| ()),
            None => self.hotkeys.unbind(preset_id),
        };
        match restored {
            Ok(()) => self.hotkeys.set_description(preset_id, &desc),
            Err(e) => warn!(preset = preset_id, error = %e, "Failed to restore hotkey after unsaved change"),
        }
    }

    pub fn apply_preset(&mut self, preset_id: &str) -> Result<()> {
        self.run("apply_preset", |s| {
            let config = s.require_preset(preset_id)?.config.clone();
            info!(preset = preset_id, "Applying preset");
            s.apply_and_resync(&config)
        })
    }

    // --- Hotkeys ---

    /// Route a triggered shortcut. Returns the preset that was applied, or
    /// `None` when the shortcut is unbound or its preset is gone.
    pub fn handle_shortcut(&mut self, shortcut: &Shortcut) -> Result<Option<String>> {
        let Some(preset_id) = self.hotkeys.activate(shortcut) else {
            return Ok(None);
        };
        self.events.push(StoreEvent::HotkeyActivation { preset_id: preset_id.clone() });

        if self.presets.get(&preset_id).is_none() {
            warn!(preset = %preset_id, "Hotkey points at a deleted preset");
            let presets = &self.presets;
            self.hotkeys.retain_presets(|id| presets.get(id).is_some());
            return Ok(None);
        }

        self.apply_preset(&preset_id)?;
        Ok(Some(preset_id))
    }

    /// Stop countdowns and release hotkeys.
    pub fn teardown(&mut self) {
        self.toggle.teardown();
        self.hotkeys.unregister_all();
    }
}

fn description(preset_name: &str) -> String {
    format!("Apply preset {}", preset_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{display, FakeDisplayService, ManualClock, MemoryPresetStorage, RecordingHotkeys};
    use std::time::Duration;

    type TestStore = DisplayStateStore<FakeDisplayService, MemoryPresetStorage, RecordingHotkeys, ManualClock>;

    fn store_with(displays: Vec<crate::display::Display>) -> (TestStore, ManualClock) {
        let clock = ManualClock::new();
        let mut store = DisplayStateStore::new(
            FakeDisplayService::new(displays),
            MemoryPresetStorage::default(),
            RecordingHotkeys::default(),
            clock.clone(),
        );
        store.load().unwrap();
        store.drain_events();
        (store, clock)
    }

    fn two_displays() -> (TestStore, ManualClock) {
        store_with(vec![
            display("1", (2560, 1440), (0, 0)),
            display("2", (1920, 1080), (2560, 0)),
        ])
    }

    #[test]
    fn test_disable_confirm_scenario() {
        let (mut store, _) = two_displays();
        assert_eq!(store.request_disable("2").unwrap(), 15);
        assert_eq!(
            store.toggle_state("2"),
            ToggleState::PendingConfirmation { remaining_seconds: 15 }
        );
        assert!(store.service().applied.is_empty());

        assert!(store.confirm_disable("2").unwrap());
        assert!(!store.devices().get("2").unwrap().enabled);
        assert!(store.devices().get("1").unwrap().enabled);
        assert_eq!(store.service().disable_calls(), 1);
        assert_eq!(store.toggle_state("2"), ToggleState::Idle);

        // No second disable goes out.
        assert!(!store.confirm_disable("2").unwrap());
        assert_eq!(store.service().disable_calls(), 1);
    }

    #[test]
    fn test_single_display_is_protected() {
        let (mut store, _) = store_with(vec![display("1", (2560, 1440), (0, 0))]);
        let before = store.devices().clone();

        assert_eq!(store.request_disable("1"), Err(Error::LastDisplayProtected));
        assert_eq!(store.toggle_state("1"), ToggleState::Idle);
        assert_eq!(store.devices(), &before);
        assert!(store.service().applied.is_empty());
        assert_eq!(store.error(), Some(&Error::LastDisplayProtected));
        assert!(!store.is_loading());
    }

    #[test]
    fn test_timeout_equals_cancel() {
        let (mut store, _) = two_displays();
        let before = store.devices().clone();
        store.request_disable("2").unwrap();
        for _ in 0..14 {
            assert!(matches!(store.tick_disable("2"), Some(TickOutcome::Counting(_))));
        }
        assert_eq!(store.tick_disable("2"), Some(TickOutcome::RolledBack));
        assert_eq!(store.toggle_state("2"), ToggleState::Idle);
        assert_eq!(store.devices(), &before);
        assert!(store.service().applied.is_empty());
        assert!(!store.confirm_disable("2").unwrap());
    }

    #[test]
    fn test_clock_driven_rollback() {
        let (mut store, clock) = two_displays();
        store.request_disable("2").unwrap();
        store.drain_events();
        clock.advance(Duration::from_secs(15));
        let fired = store.advance_toggles();
        assert_eq!(fired.len(), 15);
        assert_eq!(
            store.drain_events().last(),
            Some(&StoreEvent::ToggleSessionChanged { display_id: "2".to_string(), remaining_seconds: None })
        );
        assert!(store.pending_toggles().is_empty());
    }

    #[test]
    fn test_cancel_disable() {
        let (mut store, _) = two_displays();
        store.request_disable("2").unwrap();
        assert!(store.cancel_disable("2"));
        assert!(!store.cancel_disable("2"));
        assert!(store.devices().get("2").unwrap().enabled);
    }

    #[test]
    fn test_confirm_rechecks_against_fresh_state() {
        let (mut store, _) = two_displays();
        store.request_disable("2").unwrap();
        // Display 1 went away behind our back.
        store.service_mut().displays[0].enabled = false;
        assert_eq!(store.confirm_disable("2"), Err(Error::LastDisplayProtected));
        assert_eq!(store.service().disable_calls(), 0);
    }

    #[test]
    fn test_enable_is_immediate() {
        let (mut store, _) = two_displays();
        store.service_mut().displays[1].enabled = false;
        store.refresh().unwrap();
        store.request_enable("2").unwrap();
        assert!(store.devices().get("2").unwrap().enabled);
        assert_eq!(store.service().applied, vec!["displayplacer \"id:2 enabled:true\"".to_string()]);
    }

    #[test]
    fn test_unknown_display() {
        let (mut store, _) = two_displays();
        assert!(matches!(store.request_disable("9"), Err(Error::DisplayNotFound(_))));
        assert!(matches!(store.request_enable("9"), Err(Error::DisplayNotFound(_))));
    }

    #[test]
    fn test_failure_sets_error_until_cleared() {
        let (mut store, _) = two_displays();
        store.service_mut().fail_apply = Some(Error::PermissionDenied("screen recording".to_string()));
        let err = store.apply_config("displayplacer \"id:1 degree:90\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(!store.is_loading());
        assert!(!store.error().unwrap().is_retryable());
        assert!(store
            .drain_events()
            .iter()
            .any(|e| matches!(e, StoreEvent::Error { kind: ErrorKind::PermissionDenied, .. })));

        // A later success does not clear it.
        store.refresh().unwrap();
        assert!(store.error().is_some());
        store.clear_error();
        assert!(store.error().is_none());
    }

    #[test]
    fn test_every_mutation_refetches() {
        let (mut store, _) = two_displays();
        let lists = store.service().list_calls;
        store.apply_config("displayplacer \"id:1 degree:90\"").unwrap();
        assert_eq!(store.service().list_calls, lists + 1);

        let loads = store.storage().load_calls;
        let lists = store.service().list_calls;
        store.save_current_layout("Desk", None).unwrap();
        assert!(store.storage().load_calls > loads);
        assert_eq!(store.service().list_calls, lists + 1);
    }

    #[test]
    fn test_drag_is_local_until_applied() {
        let (mut store, _) = two_displays();
        store.move_display_local("2", 2560, -300).unwrap();
        assert_eq!(store.devices().get("2").unwrap().y, -300);
        assert!(store.service().applied.is_empty());

        // A re-read throws the speculative position away.
        store.refresh().unwrap();
        assert_eq!(store.devices().get("2").unwrap().y, 0);

        store.move_display_local("2", -1920, 0).unwrap();
        store.apply_layout().unwrap();
        assert_eq!(store.devices().get("2").unwrap().x, -1920);
        assert_eq!(store.service().applied.len(), 1);
    }

    #[test]
    fn test_preset_lifecycle() {
        let (mut store, _) = two_displays();
        let preset = store.save_current_layout("  Desk  ", Some("shift+cmd+1")).unwrap();
        assert_eq!(preset.name, "Desk");
        assert_eq!(preset.hotkey.as_deref(), Some("Cmd+Shift+1"));
        assert_eq!(store.presets().presets.len(), 1);
        assert_eq!(store.storage().collection.presets[0].config, preset.config);

        let updated = store
            .update_preset(&preset.id, PresetUpdate {
                name: Some("Desk 2".to_string()),
                hotkey: HotkeyUpdate::Set("Cmd+Shift+2".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.name, "Desk 2");
        assert_eq!(store.is_shortcut_available("Cmd+Shift+1"), Ok(true));
        assert_eq!(store.is_shortcut_available("Cmd+Shift+2"), Ok(false));

        store
            .update_preset(&preset.id, PresetUpdate { hotkey: HotkeyUpdate::Clear, ..Default::default() })
            .unwrap();
        assert!(store.hotkey_bindings().is_empty());
        assert_eq!(store.presets().presets[0].hotkey, None);

        store.delete_preset(&preset.id).unwrap();
        assert!(store.presets().presets.is_empty());
        assert!(matches!(store.delete_preset(&preset.id), Err(Error::PresetNotFound(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        let (mut store, _) = two_displays();
        assert!(matches!(store.save_current_layout(" ", None), Err(Error::InvalidConfig(_))));
        assert_eq!(store.storage().save_calls, 0);
    }

    #[test]
    fn test_hotkey_conflict_between_presets() {
        let (mut store, _) = two_displays();
        store.save_current_layout("A", Some("Cmd+Shift+1")).unwrap();
        let err = store.save_current_layout("B", Some("cmd+shift+1")).unwrap_err();
        assert!(matches!(err, Error::ShortcutUnavailable(_)));
        assert_eq!(store.presets().presets.len(), 1);
    }

    #[test]
    fn test_invalid_hotkey_saves_nothing() {
        let (mut store, _) = two_displays();
        let err = store.save_current_layout("A", Some("Cmd+Cmd+1")).unwrap_err();
        assert!(matches!(err, Error::InvalidShortcutFormat(_)));
        assert_eq!(store.storage().save_calls, 0);
        assert!(store.hotkey_backend().registered().is_empty());
    }

    #[test]
    fn test_failed_save_releases_hotkey() {
        let (mut store, _) = two_displays();
        store.storage_mut().fail_save = Some(Error::Storage("disk full".to_string()));
        assert!(store.save_current_layout("A", Some("Ctrl+1")).is_err());
        assert!(store.hotkey_backend().registered().is_empty());
        assert_eq!(store.is_shortcut_available("Ctrl+1"), Ok(true));
    }

    #[test]
    fn test_hotkey_applies_preset() {
        let (mut store, _) = two_displays();
        store.move_display_local("2", 0, 1440).unwrap();
        let preset = store.save_current_layout("Stacked", Some("Ctrl+Alt+S")).unwrap();
        store.refresh().unwrap();
        store.drain_events();

        let shortcut: Shortcut = "ctrl+alt+s".parse().unwrap();
        assert_eq!(store.handle_shortcut(&shortcut).unwrap(), Some(preset.id.clone()));
        assert_eq!(store.devices().get("2").unwrap().y, 1440);
        assert_eq!(store.service().applied, vec![preset.config.clone()]);
        assert!(store
            .drain_events()
            .contains(&StoreEvent::HotkeyActivation { preset_id: preset.id }));

        let unbound: Shortcut = "Ctrl+Alt+Q".parse().unwrap();
        assert_eq!(store.handle_shortcut(&unbound).unwrap(), None);
    }

    #[test]
    fn test_stale_binding_is_pruned_on_activation() {
        let (mut store, _) = two_displays();
        let preset = store.save_current_layout("Gone", Some("Ctrl+G")).unwrap();
        // The preset disappears without going through the store.
        store.presets.presets.clear();

        let shortcut: Shortcut = "Ctrl+G".parse().unwrap();
        assert_eq!(store.handle_shortcut(&shortcut).unwrap(), None);
        assert!(store.service().applied.is_empty());
        assert!(!store.is_shortcut_bound(&shortcut));
        assert!(store.storage().collection.get(&preset.id).is_some());
    }

    #[test]
    fn test_load_binds_stored_hotkeys() {
        let clock = ManualClock::new();
        let mut storage = MemoryPresetStorage::default();
        let a = Preset::new("A", "displayplacer \"id:1 degree:0\"", Some("Ctrl+1".to_string())).unwrap();
        let b = Preset::new("B", "displayplacer \"id:1 degree:90\"", Some("Ctrl+1".to_string())).unwrap();
        let c = Preset::new("C", "displayplacer \"id:1 degree:180\"", Some("Nope+1".to_string())).unwrap();
        storage.collection.presets = vec![a.clone(), b, c];

        let mut store = DisplayStateStore::new(
            FakeDisplayService::new(vec![display("1", (1920, 1080), (0, 0))]),
            storage,
            RecordingHotkeys::default(),
            clock,
        );
        store.load().unwrap();
        let bindings = store.hotkey_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].preset_id, a.id);
        assert_eq!(bindings[0].description, "Apply preset A");
    }

    #[test]
    fn test_apply_unknown_preset() {
        let (mut store, _) = two_displays();
        assert!(matches!(store.apply_preset("nope"), Err(Error::PresetNotFound(_))));
        assert!(store.service().applied.is_empty());
    }

    #[test]
    fn test_layout_scenario_through_canvas() {
        use crate::canvas::{CanvasBounds, CanvasTransform, DragState};

        let (mut store, _) = two_displays();
        let t = CanvasTransform::fit(store.devices(), CanvasBounds::default());
        assert_eq!((t.min_x, t.min_y, t.max_x, t.max_y), (0, 0, 4480, 1440));

        let d2 = store.devices().get("2").unwrap().clone();
        let (cx, cy) = t.to_canvas(d2.x, d2.y);
        let drag = DragState::begin(t, &d2, cx + 5.0, cy + 5.0);
        let target_x = 100.0;
        let (x, y) = drag.origin_at(target_x + 5.0, cy + 5.0);
        store.move_display_local("2", x, y).unwrap();

        assert_eq!((x, y), t.to_real(target_x, cy));
        assert_eq!(store.devices().get("2").unwrap().x, x);
        assert!(store.service().applied.is_empty());
    }

    #[test]
    fn test_teardown_stops_countdowns() {
        let (mut store, clock) = two_displays();
        store.save_current_layout("A", Some("Ctrl+1")).unwrap();
        store.request_disable("2").unwrap();
        store.teardown();
        clock.advance(Duration::from_secs(20));
        assert!(store.advance_toggles().is_empty());
        assert!(store.hotkey_backend().registered().is_empty());
    }

    fn bound_shortcuts(store: &TestStore) -> Vec<String> {
        store.hotkey_bindings().iter().map(|b| b.shortcut.clone()).collect()
    }

    #[test]
    fn test_failed_update_save_keeps_old_hotkey() {
        let (mut store, _) = two_displays();
        let preset = store.save_current_layout("Desk", Some("Ctrl+1")).unwrap();
        store.storage_mut().fail_save = Some(Error::Storage("disk full".to_string()));

        let result = store.update_preset(&preset.id, PresetUpdate {
            hotkey: HotkeyUpdate::Set("Ctrl+2".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(store.storage().collection.presets[0].hotkey.as_deref(), Some("Ctrl+1"));
        assert_eq!(bound_shortcuts(&store), vec!["Ctrl+1"]);
        assert_eq!(store.hotkey_backend().registered(), vec!["Ctrl+1"]);
        assert_eq!(store.is_shortcut_available("Ctrl+2"), Ok(true));
    }

    #[test]
    fn test_failed_clear_save_keeps_hotkey() {
        let (mut store, _) = two_displays();
        let preset = store.save_current_layout("Desk", Some("Ctrl+1")).unwrap();
        store.storage_mut().fail_save = Some(Error::Storage("disk full".to_string()));

        let cleared = store.update_preset(&preset.id, PresetUpdate { hotkey: HotkeyUpdate::Clear, ..Default::default() });
        assert!(cleared.is_err());
        assert_eq!(bound_shortcuts(&store), vec!["Ctrl+1"]);
        assert_eq!(store.hotkey_backend().registered(), vec!["Ctrl+1"]);
    }

    #[test]
    fn test_failed_delete_save_keeps_hotkey() {
        let (mut store, _) = two_displays();
        let preset = store.save_current_layout("Desk", Some("Ctrl+1")).unwrap();
        store.storage_mut().fail_save = Some(Error::Storage("disk full".to_string()));

        assert!(matches!(store.delete_preset(&preset.id), Err(Error::Storage(_))));
        assert!(store.storage().collection.get(&preset.id).is_some());
        assert!(store.presets().get(&preset.id).is_some());
        assert_eq!(bound_shortcuts(&store), vec!["Ctrl+1"]);

        store.delete_preset(&preset.id).unwrap();
        assert!(store.hotkey_bindings().is_empty());
        assert!(store.hotkey_backend().registered().is_empty());
    }

    #[test]
    fn test_rename_refreshes_hotkey_description() {
        let (mut store, _) = two_displays();
        let preset = store.save_current_layout("Desk", Some("Ctrl+1")).unwrap();

        store
            .update_preset(&preset.id, PresetUpdate { name: Some("Office".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(store.hotkey_bindings()[0].description, "Apply preset Office");

        store.storage_mut().fail_save = Some(Error::Storage("disk full".to_string()));
        let renamed = store.update_preset(&preset.id, PresetUpdate { name: Some("Home".to_string()), ..Default::default() });
        assert!(renamed.is_err());
        assert_eq!(store.hotkey_bindings()[0].description, "Apply preset Office");
    }

    #[test]
    fn test_preset_config_is_validated() {
        let (mut store, _) = two_displays();
        assert!(matches!(store.add_preset("Empty", "  ", None), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            store.add_preset("Unbalanced", "displayplacer \"id:1 degree:90", None),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(store.storage().save_calls, 0);

        let preset = store.add_preset("Rotated", "displayplacer \"id:1 degree:90\"", None).unwrap();
        let update = PresetUpdate { config: Some("displayplacer".to_string()), ..Default::default() };
        assert!(matches!(store.update_preset(&preset.id, update), Err(Error::InvalidConfig(_))));
        assert_eq!(store.storage().collection.presets[0].config, "displayplacer \"id:1 degree:90\"");
    }

    fn three_displays_one_off() -> (TestStore, ManualClock) {
        let mut off = display("C", (1280, 800), (-1280, 0));
        off.enabled = false;
        store_with(vec![
            display("A", (2560, 1440), (0, 0)),
            display("B", (1920, 1080), (2560, 0)),
            off,
        ])
    }

    #[test]
    fn test_disabling_a_display_that_is_off_is_refused() {
        let (mut store, _) = three_displays_one_off();
        assert!(matches!(store.request_disable("C"), Err(Error::InvalidConfig(_))));
        assert_eq!(store.toggle_state("C"), ToggleState::Idle);

        // B stays enabled, so A may go.
        assert_eq!(store.request_disable("A"), Ok(15));
    }

    #[test]
    fn test_session_for_display_switched_off_elsewhere_is_dropped() {
        let (mut store, _) = store_with(vec![
            display("A", (2560, 1440), (0, 0)),
            display("B", (1920, 1080), (2560, 0)),
            display("C", (1280, 800), (-1280, 0)),
        ]);
        store.request_disable("C").unwrap();
        store.service_mut().displays[2].enabled = false;
        store.refresh().unwrap();

        assert_eq!(store.toggle_state("C"), ToggleState::Idle);
        assert!(store
            .drain_events()
            .contains(&StoreEvent::ToggleSessionChanged { display_id: "C".to_string(), remaining_seconds: None }));
        assert_eq!(store.request_disable("A"), Ok(15));
    }

    #[test]
    fn test_failed_list_is_recorded() {
        let (mut store, _) = two_displays();
        let before = store.devices().clone();
        store.service_mut().fail_list = Some(Error::CommandFailed("list crashed".to_string()));

        assert!(matches!(store.refresh(), Err(Error::CommandFailed(_))));
        assert!(!store.is_loading());
        assert!(matches!(store.error(), Some(Error::CommandFailed(_))));
        assert!(store
            .drain_events()
            .iter()
            .any(|e| matches!(e, StoreEvent::Error { kind: ErrorKind::CommandFailed, .. })));
        assert_eq!(store.devices(), &before);
    }

    #[test]
    fn test_failed_initial_load() {
        let mut service = FakeDisplayService::new(vec![display("1", (1920, 1080), (0, 0))]);
        service.fail_list = Some(Error::ToolNotFound("displayplacer".to_string()));
        let mut store = DisplayStateStore::new(
            service,
            MemoryPresetStorage::default(),
            RecordingHotkeys::default(),
            ManualClock::new(),
        );

        assert!(matches!(store.load(), Err(Error::ToolNotFound(_))));
        assert!(!store.is_loading());
        assert!(store.devices().is_empty());
        assert!(!store.error().unwrap().is_retryable());

        // The tool showed up; a retry works and the error stays until cleared.
        store.load().unwrap();
        assert_eq!(store.devices().len(), 1);
        assert!(store.error().is_some());
    }

    #[test]
    fn test_failed_apply_still_rereads() {
        let (mut store, _) = two_displays();
        store.move_display_local("2", 2560, -300).unwrap();
        store.service_mut().fail_apply = Some(Error::CommandFailed("bad arrangement".to_string()));
        let lists = store.service().list_calls;

        assert!(matches!(store.apply_layout(), Err(Error::CommandFailed(_))));
        assert_eq!(store.service().list_calls, lists + 1);
        // The speculative position is gone; the tool's arrangement wins.
        assert_eq!(store.devices().get("2").unwrap().y, 0);
        assert!(!store.is_loading());
    }

    #[test]
    fn test_failed_apply_and_reread_keep_apply_error() {
        let (mut store, _) = two_displays();
        store.move_display_local("2", 2560, -300).unwrap();
        store.service_mut().fail_apply = Some(Error::PermissionDenied("accessibility".to_string()));
        store.service_mut().fail_list = Some(Error::CommandFailed("list crashed".to_string()));
        let lists = store.service().list_calls;

        let err = store.apply_layout().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(store.error().map(Error::kind), Some(ErrorKind::PermissionDenied));
        assert_eq!(store.service().list_calls, lists + 1);
        assert_eq!(store.devices().get("2").unwrap().y, -300);
        assert!(!store.is_loading());
    }
}
