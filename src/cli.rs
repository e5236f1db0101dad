use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::preset::Preset;
use crate::toggle::{TickOutcome, CONFIRM_SECONDS};
use crate::Store;

fn find_preset(store: &Store, name: &str) -> Result<Preset> {
    match store.presets().find(name) {
        Some(p) => Ok(p.clone()),
        None => {
            eprintln!("Preset '{}' not found", name);
            if !store.presets().presets.is_empty() {
                eprintln!("Available presets:");
                for p in &store.presets().presets {
                    eprintln!("  - {}", p.name);
                }
            }
            Err(Error::PresetNotFound(name.to_string()))
        }
    }
}

fn require_display(store: &Store, id: &str) -> Result<()> {
    if store.devices().get(id).is_some() {
        return Ok(());
    }
    eprintln!("Display '{}' not found", id);
    eprintln!("Available displays:");
    for d in store.devices().displays() {
        eprintln!("  - {} ({})", d.id, if d.enabled { "enabled" } else { "disabled" });
    }
    Err(Error::DisplayNotFound(id.to_string()))
}

pub fn list_displays(store: &Store, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(store.devices().displays())
            .map_err(|e| Error::storage("failed to serialize displays", e))?;
        println!("{}", out);
        return Ok(());
    }

    println!("Displays:");
    println!();
    for d in store.devices().displays() {
        let status = if d.enabled { "enabled" } else { "DISABLED" };
        println!("  {} - {} | {} | Pos: {},{} | Rotation: {}",
            d.id,
            status,
            d.resolution_string(),
            d.x,
            d.y,
            d.rotation
        );
    }
    Ok(())
}

pub fn list_presets(store: &Store) -> Result<()> {
    let presets = &store.presets().presets;
    if presets.is_empty() {
        println!("No presets found.");
        println!("Create presets with `dpui save <name>` or in the TUI (press 'p', then 's')");
        return Ok(());
    }

    println!("Available presets:");
    println!();
    for p in presets {
        match &p.hotkey {
            Some(h) => println!("  {} [{}]", p.name, h),
            None => println!("  {}", p.name),
        }
        println!("    id: {}", p.id);
        println!("    created: {}", p.created_at.format("%Y-%m-%d %H:%M"));
        println!("    {}", p.config);
        println!();
    }
    Ok(())
}

pub fn apply_preset(store: &mut Store, name: &str) -> Result<()> {
    let preset = find_preset(store, name)?;
    println!("Applying preset '{}'...", preset.name);
    store.apply_preset(&preset.id)?;
    println!("✓ Successfully applied preset '{}'", preset.name);
    Ok(())
}

pub fn enable_display(store: &mut Store, id: &str) -> Result<()> {
    require_display(store, id)?;
    if store.devices().get(id).is_some_and(|d| d.enabled) {
        println!("Display '{}' is already enabled", id);
        return Ok(());
    }
    println!("Enabling display '{}'...", id);
    store.request_enable(id)?;
    println!("✓ Successfully enabled '{}'", id);
    Ok(())
}

/// Disable a display. Without `yes` the user gets the usual confirmation
/// window to answer on stdin; no answer in time means no change.
pub fn disable_display(store: &mut Store, id: &str, yes: bool) -> Result<()> {
    require_display(store, id)?;
    if store.devices().get(id).is_some_and(|d| !d.enabled) {
        println!("Display '{}' is already disabled", id);
        return Ok(());
    }

    store.request_disable(id)?;
    if !yes && !await_confirmation(store, id) {
        store.cancel_disable(id);
        println!("Display '{}' left enabled", id);
        return Ok(());
    }

    println!("Disabling display '{}'...", id);
    if !store.confirm_disable(id)? {
        println!("Confirmation window expired, display '{}' left enabled", id);
        return Ok(());
    }
    println!("✓ Successfully disabled '{}'", id);
    Ok(())
}

/// Wait for a y/n answer on stdin, ticking the countdown once a second.
fn await_confirmation(store: &mut Store, id: &str) -> bool {
    println!("Disable display '{}'? [y/N]", id);
    print!("{}s left > ", CONFIRM_SECONDS);
    let _ = io::stdout().flush();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_ok() {
            let _ = tx.send(line);
        }
    });

    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(line) => return matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(RecvTimeoutError::Timeout) => match store.tick_disable(id) {
                Some(TickOutcome::Counting(remaining)) => {
                    print!("\r{}s left > ", remaining);
                    let _ = io::stdout().flush();
                }
                Some(TickOutcome::RolledBack) | None => {
                    println!();
                    println!("No answer, cancelled");
                    return false;
                }
            },
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

pub fn save_preset(store: &mut Store, name: &str, hotkey: Option<&str>) -> Result<()> {
    let preset = store.save_current_layout(name, hotkey)?;
    println!("✓ Saved preset '{}'", preset.name);
    if let Some(h) = &preset.hotkey {
        println!("  hotkey: {}", h);
    }
    Ok(())
}

pub fn delete_preset(store: &mut Store, name: &str) -> Result<()> {
    let preset = find_preset(store, name)?;
    store.delete_preset(&preset.id)?;
    println!("✓ Deleted preset '{}'", preset.name);
    Ok(())
}

pub fn apply_config(store: &mut Store, config: &str) -> Result<()> {
    println!("Applying configuration...");
    store.apply_config(config)?;
    println!("✓ Successfully applied configuration");
    Ok(())
}
