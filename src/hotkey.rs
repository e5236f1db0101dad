//! Global shortcuts bound to presets.
//!
//! Shortcut strings are `+`-joined tokens: any of `Cmd`, `Ctrl`, `Alt`,
//! `Shift` (each at most once, any order, case-insensitive, with a few
//! aliases) followed by exactly one key. Everything is compared in the
//! canonical spelling produced by [`Shortcut`]'s `Display` impl, e.g.
//! `shift+cmd+1` and `Cmd+Shift+1` are the same shortcut.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Declaration order is the canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Cmd,
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "cmd" | "command" | "super" | "meta" | "win" => Some(Modifier::Cmd),
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "option" | "opt" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Modifier::Cmd => "Cmd",
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
        }
    }
}

/// Named keys with their accepted spellings. The first spelling is
/// canonical.
const NAMED_KEYS: &[&[&str]] = &[
    &["Space"],
    &["Enter", "Return"],
    &["Tab"],
    &["Esc", "Escape"],
    &["Backspace"],
    &["Delete"],
    &["Insert"],
    &["Home"],
    &["End"],
    &["PageUp"],
    &["PageDown"],
    &["Up"],
    &["Down"],
    &["Left"],
    &["Right"],
    &["Minus"],
    &["Equal"],
    &["Comma"],
    &["Period"],
    &["Slash"],
    &["Semicolon"],
    &["Quote"],
    &["Backquote"],
    &["BracketLeft"],
    &["BracketRight"],
    &["Backslash"],
];

fn canonical_key(token: &str) -> Option<String> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_ascii_uppercase().to_string());
        }
        if c.is_ascii_digit() {
            return Some(c.to_string());
        }
        return None;
    }

    let lower = token.to_ascii_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) && !lower[1..].starts_with('0') {
            return Some(format!("F{}", n));
        }
    }

    NAMED_KEYS
        .iter()
        .find(|spellings| spellings.iter().any(|s| s.eq_ignore_ascii_case(token)))
        .map(|spellings| spellings[0].to_string())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shortcut {
    modifiers: BTreeSet<Modifier>,
    key: String,
}

impl Shortcut {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: &str) -> Result<Self> {
        let key = canonical_key(key)
            .ok_or_else(|| Error::InvalidShortcutFormat(format!("unrecognized key {:?}", key)))?;
        Ok(Shortcut { modifiers: modifiers.into_iter().collect(), key })
    }
}

impl FromStr for Shortcut {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| Error::InvalidShortcutFormat(format!("{:?} ({})", s, why));

        let tokens: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key_token, modifier_tokens)) = tokens.split_last() else {
            return Err(invalid("empty"));
        };

        let mut modifiers = BTreeSet::new();
        for token in modifier_tokens {
            if token.is_empty() {
                return Err(invalid("empty token"));
            }
            let Some(m) = Modifier::parse(token) else {
                return Err(if canonical_key(token).is_some() {
                    invalid("the key must come last")
                } else {
                    invalid(&format!("unrecognized token {:?}", token))
                });
            };
            if !modifiers.insert(m) {
                return Err(invalid(&format!("duplicate modifier {}", m.as_str())));
            }
        }

        if key_token.is_empty() {
            return Err(invalid("missing key"));
        }
        if Modifier::parse(key_token).is_some() {
            return Err(invalid("missing key"));
        }
        let key = canonical_key(key_token)
            .ok_or_else(|| invalid(&format!("unrecognized key {:?}", key_token)))?;

        Ok(Shortcut { modifiers, key })
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{}+", m.as_str())?;
        }
        f.write_str(&self.key)
    }
}

/// Check a shortcut string and return it parsed.
pub fn validate_format(shortcut: &str) -> Result<Shortcut> {
    shortcut.parse()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HotkeyBinding {
    pub preset_id: String,
    /// Canonical spelling.
    pub shortcut: String,
    pub description: String,
}

/// The OS (or terminal) facility that actually delivers key presses.
pub trait HotkeyBackend {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()>;
    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()>;
}

pub struct HotkeyRegistry<B: HotkeyBackend> {
    backend: B,
    bindings: HashMap<Shortcut, HotkeyBinding>,
}

impl<B: HotkeyBackend> HotkeyRegistry<B> {
    pub fn new(backend: B) -> Self {
        HotkeyRegistry { backend, bindings: HashMap::new() }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// True when no preset owns the shortcut.
    pub fn is_available(&self, shortcut: &str) -> Result<bool> {
        Ok(!self.bindings.contains_key(&validate_format(shortcut)?))
    }

    /// Format and conflict checks `bind` would do, without side effects.
    pub fn check(&self, preset_id: &str, shortcut: &str) -> Result<Shortcut> {
        let parsed = validate_format(shortcut)?;
        match self.bindings.get(&parsed) {
            Some(b) if b.preset_id != preset_id => Err(Error::ShortcutUnavailable(parsed.to_string())),
            _ => Ok(parsed),
        }
    }

    pub fn shortcut_for(&self, preset_id: &str) -> Option<&Shortcut> {
        self.bindings
            .iter()
            .find(|(_, b)| b.preset_id == preset_id)
            .map(|(s, _)| s)
    }

    /// Bind `shortcut` to `preset_id`, releasing whatever shortcut the preset
    /// had before.
    pub fn bind(&mut self, preset_id: &str, shortcut: &str, description: &str) -> Result<Shortcut> {
        let parsed = self.check(preset_id, shortcut)?;
        let previous = self.shortcut_for(preset_id).cloned();
        if previous.as_ref() == Some(&parsed) {
            return Ok(parsed);
        }

        if let Some(old) = &previous {
            self.backend.unregister(old)?;
            self.bindings.remove(old);
        }

        if let Err(e) = self.backend.register(&parsed) {
            if let Some(old) = previous {
                self.restore(preset_id, old, description);
            }
            return Err(e);
        }

        info!(preset = preset_id, shortcut = %parsed, "Hotkey registered");
        self.bindings.insert(
            parsed.clone(),
            HotkeyBinding {
                preset_id: preset_id.to_string(),
                shortcut: parsed.to_string(),
                description: description.to_string(),
            },
        );
        Ok(parsed)
    }

    fn restore(&mut self, preset_id: &str, old: Shortcut, description: &str) {
        match self.backend.register(&old) {
            Ok(()) => {
                self.bindings.insert(
                    old.clone(),
                    HotkeyBinding {
                        preset_id: preset_id.to_string(),
                        shortcut: old.to_string(),
                        description: description.to_string(),
                    },
                );
            }
            Err(e) => warn!(preset = preset_id, shortcut = %old, error = %e, "Could not restore previous hotkey"),
        }
    }

    /// Refresh the description of a preset's binding, e.g. after a rename.
    pub fn set_description(&mut self, preset_id: &str, description: &str) {
        for binding in self.bindings.values_mut().filter(|b| b.preset_id == preset_id) {
            binding.description = description.to_string();
        }
    }

    /// Remove the preset's binding if it has one.
    pub fn unbind(&mut self, preset_id: &str) -> Result<()> {
        let Some(shortcut) = self.shortcut_for(preset_id).cloned() else {
            return Ok(());
        };
        self.backend.unregister(&shortcut)?;
        self.bindings.remove(&shortcut);
        info!(preset = preset_id, shortcut = %shortcut, "Hotkey unregistered");
        Ok(())
    }

    /// Preset bound to a triggered shortcut.
    pub fn activate(&self, shortcut: &Shortcut) -> Option<String> {
        let binding = self.bindings.get(shortcut)?;
        info!(preset = %binding.preset_id, shortcut = %shortcut, "Hotkey activated");
        Some(binding.preset_id.clone())
    }

    pub fn is_bound(&self, shortcut: &Shortcut) -> bool {
        self.bindings.contains_key(shortcut)
    }

    /// Drop bindings whose preset fails `keep`. Returns the pruned preset ids.
    pub fn retain_presets(&mut self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let stale: Vec<Shortcut> = self
            .bindings
            .iter()
            .filter(|(_, b)| !keep(&b.preset_id))
            .map(|(s, _)| s.clone())
            .collect();

        let mut pruned = Vec::new();
        for shortcut in stale {
            if let Err(e) = self.backend.unregister(&shortcut) {
                warn!(shortcut = %shortcut, error = %e, "Failed to unregister stale hotkey");
            }
            if let Some(b) = self.bindings.remove(&shortcut) {
                warn!(preset = %b.preset_id, shortcut = %shortcut, "Pruned hotkey for missing preset");
                pruned.push(b.preset_id);
            }
        }
        pruned
    }

    /// Bindings sorted by shortcut.
    pub fn bindings(&self) -> Vec<&HotkeyBinding> {
        let mut all: Vec<_> = self.bindings.values().collect();
        all.sort_by(|a, b| a.shortcut.cmp(&b.shortcut));
        all
    }

    pub fn unregister_all(&mut self) {
        for (shortcut, _) in self.bindings.drain() {
            if let Err(e) = self.backend.unregister(&shortcut) {
                warn!(shortcut = %shortcut, error = %e, "Failed to unregister hotkey");
            }
        }
    }
}

/// Hotkeys delivered through the terminal's key stream while the TUI runs.
#[derive(Debug, Default)]
pub struct TerminalHotkeys {
    registered: HashSet<Shortcut>,
}

impl HotkeyBackend for TerminalHotkeys {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
        if !self.registered.insert(shortcut.clone()) {
            return Err(Error::ShortcutUnavailable(shortcut.to_string()));
        }
        Ok(())
    }

    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()> {
        self.registered.remove(shortcut);
        Ok(())
    }
}

/// Shifted US-layout digits as terminals report them.
const SHIFTED_DIGITS: &[(char, char)] = &[
    ('!', '1'), ('@', '2'), ('#', '3'), ('$', '4'), ('%', '5'),
    ('^', '6'), ('&', '7'), ('*', '8'), ('(', '9'), (')', '0'),
];

const PUNCTUATION: &[(char, &str)] = &[
    (' ', "Space"), ('-', "Minus"), ('=', "Equal"), (',', "Comma"), ('.', "Period"),
    ('/', "Slash"), (';', "Semicolon"), ('\'', "Quote"), ('`', "Backquote"),
    ('[', "BracketLeft"), (']', "BracketRight"), ('\\', "Backslash"),
];

/// Translate a terminal key press into a shortcut.
pub fn shortcut_from_key(key: &KeyEvent) -> Option<Shortcut> {
    let mut modifiers = BTreeSet::new();
    if key.modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META) {
        modifiers.insert(Modifier::Cmd);
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        modifiers.insert(Modifier::Ctrl);
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        modifiers.insert(Modifier::Alt);
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        modifiers.insert(Modifier::Shift);
    }

    let key_name = match key.code {
        KeyCode::Char(c) if c.is_ascii_alphabetic() => {
            if c.is_ascii_uppercase() {
                modifiers.insert(Modifier::Shift);
            }
            c.to_ascii_uppercase().to_string()
        }
        KeyCode::Char(c) if c.is_ascii_digit() => c.to_string(),
        KeyCode::Char(c) => {
            if let Some(&(_, digit)) = SHIFTED_DIGITS.iter().find(|(s, _)| *s == c) {
                modifiers.insert(Modifier::Shift);
                digit.to_string()
            } else {
                PUNCTUATION.iter().find(|(p, _)| *p == c)?.1.to_string()
            }
        }
        KeyCode::F(n) => format!("F{}", n),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => {
            modifiers.insert(Modifier::Shift);
            "Tab".to_string()
        }
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Insert => "Insert".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        _ => return None,
    };

    Shortcut::new(modifiers, &key_name).ok()
}
