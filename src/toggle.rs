//! Confirmation protocol guarding display disables.
//!
//! Enabling is applied straight away. Disabling opens a per-display session
//! that counts down from [`CONFIRM_SECONDS`]; only an explicit confirm lets
//! the caller run the disable, and running out the clock rolls back as if
//! the user had cancelled.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const CONFIRM_SECONDS: u32 = 15;
const TICK: Duration = Duration::from_secs(1);

/// Source of "now" for session timers.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleState {
    Idle,
    PendingConfirmation { remaining_seconds: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Counting(u32),
    /// The countdown reached zero; the session is gone and nothing was
    /// disabled.
    RolledBack,
}

/// What the caller must now do against the display service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleAction {
    Enable(String),
    Disable(String),
}

impl ToggleAction {
    pub fn display_id(&self) -> &str {
        match self {
            ToggleAction::Enable(id) | ToggleAction::Disable(id) => id,
        }
    }
}

#[derive(Debug)]
struct ToggleSession {
    remaining_seconds: u32,
    next_tick: Instant,
}

pub struct ToggleSafetyController<C: Clock = SystemClock> {
    clock: C,
    sessions: BTreeMap<String, ToggleSession>,
}

impl<C: Clock> ToggleSafetyController<C> {
    pub fn new(clock: C) -> Self {
        ToggleSafetyController { clock, sessions: BTreeMap::new() }
    }

    pub fn state(&self, display_id: &str) -> ToggleState {
        match self.sessions.get(display_id) {
            Some(s) => ToggleState::PendingConfirmation { remaining_seconds: s.remaining_seconds },
            None => ToggleState::Idle,
        }
    }

    /// Displays with a pending disable, with their remaining seconds.
    pub fn pending(&self) -> impl Iterator<Item = (&str, u32)> {
        self.sessions.iter().map(|(id, s)| (id.as_str(), s.remaining_seconds))
    }

    /// Enabling is always safe. A pending disable on the same display is
    /// dropped since the user has changed their mind.
    pub fn request_enable(&mut self, display_id: &str) -> ToggleAction {
        if self.sessions.remove(display_id).is_some() {
            debug!(display = display_id, "Enable discarded pending disable");
        }
        ToggleAction::Enable(display_id.to_string())
    }

    /// Open a confirmation session. `enabled_count` is the number of enabled
    /// displays in the current device set; displays already awaiting a
    /// disable confirmation are counted as gone.
    pub fn request_disable(&mut self, display_id: &str, enabled_count: usize) -> Result<u32> {
        if let Some(session) = self.sessions.get(display_id) {
            return Ok(session.remaining_seconds);
        }

        let remaining_enabled = enabled_count.saturating_sub(self.sessions.len());
        if remaining_enabled <= 1 {
            warn!(display = display_id, enabled_count, "Refusing to disable the last enabled display");
            return Err(Error::LastDisplayProtected);
        }

        self.sessions.insert(
            display_id.to_string(),
            ToggleSession {
                remaining_seconds: CONFIRM_SECONDS,
                next_tick: self.clock.now() + TICK,
            },
        );
        info!(display = display_id, seconds = CONFIRM_SECONDS, "Disable awaiting confirmation");
        Ok(CONFIRM_SECONDS)
    }

    /// Advance one session by one second right now. `None` when the display
    /// has no pending session.
    pub fn tick(&mut self, display_id: &str) -> Option<TickOutcome> {
        let now = self.clock.now();
        let outcome = self.step(display_id)?;
        if let Some(session) = self.sessions.get_mut(display_id) {
            session.next_tick = now + TICK;
        }
        Some(outcome)
    }

    /// Fire every tick whose deadline has passed, across all sessions.
    pub fn advance(&mut self) -> Vec<(String, TickOutcome)> {
        let now = self.clock.now();
        let mut fired = Vec::new();
        let ids: Vec<String> = self.sessions.keys().cloned().collect();

        for id in ids {
            while self.sessions.get(&id).is_some_and(|s| s.next_tick <= now) {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.next_tick += TICK;
                }
                match self.step(&id) {
                    Some(outcome) => fired.push((id.clone(), outcome)),
                    None => break,
                }
            }
        }
        fired
    }

    fn step(&mut self, display_id: &str) -> Option<TickOutcome> {
        let session = self.sessions.get_mut(display_id)?;
        session.remaining_seconds = session.remaining_seconds.saturating_sub(1);
        let remaining = session.remaining_seconds;
        if remaining == 0 {
            self.sessions.remove(display_id);
            warn!(display = display_id, "Disable not confirmed in time, rolled back");
            return Some(TickOutcome::RolledBack);
        }
        debug!(display = display_id, remaining, "Disable countdown");
        Some(TickOutcome::Counting(remaining))
    }

    /// Close the session and hand back the disable to perform.
    pub fn confirm(&mut self, display_id: &str) -> Option<ToggleAction> {
        self.sessions.remove(display_id)?;
        info!(display = display_id, "Disable confirmed");
        Some(ToggleAction::Disable(display_id.to_string()))
    }

    /// Close the session without doing anything. Returns whether a session
    /// was pending.
    pub fn cancel(&mut self, display_id: &str) -> bool {
        let was_pending = self.sessions.remove(display_id).is_some();
        if was_pending {
            info!(display = display_id, "Disable cancelled");
        }
        was_pending
    }

    /// Drop every session; no further ticks fire.
    pub fn teardown(&mut self) {
        if !self.sessions.is_empty() {
            debug!(count = self.sessions.len(), "Discarding pending toggle sessions");
        }
        self.sessions.clear();
    }
}
