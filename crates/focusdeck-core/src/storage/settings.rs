//! User-configurable pomodoro settings.
//!
//! Persisted as a JSON blob under `pomodoro.settings`, independently of the
//! running state. Every field carries its own serde default so a partial or
//! hand-edited blob degrades field-by-field instead of failing the load.
//!
//! Values are not range-validated: a zero-minute interval is accepted and
//! simply completes on the next tick.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::timer::SessionType;

use super::store::{keys, StateStore};

/// Interval lengths and auto-advance flags for the pomodoro machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_sessions_until_long_break")]
    pub sessions_until_long_break: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_work: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

/// Partial settings update. Fields left `None` retain their previous values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub work_minutes: Option<u32>,
    pub short_break_minutes: Option<u32>,
    pub long_break_minutes: Option<u32>,
    pub sessions_until_long_break: Option<u32>,
    pub auto_start_breaks: Option<bool>,
    pub auto_start_work: Option<bool>,
    pub sound_enabled: Option<bool>,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_sessions_until_long_break() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            sessions_until_long_break: default_sessions_until_long_break(),
            auto_start_breaks: false,
            auto_start_work: false,
            sound_enabled: true,
        }
    }
}

impl PomodoroSettings {
    /// Configured minutes for the given interval type.
    pub fn minutes(&self, kind: SessionType) -> u32 {
        match kind {
            SessionType::Focus => self.work_minutes,
            SessionType::ShortBreak => self.short_break_minutes,
            SessionType::LongBreak => self.long_break_minutes,
        }
    }

    /// Configured interval length in seconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_secs(&self, kind: SessionType) -> u64 {
        (self.minutes(kind) as u64).saturating_mul(60)
    }

    /// Configured interval length in milliseconds.
    pub fn duration_ms(&self, kind: SessionType) -> u64 {
        self.duration_secs(kind).saturating_mul(1000)
    }

    fn merged(mut self, update: &SettingsUpdate) -> Self {
        if let Some(v) = update.work_minutes {
            self.work_minutes = v;
        }
        if let Some(v) = update.short_break_minutes {
            self.short_break_minutes = v;
        }
        if let Some(v) = update.long_break_minutes {
            self.long_break_minutes = v;
        }
        if let Some(v) = update.sessions_until_long_break {
            self.sessions_until_long_break = v;
        }
        if let Some(v) = update.auto_start_breaks {
            self.auto_start_breaks = v;
        }
        if let Some(v) = update.auto_start_work {
            self.auto_start_work = v;
        }
        if let Some(v) = update.sound_enabled {
            self.sound_enabled = v;
        }
        self
    }
}

/// Durable settings store. Loads once on open, persists on every update.
pub struct SettingsStore {
    store: StateStore,
    current: PomodoroSettings,
}

impl SettingsStore {
    /// Open over an existing state store. An absent or corrupt blob yields
    /// the documented defaults.
    pub fn open(store: StateStore) -> Self {
        let current = store
            .load::<PomodoroSettings>(keys::POMODORO_SETTINGS)
            .unwrap_or_default();
        Self { store, current }
    }

    pub fn get(&self) -> PomodoroSettings {
        self.current
    }

    /// Merge a partial update, persist, and return the merged settings.
    ///
    /// # Errors
    /// Returns an error if the write fails; the in-memory value is updated
    /// regardless.
    pub fn update(&mut self, update: SettingsUpdate) -> Result<PomodoroSettings, StoreError> {
        self.current = self.current.merged(&update);
        self.store.save(keys::POMODORO_SETTINGS, &self.current)?;
        Ok(self.current)
    }
}
