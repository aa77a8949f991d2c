//! Pomodoro state machine.
//!
//! A wall-clock-based countdown that cycles FOCUS -> SHORT_BREAK (every Nth
//! break LONG_BREAK) -> FOCUS. No internal threads: the caller invokes
//! `tick()` periodically and remaining time is recomputed from wall-clock
//! deltas, so a throttled or backgrounded caller loses no accuracy.
//!
//! Every mutation mirrors the run state to the persistence store. On
//! reconstruction after a reload the machine never resumes ticking on its
//! own; the user resumes explicitly.
//!
//! ## Usage
//!
//! ```ignore
//! let mut machine = PomodoroMachine::new(store, settings);
//! machine.start(Some("task-42"));
//! // In a loop:
//! machine.tick(); // Returns Some(Event::TimerCompleted) when an interval ends
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::clock::now_ms;
use crate::events::Event;
use crate::reporter::FocusReport;
use crate::storage::{keys, PomodoroSettings, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    /// Stable string form, used for the interval history log.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::ShortBreak => "short_break",
            SessionType::LongBreak => "long_break",
        }
    }
}

/// The persisted run state blob.
///
/// Invariants: `is_running` and `is_paused` are never both true;
/// `remaining_ms` never exceeds the configured duration for `session_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub is_running: bool,
    pub is_paused: bool,
    /// Remaining time in milliseconds for the current interval.
    pub remaining_ms: u64,
    /// Weak reference to the task the next focus report is attributed to.
    pub current_task_id: Option<String>,
    pub session_type: SessionType,
    /// Monotonic count of completed (or skipped) focus intervals. Never reset.
    pub completed_focus_count: u32,
    /// Wall clock at interval start, for duration accounting in the log.
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    /// Timestamp of the last resume/tick. Not meaningful across reloads.
    #[serde(default)]
    pub last_tick_ms: Option<u64>,
}

impl RunState {
    fn idle(settings: &PomodoroSettings) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            remaining_ms: settings.duration_ms(SessionType::Focus),
            current_task_id: None,
            session_type: SessionType::Focus,
            completed_focus_count: 0,
            started_at_ms: None,
            last_tick_ms: None,
        }
    }
}

/// The cyclic work/break countdown engine.
///
/// Explicitly constructed and injectable: it owns its run state and its
/// persistence handle, and performs no I/O beyond the state mirror. Side
/// effects (sound cue, focus-time reporting) travel in the returned events.
pub struct PomodoroMachine {
    settings: PomodoroSettings,
    state: RunState,
    store: StateStore,
}

impl PomodoroMachine {
    /// Create an idle machine with a full FOCUS interval loaded.
    pub fn new(store: StateStore, settings: PomodoroSettings) -> Self {
        let machine = Self {
            state: RunState::idle(&settings),
            settings,
            store,
        };
        machine.persist();
        machine
    }

    /// Rebuild from the persisted blob, or start idle if none is readable.
    ///
    /// A machine that was running when the snapshot was taken comes back
    /// paused with its remaining time preserved verbatim.
    pub fn restore(store: StateStore, settings: PomodoroSettings) -> Self {
        let mut state = store
            .load::<RunState>(keys::POMODORO_STATE)
            .unwrap_or_else(|| RunState::idle(&settings));
        if state.is_running {
            state.is_running = false;
            state.is_paused = true;
        }
        state.last_tick_ms = None;
        state.remaining_ms = state
            .remaining_ms
            .min(settings.duration_ms(state.session_type));
        let machine = Self {
            settings,
            state,
            store,
        };
        machine.persist();
        machine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn session_type(&self) -> SessionType {
        self.state.session_type
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn remaining_ms(&self) -> u64 {
        self.state.remaining_ms
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_ms.div_ceil(1000)
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.state.completed_focus_count
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.state.current_task_id.as_deref()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the countdown, optionally (re)binding a task.
    ///
    /// When paused this resumes without resetting remaining time; when idle
    /// it starts a fresh interval and records the session-start wall clock.
    /// With no task given the previous binding is retained.
    pub fn start(&mut self, task: Option<&str>) -> Option<Event> {
        self.start_at(task, now_ms())
    }

    pub fn start_at(&mut self, task: Option<&str>, now: u64) -> Option<Event> {
        if let Some(task_id) = task {
            self.state.current_task_id = Some(task_id.to_string());
        }
        let event = if self.state.is_running {
            None
        } else if self.state.is_paused {
            self.state.is_paused = false;
            self.state.is_running = true;
            self.state.last_tick_ms = Some(now);
            Some(Event::TimerResumed {
                remaining_ms: self.state.remaining_ms,
                at: Utc::now(),
            })
        } else {
            self.state.is_running = true;
            self.state.started_at_ms = Some(now);
            self.state.last_tick_ms = Some(now);
            Some(Event::TimerStarted {
                session_type: self.state.session_type,
                duration_secs: self.remaining_secs(),
                task_id: self.state.current_task_id.clone(),
                at: Utc::now(),
            })
        };
        self.persist();
        event
    }

    /// Halt ticking, preserving remaining time verbatim. No-op unless running.
    pub fn pause(&mut self) -> Option<Event> {
        self.pause_at(now_ms())
    }

    pub fn pause_at(&mut self, now: u64) -> Option<Event> {
        if !self.state.is_running {
            return None;
        }
        self.flush_elapsed(now);
        self.state.is_running = false;
        self.state.is_paused = true;
        self.state.last_tick_ms = None;
        self.persist();
        Some(Event::TimerPaused {
            remaining_ms: self.state.remaining_ms,
            at: Utc::now(),
        })
    }

    /// Restart ticking from the preserved remaining time. No-op unless paused.
    pub fn resume(&mut self) -> Option<Event> {
        self.resume_at(now_ms())
    }

    pub fn resume_at(&mut self, now: u64) -> Option<Event> {
        if !self.state.is_paused {
            return None;
        }
        self.state.is_paused = false;
        self.state.is_running = true;
        self.state.last_tick_ms = Some(now);
        self.persist();
        Some(Event::TimerResumed {
            remaining_ms: self.state.remaining_ms,
            at: Utc::now(),
        })
    }

    /// Abort the current cycle: unbind the task and reload the full duration
    /// for the current interval type. Nothing is reported.
    pub fn stop(&mut self) -> Option<Event> {
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.current_task_id = None;
        self.state.remaining_ms = self.settings.duration_ms(self.state.session_type);
        self.state.started_at_ms = None;
        self.state.last_tick_ms = None;
        self.persist();
        Some(Event::TimerStopped { at: Utc::now() })
    }

    /// Advance the cycle as if the countdown hit zero, without reporting.
    ///
    /// A skipped FOCUS interval still increments the completed count, but its
    /// partial focus time is discarded: reports are emitted only on natural
    /// completion.
    pub fn skip(&mut self) -> Option<Event> {
        self.skip_at(now_ms())
    }

    pub fn skip_at(&mut self, now: u64) -> Option<Event> {
        let (from, to) = self.advance_cycle(now);
        self.persist();
        Some(Event::TimerSkipped {
            from,
            to,
            completed_focus_count: self.state.completed_focus_count,
            at: Utc::now(),
        })
    }

    /// Call periodically while running. Returns `Some(Event::TimerCompleted)`
    /// exactly once when the interval finishes.
    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(now_ms())
    }

    pub fn tick_at(&mut self, now: u64) -> Option<Event> {
        if !self.state.is_running {
            return None;
        }
        self.flush_elapsed(now);
        if self.state.remaining_ms > 0 {
            self.persist();
            return None;
        }

        let completed = self.state.session_type;
        let play_sound = self.settings.sound_enabled;
        let duration_secs = self.settings.duration_secs(completed);
        let report = if completed == SessionType::Focus {
            self.state
                .current_task_id
                .clone()
                .map(|task_id| FocusReport::new(task_id, duration_secs))
        } else {
            None
        };

        let started_at = self
            .state
            .started_at_ms
            .unwrap_or_else(|| now.saturating_sub(self.settings.duration_ms(completed)));
        if let Err(e) = self.store.database().record_interval(
            completed.as_str(),
            self.state.current_task_id.as_deref(),
            duration_secs,
            started_at,
            now,
        ) {
            eprintln!("Warning: failed to log completed interval: {e}");
        }

        let (_, next) = self.advance_cycle(now);
        self.persist();
        Some(Event::TimerCompleted {
            session_type: completed,
            next_session_type: next,
            completed_focus_count: self.state.completed_focus_count,
            play_sound,
            report,
            at: Utc::now(),
        })
    }

    /// Swap in new settings, clamping remaining time so it never exceeds the
    /// configured duration for the current interval type.
    pub fn set_settings(&mut self, settings: PomodoroSettings) {
        self.settings = settings;
        self.state.remaining_ms = self
            .state
            .remaining_ms
            .min(self.settings.duration_ms(self.state.session_type));
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_elapsed(&mut self, now: u64) {
        if let Some(last) = self.state.last_tick_ms {
            let elapsed = now.saturating_sub(last);
            self.state.remaining_ms = self.state.remaining_ms.saturating_sub(elapsed);
            self.state.last_tick_ms = Some(now);
        }
    }

    /// Move to the next interval in the cycle and load its full duration.
    /// The new interval runs immediately only if the matching auto-start
    /// flag is set.
    fn advance_cycle(&mut self, now: u64) -> (SessionType, SessionType) {
        let from = self.state.session_type;
        if from == SessionType::Focus {
            self.state.completed_focus_count = self.state.completed_focus_count.saturating_add(1);
        }
        let next = match from {
            SessionType::Focus => {
                let n = self.settings.sessions_until_long_break;
                if n > 0 && self.state.completed_focus_count % n == 0 {
                    SessionType::LongBreak
                } else {
                    SessionType::ShortBreak
                }
            }
            SessionType::ShortBreak | SessionType::LongBreak => SessionType::Focus,
        };
        let auto_start = match next {
            SessionType::Focus => self.settings.auto_start_work,
            SessionType::ShortBreak | SessionType::LongBreak => self.settings.auto_start_breaks,
        };
        self.state.session_type = next;
        self.state.remaining_ms = self.settings.duration_ms(next);
        self.state.is_running = auto_start;
        self.state.is_paused = false;
        self.state.started_at_ms = auto_start.then_some(now);
        self.state.last_tick_ms = auto_start.then_some(now);
        (from, next)
    }

    /// Mirror the run state to the store. Persistence is fire-and-forget:
    /// a failed write never interrupts the countdown.
    fn persist(&self) {
        if let Err(e) = self.store.save(keys::POMODORO_STATE, &self.state) {
            eprintln!("Warning: failed to persist pomodoro state: {e}");
        }
    }
}
