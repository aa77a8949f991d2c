use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reporter::FocusReport;
use crate::timer::SessionType;

/// Every state change in either engine produces an Event.
/// The embedding layer polls for events and performs the side effects they
/// carry (sound cue, reporter delivery, Task Service calls).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_type: SessionType,
        duration_secs: u64,
        task_id: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero while running. Fires exactly once per interval.
    /// `play_sound` is the opaque audio-cue hook; `report` is present when a
    /// completed focus interval was bound to a task.
    TimerCompleted {
        session_type: SessionType,
        next_session_type: SessionType,
        completed_focus_count: u32,
        play_sound: bool,
        report: Option<FocusReport>,
        at: DateTime<Utc>,
    },
    /// Cycle advanced without the countdown finishing. Never carries a report.
    TimerSkipped {
        from: SessionType,
        to: SessionType,
        completed_focus_count: u32,
        at: DateTime<Utc>,
    },
    TimerStopped {
        at: DateTime<Utc>,
    },
    SessionStarted {
        session_id: Uuid,
        task_id: String,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: Uuid,
        total_duration_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: Uuid,
        total_paused_ms: u64,
        at: DateTime<Utc>,
    },
    SubtaskSwitched {
        session_id: Uuid,
        subtask_index: usize,
        at: DateTime<Utc>,
    },
    /// A subtask was marked done. The Task Service PATCH for `subtask_id` is
    /// performed by the caller; `next_active` is the auto-advanced index.
    SubtaskCompleted {
        session_id: Uuid,
        subtask_id: String,
        subtask_index: usize,
        next_active: Option<usize>,
        at: DateTime<Utc>,
    },
    SessionEnded {
        session_id: Uuid,
        task_id: String,
        total_duration_secs: u64,
        report: Option<FocusReport>,
        at: DateTime<Utc>,
    },
}
