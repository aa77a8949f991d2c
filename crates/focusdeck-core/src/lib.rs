//! # Focusdeck Core Library
//!
//! Core business logic for Focusdeck's focus timer and session tracking.
//! The surrounding task-management app (task CRUD, kanban, notifications,
//! analytics) is a thin display layer; this crate owns the two stateful
//! engines and their persistence:
//!
//! - **Pomodoro State Machine**: a cyclic work/break countdown. Wall-clock
//!   based -- the caller invokes `tick()` periodically and accuracy survives
//!   throttling, pause/resume, and reloads.
//! - **Segment Tracker**: attributes one focus session's elapsed time to
//!   whichever subtask is active, as a non-overlapping segment partition.
//!
//! Both engines mirror their state to durable storage on every change and
//! express side effects (sound cue, focus-time reporting, subtask completion)
//! as returned [`Event`]s; the embedding layer performs them, delivering
//! focus reports through the at-most-once [`FocusTimeReporter`].
//!
//! ## Key Components
//!
//! - [`PomodoroMachine`]: the countdown state machine
//! - [`SessionTracker`]: the focus-session engine
//! - [`SettingsStore`] / [`StateStore`]: durable settings and state blobs
//! - [`FocusTimeReporter`] / [`TaskServiceClient`]: outbound Task Service calls

mod clock;
pub mod error;
pub mod events;
pub mod reporter;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{CoreError, ReporterError, StoreError};
pub use events::Event;
pub use reporter::{FocusReport, FocusTimeReporter, RetryPolicy, TaskServiceClient};
pub use session::{SessionSummary, SessionTracker, SubtaskRef, SubtaskSegment, TaskFocusSession};
pub use storage::{Database, PomodoroSettings, SettingsStore, SettingsUpdate, StateStore};
pub use timer::{PomodoroMachine, RunState, SessionType};
