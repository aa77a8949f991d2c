mod tracker;

pub use tracker::{SessionSummary, SessionTracker, SubtaskRef, SubtaskSegment, TaskFocusSession};
