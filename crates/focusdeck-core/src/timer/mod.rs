mod machine;

pub use machine::{PomodoroMachine, RunState, SessionType};
