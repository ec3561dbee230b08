//! Game lifecycle: launch, focus tracking, process wait and teardown.
//!
//! Three activities run concurrently: the focus tracker on a blocking
//! thread, the process wait as a task, and the signal listener inside the
//! coordinator's `select!`. The first two only report through a channel or
//! their return value; the coordinator is the single writer of the log and
//! the only caller of hooks, so every transition is totally ordered.

mod controller;
mod process_wait;
mod tracking;

pub use controller::LifecycleController;
pub use process_wait::wait_for_game;
pub use tracking::track_focus;

use crate::events::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Launching,
    /// Game running; focus is tracked or synthesized
    Running,
    Stopping,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Unknown,
    Focused,
    Unfocused,
}

/// What the activities report to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Focus,
    Unfocus,
    Exit(ExitCode),
    /// The window system broke down; focus can no longer be tracked
    TrackingFailed(String),
}
