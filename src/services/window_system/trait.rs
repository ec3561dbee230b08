use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Duration;

use super::criteria::MatchCriteria;
use crate::error::Result;
use crate::events::{RawWindowEvent, WindowHandle};

/// Search results; more than one entry means the criteria are ambiguous
pub type WindowList = SmallVec<[WindowHandle; 2]>;

/// Capability interface over a windowing system.
///
/// Implementations are called from the blocking tracking activity, never
/// from the async coordinator.
pub trait WindowSystem: Send + Sync {
    /// All windows currently matching `criteria`.
    fn search(&self, criteria: &MatchCriteria) -> Result<WindowList>;

    /// Subscribe to focus and destruction notifications for `windows`.
    /// Fails with `InvalidWindow` if any handle does not exist.
    fn subscribe(&self, windows: &[WindowHandle]) -> Result<Box<dyn FocusSubscription>>;

    /// Name of the running window manager, if any
    fn window_manager(&self) -> Option<String>;
}

/// A live subscription created by [`WindowSystem::subscribe`]
pub trait FocusSubscription: Send {
    /// Window holding the input focus when the subscription was made
    fn focused_window(&self) -> Option<WindowHandle>;

    /// Next raw notification. Waits at most `wait` and returns `Ok(None)`
    /// if nothing arrived, so callers can check for cancellation.
    fn next_event(&mut self, wait: Duration) -> Result<Option<RawWindowEvent>>;
}

/// Factory function to create a window system based on the dry_run flag
pub fn create_window_system(dry_run: bool) -> Result<Arc<dyn WindowSystem>> {
    if dry_run {
        Ok(Arc::new(super::dry_run::DryRunWindowSystem::new(
            super::dry_run::DEFAULT_TOGGLE_INTERVAL,
        )))
    } else {
        Ok(Arc::new(super::x11::X11WindowSystem::connect(None)?))
    }
}
