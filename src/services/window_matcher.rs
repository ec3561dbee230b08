use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::services::window_system::{MatchCriteria, WindowList, WindowSystem};
use crate::services::RunFlag;

/// Result of waiting for the game window to appear
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// At least one window matched
    Found(WindowList),
    /// Nothing matched before the deadline
    TimedOut,
    /// The run flag was cleared while searching
    Cancelled,
}

/// Locates the game window by polling the window system.
pub struct WindowMatcher {
    system: Arc<dyn WindowSystem>,
    criteria: MatchCriteria,
    poll_interval: Duration,
    timeout: Duration,
}

impl WindowMatcher {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        criteria: MatchCriteria,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            system,
            criteria,
            poll_interval,
            timeout,
        }
    }

    pub fn system(&self) -> &Arc<dyn WindowSystem> {
        &self.system
    }

    /// One search pass. Window system failures count as "no results".
    pub fn search(&self) -> WindowList {
        match self.system.search(&self.criteria) {
            Ok(windows) => windows,
            Err(e) => {
                warn!("Window search failed, retrying: {}", e);
                WindowList::new()
            }
        }
    }

    /// Poll until a window matches, the deadline passes, or the run is stopped.
    /// The deadline is measured from this call.
    pub fn wait_for_windows(&self, running: &RunFlag) -> SearchOutcome {
        let deadline = Instant::now() + self.timeout;
        debug!("waiting for window...");

        loop {
            if !running.is_running() {
                return SearchOutcome::Cancelled;
            }

            let windows = self.search();
            if !windows.is_empty() {
                return SearchOutcome::Found(windows);
            }

            if Instant::now() >= deadline {
                return SearchOutcome::TimedOut;
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, WrapperError};
    use crate::events::WindowHandle;
    use crate::services::window_system::FocusSubscription;
    use parking_lot::Mutex;

    /// Returns the scripted results in order, then repeats the last one
    struct ScriptedSearch {
        results: Mutex<Vec<Result<WindowList>>>,
    }

    impl ScriptedSearch {
        fn new(results: Vec<Result<WindowList>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
            })
        }
    }

    impl WindowSystem for ScriptedSearch {
        fn search(&self, _criteria: &MatchCriteria) -> Result<WindowList> {
            let mut results = self.results.lock();
            if results.len() > 1 {
                results.remove(0)
            } else {
                match results.first() {
                    Some(Ok(list)) => Ok(list.clone()),
                    _ => Ok(WindowList::new()),
                }
            }
        }

        fn subscribe(&self, _windows: &[WindowHandle]) -> Result<Box<dyn FocusSubscription>> {
            Err(WrapperError::Internal("not supported".to_string()))
        }

        fn window_manager(&self) -> Option<String> {
            None
        }
    }

    fn matcher(system: Arc<dyn WindowSystem>, timeout_ms: u64) -> WindowMatcher {
        let criteria = MatchCriteria::new().with_title("game").unwrap();
        WindowMatcher::new(
            system,
            criteria,
            Duration::from_millis(5),
            Duration::from_millis(timeout_ms),
        )
    }

    #[test]
    fn finds_window_after_errors_and_empty_results() {
        let system = ScriptedSearch::new(vec![
            Err(WrapperError::Internal("X hiccup".to_string())),
            Ok(WindowList::new()),
            Ok(WindowList::from_slice(&[WindowHandle::new(7)])),
        ]);
        let outcome = matcher(system, 1000).wait_for_windows(&RunFlag::new());
        assert_eq!(
            outcome,
            SearchOutcome::Found(WindowList::from_slice(&[WindowHandle::new(7)]))
        );
    }

    #[test]
    fn times_out_when_nothing_matches() {
        let system = ScriptedSearch::new(vec![Ok(WindowList::new())]);
        let started = Instant::now();
        let outcome = matcher(system, 50).wait_for_windows(&RunFlag::new());
        assert_eq!(outcome, SearchOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn observes_cancellation() {
        let system = ScriptedSearch::new(vec![Ok(WindowList::new())]);
        let running = RunFlag::new();
        running.stop();
        assert_eq!(
            matcher(system, 10_000).wait_for_windows(&running),
            SearchOutcome::Cancelled
        );
    }
}
