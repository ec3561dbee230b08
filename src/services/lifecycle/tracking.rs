use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

use super::ControlMessage;
use crate::error::WrapperError;
use crate::events::{ExitCode, FocusEvent};
use crate::services::focus_watcher::{FocusWatcher, WatchEnd};
use crate::services::window_matcher::{SearchOutcome, WindowMatcher};
use crate::services::RunFlag;

/// Search for the game window and report its focus changes until the run
/// stops. Blocks; run it on a dedicated thread.
///
/// A closed window sends the tracker back to searching, since games often
/// recreate their window. Several matching windows make focus ambiguous:
/// tracking is abandoned and the game keeps running. A broken window
/// system is reported to the coordinator, which decides what to do.
pub fn track_focus(
    matcher: WindowMatcher,
    running: RunFlag,
    events: UnboundedSender<ControlMessage>,
    poll_interval: Duration,
) {
    loop {
        let windows = match matcher.wait_for_windows(&running) {
            SearchOutcome::Found(windows) => windows,
            SearchOutcome::TimedOut => {
                error!("Game window not found");
                let _ = events.send(ControlMessage::Exit(ExitCode::NoGameWindow));
                return;
            }
            SearchOutcome::Cancelled => {
                debug!("game stopped; focus tracking exiting");
                return;
            }
        };

        if windows.len() > 1 {
            let list: Vec<String> = windows.iter().map(ToString::to_string).collect();
            error!("found multiple windows ({}): can't track focus correctly", list.join(", "));
            return;
        }
        debug!("found window: {:?}", windows.as_slice());

        let mut watcher = match FocusWatcher::watch(
            matcher.system().as_ref(),
            &windows,
            running.clone(),
            poll_interval,
        ) {
            Ok(watcher) => watcher,
            Err(WrapperError::InvalidWindow(window)) => {
                debug!("window {} vanished before subscribing, searching again", window);
                std::thread::sleep(poll_interval);
                continue;
            }
            Err(e) => {
                let _ = events.send(ControlMessage::TrackingFailed(e.to_string()));
                return;
            }
        };

        for event in watcher.by_ref() {
            let message = match event {
                FocusEvent::FocusGained(_) => ControlMessage::Focus,
                FocusEvent::FocusLost(_) => ControlMessage::Unfocus,
                FocusEvent::WindowClosed(_) => continue,
            };
            if events.send(message).is_err() {
                return;
            }
        }

        match watcher.end() {
            Some(WatchEnd::WindowClosed(window)) => {
                debug!("window {} closed, searching again", window);
                std::thread::sleep(poll_interval);
            }
            Some(WatchEnd::Failed(reason)) => {
                let _ = events.send(ControlMessage::TrackingFailed(reason.clone()));
                return;
            }
            Some(WatchEnd::Cancelled) | None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::events::{FocusDetail, FocusMode, RawWindowEvent, WindowHandle};
    use crate::services::window_system::{FocusSubscription, MatchCriteria, WindowList, WindowSystem};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    const FIRST: WindowHandle = WindowHandle(0x600001);
    const SECOND: WindowHandle = WindowHandle(0x600042);

    struct ScriptedSubscription {
        focused: Option<WindowHandle>,
        events: VecDeque<RawWindowEvent>,
        /// Fail once the scripted events are used up
        then_fail: bool,
    }

    impl FocusSubscription for ScriptedSubscription {
        fn focused_window(&self) -> Option<WindowHandle> {
            self.focused
        }

        fn next_event(&mut self, wait: Duration) -> Result<Option<RawWindowEvent>> {
            match self.events.pop_front() {
                Some(event) => Ok(Some(event)),
                None if self.then_fail => Err(WrapperError::Internal("X connection lost".to_string())),
                None => {
                    std::thread::sleep(wait);
                    Ok(None)
                }
            }
        }
    }

    /// Search results and subscriptions are handed out in order
    #[derive(Default)]
    struct ScriptedWindows {
        searches: Mutex<VecDeque<WindowList>>,
        subscriptions: Mutex<VecDeque<ScriptedSubscription>>,
    }

    impl WindowSystem for ScriptedWindows {
        fn search(&self, _criteria: &MatchCriteria) -> Result<WindowList> {
            Ok(self.searches.lock().pop_front().unwrap_or_default())
        }

        fn subscribe(&self, windows: &[WindowHandle]) -> Result<Box<dyn FocusSubscription>> {
            match self.subscriptions.lock().pop_front() {
                Some(subscription) => Ok(Box::new(subscription)),
                None => Err(WrapperError::InvalidWindow(windows[0])),
            }
        }

        fn window_manager(&self) -> Option<String> {
            Some("Scripted".to_string())
        }
    }

    fn run_tracker(
        system: ScriptedWindows,
        timeout: Duration,
        expected: usize,
    ) -> Vec<ControlMessage> {
        let matcher = WindowMatcher::new(
            Arc::new(system),
            MatchCriteria::new().with_title("game").unwrap(),
            Duration::from_millis(5),
            timeout,
        );
        let running = RunFlag::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let flag = running.clone();
        let tracker = std::thread::spawn(move || track_focus(matcher, flag, tx, Duration::from_millis(5)));

        let mut messages = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while messages.len() < expected && std::time::Instant::now() < deadline {
            match rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(5)),
            }
        }

        running.stop();
        tracker.join().unwrap();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn closed_window_is_searched_again() {
        let system = ScriptedWindows::default();
        system.searches.lock().extend([
            WindowList::new(),
            WindowList::from_slice(&[FIRST]),
            WindowList::from_slice(&[SECOND]),
        ]);
        system.subscriptions.lock().extend([
            ScriptedSubscription {
                focused: Some(FIRST),
                events: VecDeque::from([
                    RawWindowEvent::FocusOut {
                        window: FIRST,
                        mode: FocusMode::Normal,
                        detail: FocusDetail::Nonlinear,
                    },
                    RawWindowEvent::Destroyed { window: FIRST },
                ]),
                then_fail: false,
            },
            ScriptedSubscription {
                focused: Some(SECOND),
                events: VecDeque::new(),
                then_fail: false,
            },
        ]);

        let messages = run_tracker(system, Duration::from_secs(5), 3);
        assert_eq!(
            messages,
            [ControlMessage::Focus, ControlMessage::Unfocus, ControlMessage::Focus]
        );
    }

    #[test]
    fn broken_subscription_is_reported() {
        let system = ScriptedWindows::default();
        system.searches.lock().push_back(WindowList::from_slice(&[FIRST]));
        system.subscriptions.lock().push_back(ScriptedSubscription {
            focused: None,
            events: VecDeque::from([RawWindowEvent::FocusIn {
                window: FIRST,
                mode: FocusMode::Normal,
                detail: FocusDetail::Nonlinear,
            }]),
            then_fail: true,
        });

        let messages = run_tracker(system, Duration::from_secs(5), 3);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[..2], [ControlMessage::Unfocus, ControlMessage::Focus]);
        match &messages[2] {
            ControlMessage::TrackingFailed(reason) => assert!(reason.contains("X connection lost")),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn ambiguous_match_abandons_tracking() {
        let system = ScriptedWindows::default();
        system
            .searches
            .lock()
            .push_back(WindowList::from_slice(&[FIRST, SECOND]));

        let messages = run_tracker(system, Duration::from_secs(5), 1);
        assert!(messages.is_empty());
    }

    #[test]
    fn missing_window_times_out() {
        let messages = run_tracker(ScriptedWindows::default(), Duration::from_millis(30), 1);
        assert_eq!(messages, [ControlMessage::Exit(ExitCode::NoGameWindow)]);
    }
}
