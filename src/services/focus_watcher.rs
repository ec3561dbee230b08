use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::events::{FocusDetail, FocusEvent, FocusMode, RawWindowEvent, WindowHandle};
use crate::services::window_system::{FocusSubscription, WindowList, WindowSystem};
use crate::services::RunFlag;

/// Why a watch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEnd {
    WindowClosed(WindowHandle),
    Cancelled,
    Failed(String),
}

/// Turns raw focus notifications for a fixed set of windows into a lazy
/// sequence of [`FocusEvent`]s.
///
/// The sequence starts with one synthetic event per window reflecting the
/// focus state at subscription time. It ends after a tracked window is
/// closed, when the run flag is cleared, or when the subscription fails;
/// [`FocusWatcher::end`] tells which. A watcher cannot be restarted.
pub struct FocusWatcher {
    subscription: Box<dyn FocusSubscription>,
    tracked: WindowList,
    focused: Option<WindowHandle>,
    pending: VecDeque<FocusEvent>,
    running: RunFlag,
    poll_interval: Duration,
    end: Option<WatchEnd>,
}

impl FocusWatcher {
    /// Subscribe to `windows`. An invalid handle fails here, before any event.
    pub fn watch(
        system: &dyn WindowSystem,
        windows: &[WindowHandle],
        running: RunFlag,
        poll_interval: Duration,
    ) -> Result<Self> {
        let subscription = system.subscribe(windows)?;
        Ok(Self::from_subscription(subscription, windows, running, poll_interval))
    }

    pub fn from_subscription(
        subscription: Box<dyn FocusSubscription>,
        windows: &[WindowHandle],
        running: RunFlag,
        poll_interval: Duration,
    ) -> Self {
        let focused = subscription.focused_window();
        let pending = windows
            .iter()
            .map(|&window| {
                if focused == Some(window) {
                    FocusEvent::FocusGained(window)
                } else {
                    FocusEvent::FocusLost(window)
                }
            })
            .collect();

        Self {
            subscription,
            tracked: WindowList::from_slice(windows),
            focused,
            pending,
            running,
            poll_interval,
            end: None,
        }
    }

    pub fn end(&self) -> Option<&WatchEnd> {
        self.end.as_ref()
    }

    fn normalize(&mut self, raw: RawWindowEvent) -> Option<FocusEvent> {
        match raw {
            RawWindowEvent::Destroyed { window } => {
                debug!("window destroyed: {}", window);
                self.tracked
                    .contains(&window)
                    .then_some(FocusEvent::WindowClosed(window))
            }
            RawWindowEvent::FocusIn { window, mode, .. } => {
                if !is_real_focus_change(mode) || !self.tracked.contains(&window) {
                    return None;
                }
                if self.focused == Some(window) {
                    return None;
                }
                self.focused = Some(window);
                Some(FocusEvent::FocusGained(window))
            }
            RawWindowEvent::FocusOut { window, mode, detail } => {
                if !is_real_focus_change(mode) || !self.tracked.contains(&window) {
                    return None;
                }
                // focus moved into a child of the same window
                if detail == FocusDetail::Inferior || self.focused != Some(window) {
                    return None;
                }
                self.focused = None;
                Some(FocusEvent::FocusLost(window))
            }
        }
    }
}

/// Grab/ungrab notifications come from transient grabs such as popups
fn is_real_focus_change(mode: FocusMode) -> bool {
    matches!(mode, FocusMode::Normal | FocusMode::WhileGrabbed)
}

impl Iterator for FocusWatcher {
    type Item = FocusEvent;

    fn next(&mut self) -> Option<FocusEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        while self.end.is_none() {
            if !self.running.is_running() {
                self.end = Some(WatchEnd::Cancelled);
                break;
            }

            let raw = match self.subscription.next_event(self.poll_interval) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    self.end = Some(WatchEnd::Failed(e.to_string()));
                    break;
                }
            };

            if !self.running.is_running() {
                self.end = Some(WatchEnd::Cancelled);
                break;
            }

            if let Some(event) = self.normalize(raw) {
                if let FocusEvent::WindowClosed(window) = event {
                    self.end = Some(WatchEnd::WindowClosed(window));
                }
                return Some(event);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WrapperError;
    use crate::services::window_system::MatchCriteria;
    use std::collections::VecDeque;

    const GAME: WindowHandle = WindowHandle(0x4200001);
    const OTHER: WindowHandle = WindowHandle(0x3a00007);

    struct Scripted {
        focused: Option<WindowHandle>,
        events: VecDeque<Result<Option<RawWindowEvent>>>,
        stop_when_drained: Option<RunFlag>,
    }

    impl FocusSubscription for Scripted {
        fn focused_window(&self) -> Option<WindowHandle> {
            self.focused
        }

        fn next_event(&mut self, _wait: Duration) -> Result<Option<RawWindowEvent>> {
            match self.events.pop_front() {
                Some(event) => event,
                None => {
                    if let Some(flag) = &self.stop_when_drained {
                        flag.stop();
                    }
                    Ok(None)
                }
            }
        }
    }

    fn focus_in(window: WindowHandle, mode: FocusMode) -> Result<Option<RawWindowEvent>> {
        Ok(Some(RawWindowEvent::FocusIn {
            window,
            mode,
            detail: FocusDetail::Nonlinear,
        }))
    }

    fn focus_out(window: WindowHandle, mode: FocusMode, detail: FocusDetail) -> Result<Option<RawWindowEvent>> {
        Ok(Some(RawWindowEvent::FocusOut { window, mode, detail }))
    }

    fn watcher(
        focused: Option<WindowHandle>,
        events: Vec<Result<Option<RawWindowEvent>>>,
    ) -> (FocusWatcher, RunFlag) {
        let running = RunFlag::new();
        let sub = Scripted {
            focused,
            events: events.into(),
            stop_when_drained: Some(running.clone()),
        };
        let watcher = FocusWatcher::from_subscription(
            Box::new(sub),
            &[GAME],
            running.clone(),
            Duration::from_millis(1),
        );
        (watcher, running)
    }

    #[test]
    fn initial_state_is_reported_first() {
        let (mut w, _) = watcher(Some(GAME), vec![]);
        assert_eq!(w.next(), Some(FocusEvent::FocusGained(GAME)));
        assert_eq!(w.next(), None);
        assert_eq!(w.end(), Some(&WatchEnd::Cancelled));

        let (mut w, _) = watcher(Some(OTHER), vec![]);
        assert_eq!(w.next(), Some(FocusEvent::FocusLost(GAME)));
    }

    #[test]
    fn filters_grabs_inferiors_and_unrelated_windows() {
        let (w, _) = watcher(
            Some(OTHER),
            vec![
                focus_in(GAME, FocusMode::Grab),
                focus_in(OTHER, FocusMode::Normal),
                focus_in(GAME, FocusMode::Normal),
                focus_in(GAME, FocusMode::Normal),
                focus_out(GAME, FocusMode::Ungrab, FocusDetail::Nonlinear),
                focus_out(GAME, FocusMode::Normal, FocusDetail::Inferior),
                focus_out(GAME, FocusMode::WhileGrabbed, FocusDetail::Nonlinear),
                focus_out(GAME, FocusMode::Normal, FocusDetail::Nonlinear),
            ],
        );

        let events: Vec<_> = w.collect();
        assert_eq!(
            events,
            vec![
                FocusEvent::FocusLost(GAME),
                FocusEvent::FocusGained(GAME),
                FocusEvent::FocusLost(GAME),
            ]
        );
    }

    #[test]
    fn window_closed_ends_the_sequence() {
        let (mut w, running) = watcher(
            Some(GAME),
            vec![
                Ok(Some(RawWindowEvent::Destroyed { window: OTHER })),
                Ok(Some(RawWindowEvent::Destroyed { window: GAME })),
                focus_in(GAME, FocusMode::Normal),
            ],
        );

        assert_eq!(w.next(), Some(FocusEvent::FocusGained(GAME)));
        assert_eq!(w.next(), Some(FocusEvent::WindowClosed(GAME)));
        assert_eq!(w.next(), None);
        assert_eq!(w.end(), Some(&WatchEnd::WindowClosed(GAME)));
        assert!(running.is_running());
    }

    #[test]
    fn subscription_errors_end_the_sequence() {
        let (w, _) = watcher(
            None,
            vec![Err(WrapperError::Internal("connection lost".to_string()))],
        );
        let mut w = w;
        assert_eq!(w.next(), Some(FocusEvent::FocusLost(GAME)));
        assert_eq!(w.next(), None);
        assert!(matches!(w.end(), Some(WatchEnd::Failed(_))));
    }

    #[test]
    fn invalid_handle_fails_at_subscribe() {
        struct Rejecting;
        impl WindowSystem for Rejecting {
            fn search(&self, _c: &MatchCriteria) -> Result<WindowList> {
                Ok(WindowList::new())
            }
            fn subscribe(&self, windows: &[WindowHandle]) -> Result<Box<dyn FocusSubscription>> {
                Err(WrapperError::InvalidWindow(windows[0]))
            }
            fn window_manager(&self) -> Option<String> {
                None
            }
        }

        let result = FocusWatcher::watch(&Rejecting, &[GAME], RunFlag::new(), Duration::from_millis(1));
        assert!(matches!(result, Err(WrapperError::InvalidWindow(w)) if w == GAME));
    }
}
