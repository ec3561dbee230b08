use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

use super::criteria::MatchCriteria;
use super::r#trait::{FocusSubscription, WindowList, WindowSystem};
use crate::error::Result;
use crate::events::{FocusDetail, FocusMode, RawWindowEvent, WindowHandle};

pub const DEFAULT_TOGGLE_INTERVAL: Duration = Duration::from_secs(10);

/// Handle of the single emulated game window
const DRY_RUN_WINDOW: WindowHandle = WindowHandle(0x1);

/// Emulated window system: one game window that gains and loses focus
/// every `toggle_every`.
pub struct DryRunWindowSystem {
    toggle_every: Duration,
    searches: Mutex<u32>,
}

impl DryRunWindowSystem {
    pub fn new(toggle_every: Duration) -> Self {
        Self {
            toggle_every,
            searches: Mutex::new(0),
        }
    }
}

impl WindowSystem for DryRunWindowSystem {
    fn search(&self, _criteria: &MatchCriteria) -> Result<WindowList> {
        let mut searches = self.searches.lock();
        *searches += 1;
        // the window "appears" on the second search pass
        if *searches < 2 {
            return Ok(WindowList::new());
        }
        Ok(WindowList::from_slice(&[DRY_RUN_WINDOW]))
    }

    fn subscribe(&self, windows: &[WindowHandle]) -> Result<Box<dyn FocusSubscription>> {
        info!("Dry-run: emulating focus changes on {:?}", windows);
        Ok(Box::new(DryRunSubscription {
            toggle_every: self.toggle_every,
            last_toggle: Instant::now(),
            focused: true,
        }))
    }

    fn window_manager(&self) -> Option<String> {
        Some("DryRun".to_string())
    }
}

struct DryRunSubscription {
    toggle_every: Duration,
    last_toggle: Instant,
    focused: bool,
}

impl FocusSubscription for DryRunSubscription {
    fn focused_window(&self) -> Option<WindowHandle> {
        Some(DRY_RUN_WINDOW)
    }

    fn next_event(&mut self, wait: Duration) -> Result<Option<RawWindowEvent>> {
        if self.last_toggle.elapsed() < self.toggle_every {
            std::thread::sleep(wait);
            return Ok(None);
        }

        self.last_toggle = Instant::now();
        self.focused = !self.focused;
        info!("Dry-run: emulating focus {}", if self.focused { "in" } else { "out" });

        let event = if self.focused {
            RawWindowEvent::FocusIn {
                window: DRY_RUN_WINDOW,
                mode: FocusMode::Normal,
                detail: FocusDetail::Nonlinear,
            }
        } else {
            RawWindowEvent::FocusOut {
                window: DRY_RUN_WINDOW,
                mode: FocusMode::Normal,
                detail: FocusDetail::Nonlinear,
            }
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_appears_then_toggles() {
        let system = DryRunWindowSystem::new(Duration::from_millis(0));
        let criteria = MatchCriteria::new().with_title("x").unwrap();
        assert!(system.search(&criteria).unwrap().is_empty());
        assert_eq!(system.search(&criteria).unwrap().as_slice(), &[DRY_RUN_WINDOW]);

        let mut sub = system.subscribe(&[DRY_RUN_WINDOW]).unwrap();
        assert_eq!(sub.focused_window(), Some(DRY_RUN_WINDOW));
        assert!(matches!(
            sub.next_event(Duration::from_millis(1)).unwrap(),
            Some(RawWindowEvent::FocusOut { .. })
        ));
        assert!(matches!(
            sub.next_event(Duration::from_millis(1)).unwrap(),
            Some(RawWindowEvent::FocusIn { .. })
        ));
    }
}
