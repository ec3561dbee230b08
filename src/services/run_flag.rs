use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide "keep running" flag shared by every activity of a run.
///
/// Starts out running and can only ever transition to stopped; there is no
/// way to reset it. Loops poll it at each blocking boundary.
#[derive(Debug, Clone)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns `true` for the call that actually performed the transition.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_monotonic_and_shared() {
        let flag = RunFlag::new();
        let other = flag.clone();
        assert!(other.is_running());

        assert!(flag.stop());
        assert!(!other.is_running());
        assert!(!other.stop());
        assert!(!flag.is_running());
    }
}
