//! Pluggable listeners invoked at lifecycle transitions.
//!
//! A hook overrides any subset of the four transition methods. `on_start`
//! falls through to `on_focus` and `on_stop` to `on_unfocus`, so a hook
//! that only cares about focus also runs when the game starts and stops.
//! Overriding `on_start` does not make a hook run on focus.

mod disable_openbox_ffm;
mod hide_top_bar;
mod inhibit_screensaver;
mod registry;
mod stop_xcape;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::events::HookPoint;
use crate::services::process_table::ProcessTable;

pub use registry::HookRegistry;

#[async_trait]
pub trait Hook: Send {
    /// One-time setup, run after construction and before the first transition
    async fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_start(&mut self) -> anyhow::Result<()> {
        self.on_focus().await
    }

    async fn on_stop(&mut self) -> anyhow::Result<()> {
        self.on_unfocus().await
    }

    async fn on_focus(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_unfocus(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Invoke the method for `point`
pub async fn invoke(hook: &mut dyn Hook, point: HookPoint) -> anyhow::Result<()> {
    match point {
        HookPoint::Start => hook.on_start().await,
        HookPoint::Stop => hook.on_stop().await,
        HookPoint::Focus => hook.on_focus().await,
        HookPoint::Unfocus => hook.on_unfocus().await,
    }
}

/// Everything a hook constructor may ask for. Each factory reads only the
/// fields it needs.
#[derive(Clone)]
pub struct HookContext {
    pub config: Arc<Config>,
    pub window_manager: Option<String>,
    pub processes: Arc<dyn ProcessTable>,
}

/// Result of constructing a hook
pub enum HookInit {
    Loaded(Box<dyn Hook>),
    /// The hook does not apply here (wrong window manager, missing
    /// desktop component). Not an error.
    Skip(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Overrides only the focus pair
    struct FocusOnly(Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Hook for FocusOnly {
        async fn on_focus(&mut self) -> anyhow::Result<()> {
            self.0.lock().push("focus");
            Ok(())
        }

        async fn on_unfocus(&mut self) -> anyhow::Result<()> {
            self.0.lock().push("unfocus");
            Ok(())
        }
    }

    /// Overrides only on_start
    struct StartOnly(Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Hook for StartOnly {
        async fn on_start(&mut self) -> anyhow::Result<()> {
            self.0.lock().push("start");
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_and_stop_fall_through_to_focus_methods() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hook = FocusOnly(calls.clone());

        for point in [HookPoint::Start, HookPoint::Unfocus, HookPoint::Focus, HookPoint::Stop] {
            invoke(&mut hook, point).await.unwrap();
        }
        assert_eq!(*calls.lock(), ["focus", "unfocus", "focus", "unfocus"]);
    }

    #[tokio::test]
    async fn overriding_start_does_not_affect_focus() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hook = StartOnly(calls.clone());

        for point in [HookPoint::Focus, HookPoint::Start, HookPoint::Unfocus, HookPoint::Stop] {
            invoke(&mut hook, point).await.unwrap();
        }
        assert_eq!(*calls.lock(), ["start"]);
    }
}
