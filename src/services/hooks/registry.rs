use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{invoke, Hook, HookContext, HookInit};
use crate::config::hook_name;
use crate::error::Result;
use crate::events::HookPoint;

/// Builds a hook from the shared context and the arguments given in the
/// configuration entry (`name=a,b` passes `["a", "b"]`).
pub type HookFactory =
    Arc<dyn Fn(&HookContext, &[String]) -> anyhow::Result<HookInit> + Send + Sync>;

/// Known hook factories plus the hooks loaded for this run.
///
/// Loaded hooks are invoked in load order. A failing hook is logged and
/// never stops the remaining hooks.
pub struct HookRegistry {
    factories: BTreeMap<String, HookFactory>,
    loaded: Vec<(String, Box<dyn Hook>)>,
}

impl HookRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
            loaded: Vec::new(),
        }
    }

    /// Registry with every built-in hook
    pub fn discover() -> Self {
        let mut registry = Self::empty();
        registry.register("disable_openbox_ffm", Arc::new(super::disable_openbox_ffm::create));
        registry.register("hide_top_bar", Arc::new(super::hide_top_bar::create));
        registry.register("inhibit_screensaver", Arc::new(super::inhibit_screensaver::create));
        registry.register("stop_xcape", Arc::new(super::stop_xcape::create));
        registry
    }

    pub fn register(&mut self, name: &str, factory: HookFactory) {
        if self.factories.insert(name.to_string(), factory).is_some() {
            warn!("Hook factory {:?} registered twice, keeping the latest", name);
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(|(name, _)| name.as_str())
    }

    /// Load one configured hook entry. Unknown names are an error; a hook
    /// that skips itself or fails to construct is left out.
    pub fn load(&mut self, entry: &str, context: &HookContext) -> Result<()> {
        let name = hook_name(entry);
        let args: Vec<String> = entry
            .split_once('=')
            .map(|(_, args)| args.split(',').map(|a| a.trim().to_string()).collect())
            .unwrap_or_default();

        let Some(factory) = self.factories.get(name) else {
            return Err(crate::wrapper_error!(unknown_hook, "{}", name));
        };

        if self.loaded.iter().any(|(loaded, _)| loaded == name) {
            warn!("Hook {:?} is already loaded", name);
            return Ok(());
        }

        match factory(context, &args) {
            Ok(HookInit::Loaded(hook)) => {
                debug!("loaded hook {:?}", name);
                self.loaded.push((name.to_string(), hook));
            }
            Ok(HookInit::Skip(reason)) => {
                info!("Skipping hook {:?}: {}", name, reason);
            }
            Err(e) => {
                error!("Failed to load hook {:?}: {:#}", name, e);
            }
        }
        Ok(())
    }

    pub fn load_all(&mut self, entries: &[String], context: &HookContext) -> Result<()> {
        for entry in entries {
            self.load(entry, context)?;
        }
        Ok(())
    }

    /// Run every hook's `initialize` once. Hooks that fail are dropped.
    pub async fn initialize_all(&mut self) {
        let mut ready = Vec::with_capacity(self.loaded.len());
        for (name, mut hook) in self.loaded.drain(..) {
            match hook.initialize().await {
                Ok(()) => ready.push((name, hook)),
                Err(e) => error!("Failed to initialize hook {:?}, dropping it: {:#}", name, e),
            }
        }
        self.loaded = ready;
    }

    /// Invoke `point` on every loaded hook in order. Returns how many failed.
    pub async fn dispatch(&mut self, point: HookPoint) -> usize {
        let mut failures = 0;
        for (name, hook) in self.loaded.iter_mut() {
            debug!("running {}.{}", name, point);
            if let Err(e) = invoke(hook.as_mut(), point).await {
                failures += 1;
                error!("Hook {}.{} failed: {:#}", name, point, e);
            }
        }
        failures
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::discover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::WrapperError;
    use crate::services::process_table::{Process, ProcessTable};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct NoProcesses;

    impl ProcessTable for NoProcesses {
        fn find_processes(&self, _pattern: &str, _match_full: bool) -> Result<Vec<Process>> {
            Ok(Vec::new())
        }
    }

    fn context(window_manager: Option<&str>) -> HookContext {
        HookContext {
            config: Arc::new(Config::default()),
            window_manager: window_manager.map(str::to_string),
            processes: Arc::new(NoProcesses),
        }
    }

    type Calls = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: String,
        calls: Calls,
        fail_on_stop: bool,
    }

    #[async_trait]
    impl Hook for Recorder {
        async fn on_start(&mut self) -> anyhow::Result<()> {
            self.calls.lock().push(format!("{}:start", self.name));
            Ok(())
        }

        async fn on_stop(&mut self) -> anyhow::Result<()> {
            self.calls.lock().push(format!("{}:stop", self.name));
            if self.fail_on_stop {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    fn recorder_factory(calls: Calls, fail_on_stop: bool) -> HookFactory {
        Arc::new(move |_ctx: &HookContext, args: &[String]| -> anyhow::Result<HookInit> {
            let name = args.first().cloned().unwrap_or_else(|| "rec".to_string());
            Ok(HookInit::Loaded(Box::new(Recorder {
                name,
                calls: calls.clone(),
                fail_on_stop,
            })))
        })
    }

    #[tokio::test]
    async fn failing_hook_does_not_stop_the_others() {
        let calls: Calls = Arc::default();
        let mut registry = HookRegistry::empty();
        registry.register("first", recorder_factory(calls.clone(), true));
        registry.register("second", recorder_factory(calls.clone(), false));

        let ctx = context(None);
        registry.load("first=a", &ctx).unwrap();
        registry.load("second=b", &ctx).unwrap();

        assert_eq!(registry.dispatch(HookPoint::Start).await, 0);
        assert_eq!(registry.dispatch(HookPoint::Stop).await, 1);
        assert_eq!(*calls.lock(), ["a:start", "b:start", "a:stop", "b:stop"]);
    }

    #[test]
    fn unknown_duplicate_and_skipped_hooks() {
        let calls: Calls = Arc::default();
        let mut registry = HookRegistry::empty();
        registry.register("rec", recorder_factory(calls, false));
        registry.register(
            "picky",
            Arc::new(|_ctx: &HookContext, _args: &[String]| -> anyhow::Result<HookInit> {
                Ok(HookInit::Skip("not here".into()))
            }),
        );
        registry.register(
            "broken",
            Arc::new(|_ctx: &HookContext, _args: &[String]| -> anyhow::Result<HookInit> {
                anyhow::bail!("cannot construct")
            }),
        );

        let ctx = context(None);
        assert!(matches!(
            registry.load("nope", &ctx),
            Err(WrapperError::UnknownHook(name)) if name == "nope"
        ));

        registry.load("rec", &ctx).unwrap();
        registry.load("rec=other", &ctx).unwrap();
        registry.load("picky", &ctx).unwrap();
        registry.load("broken", &ctx).unwrap();
        assert_eq!(registry.loaded().collect::<Vec<_>>(), ["rec"]);
    }

    #[test]
    fn built_in_hooks_are_discovered() {
        let registry = HookRegistry::discover();
        let names: Vec<_> = registry.available().collect();
        assert_eq!(
            names,
            ["disable_openbox_ffm", "hide_top_bar", "inhibit_screensaver", "stop_xcape"]
        );
    }

    #[test]
    fn openbox_hook_skips_itself_elsewhere() {
        let mut registry = HookRegistry::discover();
        registry
            .load("disable_openbox_ffm", &context(Some("GNOME Shell")))
            .unwrap();
        registry.load("disable_openbox_ffm", &context(None)).unwrap();
        assert_eq!(registry.loaded().count(), 0);
    }
}
