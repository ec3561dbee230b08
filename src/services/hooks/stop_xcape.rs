use async_trait::async_trait;
use tracing::debug;

use super::{Hook, HookContext, HookInit};
use crate::services::process_table::Process;

const XCAPE_PATTERN: &str = "xcape .*Control_L";

/// Suspend xcape while the game is focused, so a held Control key does not
/// turn into Escape.
pub struct StopXcape {
    processes: Vec<Process>,
}

pub fn create(context: &HookContext, _args: &[String]) -> anyhow::Result<HookInit> {
    let processes = context.processes.find_processes(XCAPE_PATTERN, true)?;
    if processes.is_empty() {
        return Ok(HookInit::Skip("xcape is not running".to_string()));
    }
    debug!("found xcape: {:?}", processes.iter().map(|p| p.pid).collect::<Vec<_>>());
    Ok(HookInit::Loaded(Box::new(StopXcape { processes })))
}

#[async_trait]
impl Hook for StopXcape {
    async fn on_focus(&mut self) -> anyhow::Result<()> {
        for process in &self.processes {
            process.suspend()?;
        }
        Ok(())
    }

    async fn on_unfocus(&mut self) -> anyhow::Result<()> {
        for process in &self.processes {
            process.resume()?;
        }
        Ok(())
    }
}
