use std::sync::Arc;
use std::time::Instant;
use tokio::process::Child;
use tracing::{debug, error, warn};

use crate::config::TimingConfig;
use crate::events::ExitCode;
use crate::services::process_table::{Process, ProcessTable};
use crate::services::RunFlag;

/// Wait until the game is gone.
///
/// Without a `process_name` the launched process is the game. Otherwise
/// the launched process is only a launcher: the real game is looked up in
/// the process table, and exactly one match is required.
pub async fn wait_for_game(
    mut launcher: Child,
    process_name: String,
    processes: Arc<dyn ProcessTable>,
    timing: TimingConfig,
    running: RunFlag,
) -> ExitCode {
    if process_name.is_empty() {
        let pid = launcher.id();
        debug!("waiting on subprocess {:?}", pid);
        match launcher.wait().await {
            Ok(status) => debug!("subprocess {:?} exited with {}; exiting wrapper", pid, status),
            Err(e) => warn!("Failed to wait for subprocess {:?}: {}", pid, e),
        }
        return ExitCode::Success;
    }

    // reap the launcher whenever it exits
    tokio::spawn(async move {
        let _ = launcher.wait().await;
    });

    let process = match discover(&process_name, processes, timing, &running).await {
        Ok(process) => process,
        Err(code) => return code,
    };

    debug!("waiting on process {}", process);
    let status = process.wait(timing.process_poll()).await;
    debug!("process {} exited with return code {:?}", process.pid, status);
    ExitCode::Success
}

async fn discover(
    pattern: &str,
    processes: Arc<dyn ProcessTable>,
    timing: TimingConfig,
    running: &RunFlag,
) -> Result<Process, ExitCode> {
    let deadline = Instant::now() + timing.process_wait();

    loop {
        if !running.is_running() {
            return Err(ExitCode::Success);
        }
        if Instant::now() > deadline {
            error!("Process not found within {:?}", timing.process_wait());
            return Err(ExitCode::NoGameProcess);
        }

        let table = processes.clone();
        let owned_pattern = pattern.to_string();
        let found = match tokio::task::spawn_blocking(move || table.find_processes(&owned_pattern, false)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                error!("Process lookup failed: {}", e);
                return Err(ExitCode::NoGameProcess);
            }
            Err(e) => {
                error!("Process lookup task failed: {}", e);
                return Err(ExitCode::NoGameProcess);
            }
        };
        debug!("found: {:?}", found.iter().map(|p| p.pid).collect::<Vec<_>>());

        if found.len() > 1 {
            error!("Multiple matching processes:");
            for process in &found {
                error!("{}", process);
            }
            return Err(ExitCode::MultipleGameProcesses);
        }
        if let Some(process) = found.into_iter().next() {
            return Ok(process);
        }

        tokio::time::sleep(timing.process_poll()).await;
    }
}
