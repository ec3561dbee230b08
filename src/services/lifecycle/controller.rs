use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use super::{track_focus, wait_for_game, ControlMessage, ControllerState, FocusState};
use crate::config::Config;
use crate::error::{Result, WrapperError};
use crate::events::{ExitCode, LifecycleEvent};
use crate::services::hooks::HookRegistry;
use crate::services::launcher::LaunchPlan;
use crate::services::notify::notify;
use crate::services::playtime_log::PlaytimeLogger;
use crate::services::process_table::ProcessTable;
use crate::services::window_matcher::WindowMatcher;
use crate::services::window_system::{MatchCriteria, WindowSystem};
use crate::services::RunFlag;

/// Extra time the tracker gets to notice the stop flag during teardown
const TRACKER_JOIN_GRACE: Duration = Duration::from_secs(2);

/// Drives one run of the game and is the only writer of the playtime log.
pub struct LifecycleController {
    config: Arc<Config>,
    plan: LaunchPlan,
    logger: PlaytimeLogger,
    hooks: HookRegistry,
    processes: Arc<dyn ProcessTable>,
    window_system: Option<Arc<dyn WindowSystem>>,
    running: RunFlag,
    state: ControllerState,
    focus: FocusState,
    notifications: bool,
}

impl LifecycleController {
    pub fn new(
        config: Arc<Config>,
        plan: LaunchPlan,
        logger: PlaytimeLogger,
        hooks: HookRegistry,
        processes: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            config,
            plan,
            logger,
            hooks,
            processes,
            window_system: None,
            running: RunFlag::new(),
            state: ControllerState::Idle,
            focus: FocusState::Unknown,
            notifications: true,
        }
    }

    /// Track focus through `system`. Without one, focus is synthesized once
    /// after start.
    pub fn with_window_system(mut self, system: Arc<dyn WindowSystem>) -> Self {
        self.window_system = Some(system);
        self
    }

    #[cfg(test)]
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    /// Log the transition, then run the hooks. Log failures are reported
    /// and do not stop the hooks.
    async fn transition(&mut self, event: LifecycleEvent) {
        if let Err(e) = self.logger.append(event, Local::now()) {
            error!("Failed to write {:?}: {}", self.logger.path(), e);
        }
        self.hooks.dispatch(event.hook_point()).await;
    }

    pub async fn started(&mut self) {
        debug!("game starting...");
        self.state = ControllerState::Running;
        self.transition(LifecycleEvent::Start).await;
    }

    pub async fn focused(&mut self) {
        if self.state != ControllerState::Running || self.focus == FocusState::Focused {
            return;
        }
        debug!("window focused");
        self.focus = FocusState::Focused;
        self.transition(LifecycleEvent::Focus).await;
    }

    pub async fn unfocused(&mut self) {
        if self.state != ControllerState::Running || self.focus == FocusState::Unfocused {
            return;
        }
        debug!("window unfocused");
        self.focus = FocusState::Unfocused;
        self.transition(LifecycleEvent::Unfocus).await;
    }

    /// The Stopping transition. Runs at most once per run.
    pub async fn stopped(&mut self, killed: bool) {
        if matches!(self.state, ControllerState::Stopping | ControllerState::Terminal) {
            return;
        }
        debug!("game stopped");
        self.state = ControllerState::Stopping;
        self.running.stop();
        self.transition(LifecycleEvent::Stop { killed }).await;
    }

    /// Launch the game and drive it to completion.
    ///
    /// Returns the exit code of the wrapper; errors are reserved for
    /// failures before the game started.
    pub async fn run(mut self) -> Result<ExitCode> {
        self.state = ControllerState::Launching;
        let mut command = self
            .plan
            .to_command()
            .ok_or_else(|| crate::wrapper_error!(internal, "empty command line"))?;
        let program = self.plan.program().unwrap_or_default().to_string();
        let criteria = MatchCriteria::from_config(&self.config)?;

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        info!("Launching {}", self.plan);
        let child = command
            .spawn()
            .map_err(|source| WrapperError::Spawn { program, source })?;

        self.started().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracker = self.start_tracking(criteria, tx.clone()).await;

        let mut process_task: JoinHandle<ExitCode> = tokio::spawn(wait_for_game(
            child,
            self.config.process_name.clone(),
            self.processes.clone(),
            self.config.timing,
            self.running.clone(),
        ));

        let mut failure = None;
        let code = loop {
            tokio::select! {
                Some(message) = rx.recv() => match message {
                    ControlMessage::Focus => self.focused().await,
                    ControlMessage::Unfocus => self.unfocused().await,
                    ControlMessage::Exit(code) => break code,
                    ControlMessage::TrackingFailed(reason) => {
                        failure = Some(format!("Focus tracking failed: {}", reason));
                        break ExitCode::NoGameWindow;
                    }
                },
                result = &mut process_task => break process_outcome(result),
                _ = sigint.recv() => {
                    error!("Killed by external signal SIGINT");
                    break ExitCode::Killed;
                }
                _ = sigterm.recv() => {
                    error!("Killed by external signal SIGTERM");
                    break ExitCode::Killed;
                }
            }
        };
        drop(tx);

        self.stopped(code == ExitCode::Killed).await;
        let message = failure.unwrap_or_else(|| fatal_message(code, &self.config));
        if code.is_fatal() && self.notifications {
            notify(&message).await;
        } else if code.is_fatal() {
            error!("{}", message);
        }

        process_task.abort();
        if let Some(tracker) = tracker {
            let grace = self.config.timing.window_poll() + TRACKER_JOIN_GRACE;
            if tokio::time::timeout(grace, tracker).await.is_err() {
                warn!("Focus tracker did not stop within {:?}", grace);
            }
        }

        self.state = ControllerState::Terminal;
        info!("wrapper exiting: {}", code);
        Ok(code)
    }

    /// Start the tracker, or synthesize focus when tracking is impossible.
    async fn start_tracking(
        &mut self,
        criteria: Option<MatchCriteria>,
        events: mpsc::UnboundedSender<ControlMessage>,
    ) -> Option<JoinHandle<()>> {
        let (Some(criteria), Some(system)) = (criteria, self.window_system.clone()) else {
            debug!("not tracking focus");
            self.focused().await;
            return None;
        };

        debug!("in WM, tracking focus");
        let timing = self.config.timing;
        let matcher = WindowMatcher::new(system, criteria, timing.window_poll(), timing.window_wait());
        let running = self.running.clone();
        Some(tokio::task::spawn_blocking(move || {
            track_focus(matcher, running, events, timing.window_poll())
        }))
    }
}

/// A crashed process wait says nothing about the game, so it is not a success.
fn process_outcome(result: std::result::Result<ExitCode, JoinError>) -> ExitCode {
    result.unwrap_or_else(|e| {
        error!("Process wait failed: {}", e);
        ExitCode::Killed
    })
}

fn fatal_message(code: ExitCode, config: &Config) -> String {
    match code {
        ExitCode::NoGameWindow => format!(
            "Window not found within {} seconds",
            config.timing.window_wait().as_secs()
        ),
        ExitCode::NoGameProcess => "Failed to find game PID, quitting".to_string(),
        ExitCode::MultipleGameProcesses => "Multiple game processes found, quitting".to_string(),
        ExitCode::NoGpu => "Discrete GPU not working, quitting".to_string(),
        ExitCode::Success | ExitCode::Killed => format!("{} exited", config.game),
    }
}
