use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle transition of the tracked game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Start,
    Stop { killed: bool },
    Focus,
    Unfocus,
}

impl LifecycleEvent {
    /// Text written to the playtime log. This vocabulary is read by external tools.
    pub fn description(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "game started",
            LifecycleEvent::Stop { killed: false } => "game stopped",
            LifecycleEvent::Stop { killed: true } => "wrapper died",
            LifecycleEvent::Unfocus => "user left",
            LifecycleEvent::Focus => "user returned",
        }
    }

    pub fn from_description(text: &str) -> Option<Self> {
        match text {
            "game started" => Some(LifecycleEvent::Start),
            "game stopped" => Some(LifecycleEvent::Stop { killed: false }),
            "wrapper died" => Some(LifecycleEvent::Stop { killed: true }),
            "user left" => Some(LifecycleEvent::Unfocus),
            "user returned" => Some(LifecycleEvent::Focus),
            _ => None,
        }
    }

    pub fn hook_point(&self) -> HookPoint {
        match self {
            LifecycleEvent::Start => HookPoint::Start,
            LifecycleEvent::Stop { .. } => HookPoint::Stop,
            LifecycleEvent::Focus => HookPoint::Focus,
            LifecycleEvent::Unfocus => HookPoint::Unfocus,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Hook method invoked for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    Start,
    Stop,
    Focus,
    Unfocus,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPoint::Start => "on_start",
            HookPoint::Stop => "on_stop",
            HookPoint::Focus => "on_focus",
            HookPoint::Unfocus => "on_unfocus",
        };
        f.write_str(name)
    }
}

/// Process exit status of the wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    Success = 0,
    Killed = 1,
    NoGpu = 2,
    NoGameWindow = 3,
    NoGameProcess = 4,
    MultipleGameProcesses = 5,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_fatal(self) -> bool {
        !matches!(self, ExitCode::Success | ExitCode::Killed)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions_parse_back() {
        let all = [
            LifecycleEvent::Start,
            LifecycleEvent::Stop { killed: false },
            LifecycleEvent::Stop { killed: true },
            LifecycleEvent::Focus,
            LifecycleEvent::Unfocus,
        ];
        for event in all {
            assert_eq!(LifecycleEvent::from_description(event.description()), Some(event));
        }
        assert_eq!(LifecycleEvent::from_description("game paused"), None);
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Killed.code(), 1);
        assert_eq!(ExitCode::NoGpu.code(), 2);
        assert_eq!(ExitCode::NoGameWindow.code(), 3);
        assert_eq!(ExitCode::NoGameProcess.code(), 4);
        assert_eq!(ExitCode::MultipleGameProcesses.code(), 5);
        assert!(ExitCode::NoGameWindow.is_fatal());
        assert!(!ExitCode::Killed.is_fatal());
    }
}
