use regex::{Regex, RegexBuilder};

use crate::config::Config;
use crate::error::{Result, WrapperError};
use crate::events::WindowInfo;

/// Escapes the window system's POSIX regex engine does not understand
const UNSUPPORTED_ESCAPES: &[char] = &['d', 'D', 'w', 'W', 's', 'S', 'b', 'B'];

/// What a window must look like to be considered the game window.
///
/// Immutable for the whole tracking session. Patterns are matched
/// case-insensitively and unanchored, like `xdotool search`.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    title: Option<Regex>,
    class: Option<Regex>,
    pid: Option<u32>,
    require_all: bool,
    only_visible: bool,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            title: None,
            class: None,
            pid: None,
            require_all: true,
            only_visible: true,
        }
    }
}

impl MatchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria for the configured game, or `None` when no window should be tracked.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let mut criteria = Self::new();
        if !config.window_title.is_empty() {
            criteria = criteria.with_title(&config.window_title)?;
        }
        if !config.window_class.is_empty() {
            // the class must match the entire string
            criteria = criteria.with_class(&format!("^({})$", config.window_class))?;
        }
        Ok((!criteria.is_empty()).then_some(criteria))
    }

    pub fn with_title(mut self, pattern: &str) -> Result<Self> {
        self.title = Some(compile_pattern(pattern)?);
        Ok(self)
    }

    pub fn with_class(mut self, pattern: &str) -> Result<Self> {
        self.class = Some(compile_pattern(pattern)?);
        Ok(self)
    }

    #[cfg(test)]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[cfg(test)]
    pub fn with_require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    #[cfg(test)]
    pub fn with_only_visible(mut self, only_visible: bool) -> Self {
        self.only_visible = only_visible;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.class.is_none() && self.pid.is_none()
    }

    pub fn only_visible(&self) -> bool {
        self.only_visible
    }

    pub fn matches(&self, window: &WindowInfo) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.only_visible && !window.visible {
            return false;
        }

        let checks = [
            self.title.as_ref().map(|re| re.is_match(&window.title)),
            self.class.as_ref().map(|re| re.is_match(&window.instance)),
            self.pid.map(|pid| window.pid == Some(pid)),
        ];
        let mut results = checks.into_iter().flatten();

        if self.require_all {
            results.all(|matched| matched)
        } else {
            results.any(|matched| matched)
        }
    }
}

/// Compile a window pattern, rejecting syntax the window system would not accept.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            continue;
        }
        match chars.next() {
            Some(escaped) if UNSUPPORTED_ESCAPES.contains(&escaped) => {
                return WrapperError::invalid_pattern(
                    pattern,
                    format!("\\{escaped} is not supported, use a bracket expression instead"),
                );
            }
            _ => {}
        }
    }

    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|e| WrapperError::invalid_pattern(pattern, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WindowHandle;

    fn window(title: &str, instance: &str) -> WindowInfo {
        WindowInfo::new(WindowHandle::new(1), title.to_string())
            .with_class(instance.to_string(), instance.to_string())
    }

    #[test]
    fn rejects_perl_escapes() {
        assert!(matches!(
            compile_pattern(r"Level \d+"),
            Err(WrapperError::InvalidPattern { .. })
        ));
        assert!(matches!(compile_pattern(r"a\sb"), Err(WrapperError::InvalidPattern { .. })));
        assert!(matches!(compile_pattern("(unclosed"), Err(WrapperError::InvalidPattern { .. })));

        // escaped backslash followed by a letter is fine
        assert!(compile_pattern(r"C:\\dir").is_ok());
        assert!(compile_pattern(r"Level [0-9]+\.").is_ok());
    }

    #[test]
    fn title_match_is_case_insensitive_and_unanchored() {
        let criteria = MatchCriteria::new().with_title("infinifactory").unwrap();
        assert!(criteria.matches(&window("Infinifactory", "")));
        assert!(criteria.matches(&window("The INFINIFACTORY game", "")));
        assert!(!criteria.matches(&window("SpaceChem", "")));
    }

    #[test]
    fn class_from_config_is_anchored() {
        let mut config = Config::default();
        config.window_class = "steam_app_.*".to_string();
        let criteria = MatchCriteria::from_config(&config).unwrap().unwrap();

        assert!(criteria.matches(&window("anything", "steam_app_1234")));
        assert!(!criteria.matches(&window("anything", "not_steam_app_1234")));
    }

    #[test]
    fn require_all_versus_any() {
        let all = MatchCriteria::new()
            .with_title("^Minecraft")
            .unwrap()
            .with_class("^(java)$")
            .unwrap();
        let any = all.clone().with_require_all(false);

        let only_title = window("Minecraft 1.20", "launcher");
        assert!(!all.matches(&only_title));
        assert!(any.matches(&only_title));
        assert!(all.matches(&window("Minecraft 1.20", "java")));
    }

    #[test]
    fn invisible_windows_and_pid() {
        let criteria = MatchCriteria::new().with_pid(42);
        let mut w = window("x", "x").with_pid(42);
        assert!(criteria.matches(&w));

        w.visible = false;
        assert!(!criteria.matches(&w));
        assert!(criteria.clone().with_only_visible(false).matches(&w));
    }

    #[test]
    fn empty_criteria() {
        assert!(MatchCriteria::from_config(&Config::default()).unwrap().is_none());
        assert!(!MatchCriteria::new().matches(&window("x", "x")));
    }
}
