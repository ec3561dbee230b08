use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::services::process_table::compile_process_pattern;
use crate::services::window_system::criteria::compile_pattern;
use crate::utils::executable::find_executable;

/// Per-game configuration, read from `<wrapper dir>/settings/<game>.toml`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Game name; comes from the command line, never from the file
    #[serde(skip)]
    pub game: String,
    pub command: Vec<String>,
    pub flags: Flags,
    pub process_name: String,
    pub window_title: String,
    pub window_class: String,
    pub hooks: Vec<String>,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Flags {
    /// Try to run on the discrete GPU
    pub use_gpu: bool,
    /// Run without the discrete GPU if it is unavailable
    pub fallback: bool,
    /// Use the primus backend for optirun
    pub use_primus: bool,
    pub vsync: bool,
    /// Keeps the matching Steam overlay library in LD_PRELOAD
    pub is_64_bit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    pub window_wait_ms: u64,
    pub window_poll_ms: u64,
    pub process_wait_ms: u64,
    pub process_poll_ms: u64,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            use_gpu: true,
            fallback: true,
            use_primus: true,
            vsync: true,
            is_64_bit: true,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            window_wait_ms: 120_000,
            window_poll_ms: 100,
            process_wait_ms: 20_000,
            process_poll_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn window_wait(&self) -> Duration {
        Duration::from_millis(self.window_wait_ms)
    }

    pub fn window_poll(&self) -> Duration {
        Duration::from_millis(self.window_poll_ms)
    }

    pub fn process_wait(&self) -> Duration {
        Duration::from_millis(self.process_wait_ms)
    }

    pub fn process_poll(&self) -> Duration {
        Duration::from_millis(self.process_poll_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game: String::new(),
            command: Vec::new(),
            flags: Flags::default(),
            process_name: String::new(),
            window_title: String::new(),
            window_class: String::new(),
            hooks: Vec::new(),
            timing: TimingConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the game file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub command: Vec<String>,
    pub use_gpu: Option<bool>,
    pub hide_top_bar: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(game: &str, config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        if !config_path.is_file() {
            anyhow::bail!(
                "The configuration file for {:?} was not found at {:?}",
                game,
                config_path
            );
        }

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("OPTIWRAPPER_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
        config.game = game.to_string();

        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if !overrides.command.is_empty() {
            if let Some(first) = self.command.first() {
                if *first != overrides.command[0] {
                    warn!("Different command given in config file and command line");
                }
            }
            self.command = overrides.command;
        }

        if let Some(use_gpu) = overrides.use_gpu {
            self.flags.use_gpu = use_gpu;
        }

        if overrides.hide_top_bar && !self.hooks.iter().any(|h| hook_name(h) == "hide_top_bar") {
            self.hooks.push("hide_top_bar".to_string());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let Some(program) = self.command.first() else {
            anyhow::bail!("No command specified");
        };

        if find_executable(program).is_none() {
            anyhow::bail!(
                "The file {:?} specified for command does not exist or is not executable",
                program
            );
        }

        let timing = &self.timing;
        if timing.window_wait_ms == 0
            || timing.window_poll_ms == 0
            || timing.process_wait_ms == 0
            || timing.process_poll_ms == 0
        {
            anyhow::bail!("timing values must be greater than 0");
        }

        if !self.process_name.is_empty() {
            compile_process_pattern(&self.process_name)?;
        }
        if !self.window_title.is_empty() {
            compile_pattern(&self.window_title)?;
        }
        if !self.window_class.is_empty() {
            compile_pattern(&self.window_class)?;
        }

        for entry in &self.hooks {
            if hook_name(entry).is_empty() {
                anyhow::bail!("Empty hook name in {:?}", entry);
            }
        }

        Ok(())
    }
}

/// Name part of a `name=arg1,arg2` hook entry
pub fn hook_name(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(name, _)| name).trim()
}
