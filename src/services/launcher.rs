//! GPU detection and game command construction.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::config::{Config, Flags};

const DGPU_CONF: &str = "/etc/X11/xorg.conf.d/20-dgpu.conf";
const NVIDIA_CONF: &str = "/etc/X11/video/20-nvidia.conf";
const VULKAN_ICD_DIR: &str = "/usr/share/vulkan/icd.d/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuType {
    Unknown,
    Intel,
    /// Running under an NVIDIA-only X server (`nvidia-xrun`)
    Nvidia,
    Bumblebee,
    Prime,
}

impl GpuType {
    pub fn is_discrete(self) -> bool {
        matches!(self, GpuType::Nvidia | GpuType::Bumblebee | GpuType::Prime)
    }
}

impl fmt::Display for GpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Work out how the discrete GPU can be reached. `optirun` is only probed
/// when the game wants the discrete GPU, since probing powers the card up.
pub fn detect_gpu(needs_gpu: bool) -> GpuType {
    if std::env::var_os("NVIDIA_XRUN").is_some() {
        return GpuType::Nvidia;
    }

    if std::fs::read_link(DGPU_CONF).is_ok_and(|target| target == Path::new(NVIDIA_CONF)) {
        return GpuType::Prime;
    }

    if !needs_gpu {
        return GpuType::Unknown;
    }

    let optirun_works = Command::new("optirun")
        .args(["--silent", "true"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or_else(|e| {
            debug!("optirun unavailable: {}", e);
            false
        });

    if optirun_works {
        GpuType::Bumblebee
    } else {
        GpuType::Intel
    }
}

/// Outcome of checking the requested GPU against the detected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuCheck {
    /// Nothing to do
    Ready,
    /// Discrete GPU missing; `use_gpu` was cleared
    FellBack,
    /// Discrete GPU missing and fallback is disabled
    Unavailable,
}

/// The only place the flags are changed after loading.
pub fn apply_gpu_fallback(flags: &mut Flags, gpu: GpuType) -> GpuCheck {
    if !flags.use_gpu || gpu.is_discrete() {
        return GpuCheck::Ready;
    }
    if flags.fallback {
        flags.use_gpu = false;
        GpuCheck::FellBack
    } else {
        GpuCheck::Unavailable
    }
}

/// Program, arguments and extra environment for the game process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl LaunchPlan {
    pub fn build(config: &Config, gpu: GpuType, verbose: bool) -> Self {
        let flags = &config.flags;
        let mut argv = Vec::new();
        let mut env = Vec::new();

        if !flags.vsync {
            if gpu == GpuType::Nvidia || (gpu == GpuType::Prime && flags.use_gpu) {
                env.push(("__GL_SYNC_TO_VBLANK".to_string(), "0".to_string()));
            } else {
                env.push(("vblank_mode".to_string(), "0".to_string()));
            }
        }

        let icd_files: &[&str] = if flags.use_gpu {
            match gpu {
                GpuType::Prime => argv.push("prime-run".to_string()),
                GpuType::Bumblebee => {
                    argv.push("optirun".to_string());
                    if verbose {
                        argv.push("--debug".to_string());
                    }
                    if flags.use_primus {
                        argv.extend(["-b".to_string(), "primus".to_string()]);
                    }
                }
                _ => {}
            }
            &["nvidia_icd.json"]
        } else {
            &["radeon_icd.x86_64.json", "radeon_icd.i686.json"]
        };

        let icd_paths: Vec<String> = icd_files
            .iter()
            .map(|file| format!("{VULKAN_ICD_DIR}{file}"))
            .collect();
        env.push(("VK_ICD_FILENAMES".to_string(), icd_paths.join(":")));

        let preload = std::env::var("LD_PRELOAD").unwrap_or_default();
        if let Some(cleaned) = clean_ld_preload(&preload, flags.is_64_bit) {
            debug!("Fixed LD_PRELOAD: now {:?}", cleaned);
            env.push(("LD_PRELOAD".to_string(), cleaned));
        }

        argv.extend(config.command.iter().cloned());
        Self { argv, env }
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn to_command(&self) -> Option<tokio::process::Command> {
        let (program, args) = self.argv.split_first()?;
        let mut command = tokio::process::Command::new(program);
        command.args(args).envs(self.env.iter().map(|(k, v)| (k, v)));
        Some(command)
    }
}

impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value:?} ")?;
        }
        write!(f, "{}", self.argv.join(" "))
    }
}

/// Drop the Steam overlay built for the other architecture and the SDL
/// screensaver-inhibit shim. `None` when nothing needs to change.
pub fn clean_ld_preload(current: &str, is_64_bit: bool) -> Option<String> {
    let bad_lib = if is_64_bit { "ubuntu12_32" } else { "ubuntu12_64" };
    let screensaver_fix = "sdl_block_screensaver_inhibit.so";

    let entries: Vec<&str> = current.split(':').collect();
    let cleaned: Vec<&str> = entries
        .iter()
        .copied()
        .filter(|entry| !entry.contains(bad_lib) && !entry.contains(screensaver_fix))
        .collect();

    (cleaned.len() != entries.len()).then(|| cleaned.join(":"))
}
