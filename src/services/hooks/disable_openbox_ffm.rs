use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::{Hook, HookContext, HookInit};

static FOLLOW_MOUSE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(<followMouse>)\s*(yes|no|true|false)\s*(</followMouse>)").ok()
});

/// Turn off focus-follows-mouse in Openbox while the game is focused
pub struct DisableOpenboxFfm {
    rc_path: PathBuf,
}

pub fn create(context: &HookContext, _args: &[String]) -> anyhow::Result<HookInit> {
    let window_manager = context.window_manager.as_deref().unwrap_or("");
    if !window_manager.contains("Openbox") {
        return Ok(HookInit::Skip(format!(
            "window manager is {:?}, not Openbox",
            window_manager
        )));
    }

    let config_dir = dirs::config_dir().context("Cannot locate the config directory")?;
    Ok(HookInit::Loaded(Box::new(DisableOpenboxFfm {
        rc_path: config_dir.join("openbox").join("rc.xml"),
    })))
}

/// Rewrite the `<followMouse>` value. Returns `None` when the setting is absent.
pub fn set_follow_mouse(rc: &str, enabled: bool) -> Option<String> {
    let follow_mouse = FOLLOW_MOUSE.as_ref()?;
    if !follow_mouse.is_match(rc) {
        return None;
    }
    let value = if enabled { "yes" } else { "no" };
    Some(
        follow_mouse
            .replace(rc, |caps: &regex::Captures| format!("{}{}{}", &caps[1], value, &caps[3]))
            .into_owned(),
    )
}

fn apply(rc_path: &Path, enabled: bool) -> anyhow::Result<()> {
    let rc = std::fs::read_to_string(rc_path)
        .with_context(|| format!("Failed to read {:?}", rc_path))?;
    let Some(updated) = set_follow_mouse(&rc, enabled) else {
        debug!("no followMouse setting in {:?}", rc_path);
        return Ok(());
    };
    std::fs::write(rc_path, updated).with_context(|| format!("Failed to write {:?}", rc_path))?;

    let status = Command::new("openbox").arg("--reconfigure").status()?;
    if !status.success() {
        anyhow::bail!("openbox --reconfigure exited with {}", status);
    }
    Ok(())
}

#[async_trait]
impl Hook for DisableOpenboxFfm {
    async fn on_focus(&mut self) -> anyhow::Result<()> {
        apply(&self.rc_path, false)
    }

    async fn on_unfocus(&mut self) -> anyhow::Result<()> {
        apply(&self.rc_path, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RC: &str = r#"<openbox_config xmlns="http://openbox.org/3.4/rc">
  <focus>
    <focusNew>yes</focusNew>
    <followMouse>yes</followMouse>
  </focus>
</openbox_config>"#;

    #[test]
    fn toggles_follow_mouse_only() {
        let off = set_follow_mouse(RC, false).unwrap();
        assert!(off.contains("<followMouse>no</followMouse>"));
        assert!(off.contains("<focusNew>yes</focusNew>"));

        let on = set_follow_mouse(&off, true).unwrap();
        assert_eq!(on, RC);
    }

    #[test]
    fn missing_setting_is_left_alone() {
        assert_eq!(set_follow_mouse("<openbox_config/>", false), None);
    }
}
