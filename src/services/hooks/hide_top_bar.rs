use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;
use zbus::zvariant::OwnedValue;
use zbus::Connection;

use super::{Hook, HookContext, HookInit};

const EXTENSION_UUID: &str = "hidetopbar@mathieu.bidon.ca";

const SHELL: &str = "org.gnome.Shell";
const SHELL_PATH: &str = "/org/gnome/Shell";
const SHELL_EXTENSIONS: &str = "org.gnome.Shell.Extensions";

/// GNOME Shell reports an enabled extension with state 1
const STATE_ENABLED: f64 = 1.0;

/// Hide the GNOME top bar for the whole session, through the Hide Top Bar
/// extension. Left alone if the user already has the extension enabled.
pub struct HideTopBar {
    connection: Option<Connection>,
    manage: bool,
}

pub fn create(_context: &HookContext, _args: &[String]) -> anyhow::Result<HookInit> {
    Ok(HookInit::Loaded(Box::new(HideTopBar {
        connection: None,
        manage: true,
    })))
}

impl HideTopBar {
    async fn call(&self, method: &str) -> anyhow::Result<Option<zbus::Message>> {
        let Some(connection) = &self.connection else {
            return Ok(None);
        };
        let reply = connection
            .call_method(
                Some(SHELL),
                SHELL_PATH,
                Some(SHELL_EXTENSIONS),
                method,
                &(EXTENSION_UUID,),
            )
            .await?;
        Ok(Some(reply))
    }

    async fn is_enabled(&self) -> anyhow::Result<bool> {
        let Some(reply) = self.call("GetExtensionInfo").await? else {
            return Ok(false);
        };
        let mut info: HashMap<String, OwnedValue> = reply.body().deserialize()?;
        let state = info
            .remove("state")
            .and_then(|value| f64::try_from(value).ok())
            .unwrap_or(-1.0);
        Ok(state == STATE_ENABLED)
    }
}

#[async_trait]
impl Hook for HideTopBar {
    async fn initialize(&mut self) -> anyhow::Result<()> {
        self.connection = Some(Connection::session().await?);
        self.manage = !self.is_enabled().await?;
        debug!("hide top bar: managing extension = {}", self.manage);
        Ok(())
    }

    async fn on_start(&mut self) -> anyhow::Result<()> {
        if self.manage {
            self.call("EnableExtension").await?;
        }
        Ok(())
    }

    async fn on_stop(&mut self) -> anyhow::Result<()> {
        if self.manage {
            self.call("DisableExtension").await?;
        }
        Ok(())
    }
}
