use async_trait::async_trait;
use tracing::{debug, warn};
use zbus::Connection;

use super::{Hook, HookContext, HookInit};

const SCREENSAVER: &str = "org.freedesktop.ScreenSaver";
const SCREENSAVER_PATH: &str = "/org/freedesktop/ScreenSaver";

/// Inhibit the screensaver through its D-Bus interface while focused
pub struct InhibitScreensaver {
    game: String,
    connection: Option<Connection>,
    cookie: Option<u32>,
}

pub fn create(context: &HookContext, _args: &[String]) -> anyhow::Result<HookInit> {
    Ok(HookInit::Loaded(Box::new(InhibitScreensaver {
        game: context.config.game.clone(),
        connection: None,
        cookie: None,
    })))
}

#[async_trait]
impl Hook for InhibitScreensaver {
    async fn initialize(&mut self) -> anyhow::Result<()> {
        match Connection::session().await {
            Ok(connection) => self.connection = Some(connection),
            // no session bus just means nothing to inhibit
            Err(e) => warn!("Screensaver inhibition unavailable: {}", e),
        }
        Ok(())
    }

    async fn on_focus(&mut self) -> anyhow::Result<()> {
        let Some(connection) = &self.connection else {
            return Ok(());
        };
        if self.cookie.is_some() {
            return Ok(());
        }

        let reason = format!("playing {}", self.game);
        let reply = connection
            .call_method(
                Some(SCREENSAVER),
                SCREENSAVER_PATH,
                Some(SCREENSAVER),
                "Inhibit",
                &("optiwrapper", reason.as_str()),
            )
            .await?;
        let cookie: u32 = reply.body().deserialize()?;
        debug!("screensaver inhibited, cookie {}", cookie);
        self.cookie = Some(cookie);
        Ok(())
    }

    async fn on_unfocus(&mut self) -> anyhow::Result<()> {
        let (Some(connection), Some(cookie)) = (&self.connection, self.cookie.take()) else {
            return Ok(());
        };

        connection
            .call_method(
                Some(SCREENSAVER),
                SCREENSAVER_PATH,
                Some(SCREENSAVER),
                "UnInhibit",
                &(cookie,),
            )
            .await?;
        debug!("screensaver released, cookie {}", cookie);
        Ok(())
    }
}
