use std::collections::HashMap;
use tracing::{error, warn};
use zbus::zvariant::Value;
use zbus::Connection;

use crate::error::Result;

const APP_NAME: &str = "optiwrapper";

/// Icon of every notification; all of them report a failure
const ICON: &str = "dialog-error";

/// Report an error on the desktop and in the log. Never fails: a missing
/// notification daemon only produces a log line.
pub async fn notify(message: &str) {
    error!("{}", message);

    if let Err(e) = send(message).await {
        warn!("Displaying notification failed: {}", e);
    }
}

async fn send(message: &str) -> Result<()> {
    let connection = Connection::session().await?;
    let hints: HashMap<&str, Value<'_>> = HashMap::new();
    let actions: Vec<&str> = Vec::new();

    connection
        .call_method(
            Some("org.freedesktop.Notifications"),
            "/org/freedesktop/Notifications",
            Some("org.freedesktop.Notifications"),
            "Notify",
            &(
                APP_NAME,
                0u32,
                ICON,
                APP_NAME,
                message,
                actions,
                hints,
                -1i32,
            ),
        )
        .await?;

    Ok(())
}
