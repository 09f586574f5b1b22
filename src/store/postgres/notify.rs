//! LISTEN/NOTIFY change feed
//!
//! Expected trigger payload:
//!
//! ```text
//! {"table": "products", "data": {"id": 1, "name": "..."}}
//! ```

use crate::error::{Result, StoreError};
use crate::pattern::ExecContext;
use crate::store::ChangeEvent;
use futures_util::future::poll_fn;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, NoTls};
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
struct Notification {
    table: String,
    #[serde(default)]
    data: serde_json::Map<String, serde_json::Value>,
}

/// Decode a notification payload into a change event
pub fn decode_notification(payload: &str) -> std::result::Result<ChangeEvent, serde_json::Error> {
    let notification: Notification = serde_json::from_str(payload)?;
    let mut fields = ExecContext::new();
    fields.merge_json(notification.data);
    Ok(ChangeEvent {
        table: notification.table,
        fields,
    })
}

/// Listen on a dedicated connection until it closes or `events` is dropped
///
/// A closed connection is reported as an error so the caller can retry.
pub(super) async fn listen(url: &str, channel: &str, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
    let (client, mut connection) = tokio_postgres::connect(url, NoTls)
        .await
        .map_err(StoreError::backend)?;

    let (payload_tx, mut payload_rx) = mpsc::unbounded_channel::<String>();
    let driver = tokio::spawn(async move {
        loop {
            match poll_fn(|cx| connection.poll_message(cx)).await {
                Some(Ok(AsyncMessage::Notification(n))) => {
                    if payload_tx.send(n.payload().to_string()).is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("PostgreSQL notification error: {}", e);
                    break;
                }
                None => break,
            }
        }
    });

    let statement = format!("LISTEN \"{}\"", channel.replace('"', "\"\""));
    if let Err(e) = client.batch_execute(&statement).await {
        driver.abort();
        return Err(StoreError::backend(e));
    }
    info!(channel, "start listening notifications");

    let result = loop {
        tokio::select! {
            payload = payload_rx.recv() => match payload {
                Some(payload) => match decode_notification(&payload) {
                    Ok(event) => {
                        if events.send(event).await.is_err() {
                            break Ok(());
                        }
                    }
                    Err(e) => warn!(channel, error = %e, "invalid notification payload"),
                },
                None => break Err(StoreError::backend("notification connection closed")),
            },
            _ = events.closed() => break Ok(()),
        }
    };

    driver.abort();
    info!(channel, "stop listening notifications");
    result
}
