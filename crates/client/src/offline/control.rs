//! Message channel between application contexts and the cache manager.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use firecalc_core::Error;

use super::CacheManager;

const CHANNEL_CAPACITY: usize = 32;

/// Messages an application context can post to the cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
}

/// Reply posted back on the caller's private reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlReply {
    Ack,
    Version {
        version: String,
    },
    Cleared {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl CacheManager {
    /// Handle one control message.
    pub async fn handle_message(&self, message: ControlMessage) -> ControlReply {
        match message {
            ControlMessage::SkipWaiting => {
                if let Err(e) = self.skip_waiting().await {
                    tracing::warn!(error = %e, "skip waiting failed");
                }
                ControlReply::Ack
            }
            ControlMessage::GetVersion => ControlReply::Version { version: self.version().to_string() },
            ControlMessage::ClearCache => match self.clear().await {
                Ok(()) => ControlReply::Cleared { success: true, error: None },
                Err(e) => ControlReply::Cleared { success: false, error: Some(e.to_string()) },
            },
        }
    }
}

struct Envelope {
    message: ControlMessage,
    reply: oneshot::Sender<ControlReply>,
}

/// Cloneable sender side of the control channel.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Envelope>,
}

/// Spawn the task that owns the receiving end and answers messages in order.
///
/// The task ends once every [`ControlHandle`] is dropped.
pub fn spawn_control(manager: Arc<CacheManager>) -> ControlHandle {
    let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(Envelope { message, reply }) = rx.recv().await {
            tracing::debug!(?message, "control message");
            let answer = manager.handle_message(message).await;
            if reply.send(answer).is_err() {
                tracing::debug!(?message, "control caller went away before reply");
            }
        }
    });

    ControlHandle { tx }
}

impl ControlHandle {
    /// Post a message and wait for its reply.
    pub async fn request(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| Error::ControlClosed)?;
        rx.await.map_err(|_| Error::ControlClosed)
    }

    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.request(ControlMessage::SkipWaiting).await.map(|_| ())
    }

    pub async fn version(&self) -> Result<String, Error> {
        match self.request(ControlMessage::GetVersion).await? {
            ControlReply::Version { version } => Ok(version),
            other => Err(Error::InvalidInput(format!("unexpected reply {other:?}"))),
        }
    }

    /// Returns `{ success, error }` as posted by the manager.
    pub async fn clear_cache(&self) -> Result<ControlReply, Error> {
        self.request(ControlMessage::ClearCache).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::LifecycleState;
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_get_version_reply() {
        let (manager, _, _) = manager("uiic-fire-calc-v1.0.0", true).await;
        let control = spawn_control(manager);
        assert_eq!(control.version().await.unwrap(), "uiic-fire-calc-v1.0.0");
    }

    #[tokio::test]
    async fn test_clear_cache_reply() {
        let (manager, _, db) = manager("v1", true).await;
        manager.install().await.unwrap();
        let control = spawn_control(manager);

        let reply = control.clear_cache().await.unwrap();
        assert_eq!(reply, ControlReply::Cleared { success: true, error: None });
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates() {
        let (manager, _, _) = manager("v1", false).await;
        manager.install().await.unwrap();
        let control = spawn_control(manager.clone());

        control.skip_waiting().await.unwrap();
        assert_eq!(manager.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_replies_go_to_their_own_callers() {
        let (manager, _, _) = manager("v7", true).await;
        let control = spawn_control(manager);
        let other = control.clone();

        let (a, b) = tokio::join!(control.version(), other.request(ControlMessage::SkipWaiting));
        assert_eq!(a.unwrap(), "v7");
        assert_eq!(b.unwrap(), ControlReply::Ack);
    }

    #[test]
    fn test_message_wire_format() {
        let message: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(message, ControlMessage::SkipWaiting);
        let message: ControlMessage = serde_json::from_str(r#"{"type":"GET_VERSION"}"#).unwrap();
        assert_eq!(message, ControlMessage::GetVersion);
        let message: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
        assert_eq!(message, ControlMessage::ClearCache);

        let reply = serde_json::to_value(ControlReply::Cleared { success: true, error: None }).unwrap();
        assert_eq!(reply, serde_json::json!({ "type": "cleared", "success": true }));
    }
}
