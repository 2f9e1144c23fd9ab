// User commands for a running controller
//
// Every action arrives through one channel and is handled by the controller
// loop between transport events. Each request that can fail carries a
// oneshot reply with an explicit result.

use crate::error::{LoggerError, Result};
use crate::export::ExportFormat;
use crate::projector::Projection;
use crate::schema::{CommandOutcome, SchemaCommand};
use crate::transport::DeviceHandle;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Hint shown when logging starts but the host cannot stay awake.
pub const KEEP_AWAKE_HINT: &str =
    "Keep-screen-on is not supported here; logging continues, but keep the display awake manually.";

/// Result of a successful start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOutcome {
    /// Set when keep-awake was requested but could not be acquired
    pub keep_awake_hint: Option<String>,
}

#[derive(Debug)]
pub enum LoggerCommand {
    Connect {
        reply: oneshot::Sender<Result<DeviceHandle>>,
    },
    StartLogging {
        keep_awake: bool,
        reply: oneshot::Sender<Result<StartOutcome>>,
    },
    StopLogging,
    Clear,
    Schema {
        command: SchemaCommand,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Export {
        dir: PathBuf,
        format: ExportFormat,
        reply: oneshot::Sender<Result<PathBuf>>,
    },
    Snapshot {
        reply: oneshot::Sender<Projection>,
    },
    Disconnect,
}

/// Cloneable sender side of the command channel.
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    sender: mpsc::Sender<LoggerCommand>,
}

impl LoggerHandle {
    /// Create a handle and the receiver to pass to `LoggerController::run`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LoggerCommand>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    async fn send(&self, command: LoggerCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| LoggerError::ChannelClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LoggerCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply)).await?;
        response.await.map_err(|_| LoggerError::ChannelClosed)
    }

    /// Connect again after a disconnect. Recorded data is kept.
    pub async fn connect(&self) -> Result<DeviceHandle> {
        self.request(|reply| LoggerCommand::Connect { reply }).await?
    }

    pub async fn start_logging(&self, keep_awake: bool) -> Result<StartOutcome> {
        self.request(|reply| LoggerCommand::StartLogging { keep_awake, reply })
            .await?
    }

    pub async fn stop_logging(&self) -> Result<()> {
        self.send(LoggerCommand::StopLogging).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.send(LoggerCommand::Clear).await
    }

    pub async fn rename(&self, key: &str, label: &str) -> Result<CommandOutcome> {
        let command = SchemaCommand::Rename {
            key: key.to_string(),
            label: label.to_string(),
        };
        self.request(|reply| LoggerCommand::Schema { command, reply })
            .await?
    }

    pub async fn set_enabled(&self, key: &str, enabled: bool) -> Result<CommandOutcome> {
        let command = SchemaCommand::SetEnabled {
            key: key.to_string(),
            enabled,
        };
        self.request(|reply| LoggerCommand::Schema { command, reply })
            .await?
    }

    /// Export the session into `dir`. Returns the written file's path.
    pub async fn export(&self, dir: impl Into<PathBuf>, format: ExportFormat) -> Result<PathBuf> {
        let dir = dir.into();
        self.request(|reply| LoggerCommand::Export { dir, format, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<Projection> {
        self.request(|reply| LoggerCommand::Snapshot { reply }).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(LoggerCommand::Disconnect).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_channel() {
        let (handle, receiver) = LoggerHandle::channel(1);
        drop(receiver);
        assert!(matches!(handle.clear().await, Err(LoggerError::ChannelClosed)));
        assert!(matches!(handle.snapshot().await, Err(LoggerError::ChannelClosed)));
        assert!(matches!(handle.connect().await, Err(LoggerError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_dropped_reply() {
        let (handle, mut receiver) = LoggerHandle::channel(1);
        let responder = tokio::spawn(async move {
            // Receive and drop without replying.
            receiver.recv().await.map(|_| ())
        });
        let result = handle.start_logging(false).await;
        assert!(matches!(result, Err(LoggerError::ChannelClosed)));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_round_trip() {
        let (handle, mut receiver) = LoggerHandle::channel(1);
        tokio::spawn(async move {
            if let Some(LoggerCommand::Schema { command, reply }) = receiver.recv().await {
                assert_eq!(
                    command,
                    SchemaCommand::Rename {
                        key: "LIGHT".to_string(),
                        label: "Lux".to_string()
                    }
                );
                reply.send(Ok(CommandOutcome::Applied)).ok();
            }
        });
        let outcome = handle.rename("LIGHT", "Lux").await.unwrap();
        assert_eq!(outcome, CommandOutcome::Applied);
    }
}
