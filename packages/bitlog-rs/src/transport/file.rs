// File replay transport
//
// Streams a captured UART log in fixed-size chunks, useful for:
// - Testing the pipeline without hardware
// - Replaying recorded sessions
// - Exercising arbitrary chunk boundaries (chunks ignore line breaks)

use super::{DeviceFilter, DeviceHandle, Transport, TransportEvent};
use crate::error::{LoggerError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

pub struct FileTransport {
    path: PathBuf,
    chunk_size: usize,
    rate_limit_ms: Option<u64>,
    file: Option<File>,
    is_connected: bool,
}

impl FileTransport {
    pub fn new(path: PathBuf, chunk_size: usize, rate_limit_ms: Option<u64>) -> Self {
        Self {
            path,
            chunk_size,
            rate_limit_ms,
            file: None,
            is_connected: false,
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn connect(&mut self, _filter: &DeviceFilter) -> Result<DeviceHandle> {
        let file = File::open(&self.path).await.map_err(|e| {
            LoggerError::Connection(format!("Failed to open {}: {}", self.path.display(), e))
        })?;

        self.file = Some(file);
        self.is_connected = true;

        log::info!(
            "Connected to file replay: {} ({} byte chunks)",
            self.path.display(),
            self.chunk_size
        );

        Ok(DeviceHandle {
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
            address: self.path.display().to_string(),
        })
    }

    async fn start(&mut self, sender: mpsc::Sender<TransportEvent>) -> Result<()> {
        let mut file = self.file.take().ok_or(LoggerError::NotConnected)?;
        let mut buf = vec![0u8; self.chunk_size];

        let reason = loop {
            match file.read(&mut buf).await {
                Ok(0) => {
                    log::info!("File replay reached EOF");
                    break None;
                }
                Ok(n) => {
                    if sender
                        .send(TransportEvent::Chunk(buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        log::warn!("Transport receiver closed, stopping replay");
                        return Ok(());
                    }

                    if let Some(delay_ms) = self.rate_limit_ms {
                        sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => {
                    log::error!("Error reading replay file: {}", e);
                    break Some(e.to_string());
                }
            }
        };

        self.is_connected = false;
        sender
            .send(TransportEvent::Disconnected { reason })
            .await
            .ok();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        log::info!("Stopping file replay");
        self.file = None;
        self.is_connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_replays_in_chunks() {
        let mut capture = tempfile::NamedTempFile::new().unwrap();
        capture.write_all(b"A=1\nB=2\n").unwrap();

        let mut transport = FileTransport::new(capture.path().to_path_buf(), 3, None);
        let device = transport.connect(&DeviceFilter::default()).await.unwrap();
        assert_eq!(device.address, capture.path().display().to_string());

        let (tx, mut rx) = mpsc::channel(16);
        transport.start(tx).await.unwrap();

        let mut chunks = Vec::new();
        while let Some(event) = rx.recv().await {
            chunks.push(event);
        }
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], TransportEvent::Chunk(b"A=1".to_vec()));
        assert_eq!(chunks[2], TransportEvent::Chunk(b"2\n".to_vec()));
        assert_eq!(chunks[3], TransportEvent::Disconnected { reason: None });
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let mut transport = FileTransport::new(PathBuf::from("/nonexistent/capture.txt"), 8, None);
        let result = transport.connect(&DeviceFilter::default()).await;
        assert!(matches!(result, Err(LoggerError::Connection(_))));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_start_without_connect() {
        let mut transport = FileTransport::new(PathBuf::from("capture.txt"), 8, None);
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(transport.start(tx).await, Err(LoggerError::NotConnected)));
    }
}
