// TCP transport
//
// Reads the raw UART byte stream forwarded by a bridge (for example a
// receiver micro:bit relaying radio packets to a host-side socket).

use super::{DeviceFilter, DeviceHandle, Transport, TransportEvent, READ_BUFFER_SIZE};
use crate::error::{LoggerError, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub struct TcpTransport {
    address: String,
    stream: Option<TcpStream>,
    is_connected: bool,
}

impl TcpTransport {
    pub fn new(address: String) -> Self {
        Self {
            address,
            stream: None,
            is_connected: false,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, _filter: &DeviceFilter) -> Result<DeviceHandle> {
        log::info!("Connecting to TCP: {}", self.address);

        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| LoggerError::Connection(format!("TCP connection failed: {}", e)))?;

        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.address.clone());

        self.stream = Some(stream);
        self.is_connected = true;
        log::info!("TCP connected to {}", peer);

        Ok(DeviceHandle {
            name: self.address.clone(),
            address: peer,
        })
    }

    async fn start(&mut self, sender: mpsc::Sender<TransportEvent>) -> Result<()> {
        let mut stream = self.stream.take().ok_or(LoggerError::NotConnected)?;
        let mut buf = [0u8; READ_BUFFER_SIZE];

        let reason = loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    log::info!("TCP connection closed by peer");
                    break None;
                }
                Ok(n) => {
                    if sender
                        .send(TransportEvent::Chunk(buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        log::warn!("Transport receiver closed");
                        return Ok(());
                    }
                }
                Err(e) => {
                    log::error!("TCP read error: {}", e);
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
        log::info!("Closing TCP connection to {}", self.address);
        self.stream = None;
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
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_streams_chunks_then_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"TEMP=21\n").await.unwrap();
        });

        let mut transport = TcpTransport::new(address);
        transport.connect(&DeviceFilter::default()).await.unwrap();
        assert!(transport.is_connected());

        let (tx, mut rx) = mpsc::channel(16);
        transport.start(tx).await.unwrap();
        server.await.unwrap();

        let mut received = Vec::new();
        let mut disconnected = false;
        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::Chunk(bytes) => received.extend(bytes),
                TransportEvent::Disconnected { .. } => disconnected = true,
            }
        }
        assert_eq!(received, b"TEMP=21\n");
        assert!(disconnected);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut transport = TcpTransport::new(address);
        let result = transport.connect(&DeviceFilter::default()).await;
        assert!(matches!(result, Err(LoggerError::Connection(_))));
        assert!(!transport.is_connected());
    }
}
