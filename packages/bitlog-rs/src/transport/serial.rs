// Serial port transport (Unix-only)
//
// The micro:bit exposes its UART on the USB serial console
// (e.g. /dev/ttyACM0). The name filter does not apply: the port path
// selects the device.

use super::{DeviceFilter, DeviceHandle, Transport, TransportEvent, READ_BUFFER_SIZE};
use crate::error::{LoggerError, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub struct SerialTransport {
    port: String,
    baud_rate: u32,
    stream: Option<SerialStream>,
    is_connected: bool,
}

impl SerialTransport {
    pub fn new(port: String, baud_rate: u32) -> Self {
        Self {
            port,
            baud_rate,
            stream: None,
            is_connected: false,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self, _filter: &DeviceFilter) -> Result<DeviceHandle> {
        log::info!(
            "Opening serial port: {} at {} baud",
            self.port,
            self.baud_rate
        );

        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .open_native_async()
            .map_err(|e| LoggerError::Connection(format!("Failed to open {}: {}", self.port, e)))?;

        self.stream = Some(stream);
        self.is_connected = true;
        log::info!("Serial port opened successfully");

        Ok(DeviceHandle {
            name: self.port.clone(),
            address: format!("{}@{}", self.port, self.baud_rate),
        })
    }

    async fn start(&mut self, sender: mpsc::Sender<TransportEvent>) -> Result<()> {
        let mut stream = self.stream.take().ok_or(LoggerError::NotConnected)?;
        let mut buf = [0u8; READ_BUFFER_SIZE];

        log::info!("Serial stream started on {}", self.port);

        let reason = loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    log::warn!("Serial port closed");
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
                    log::error!("Serial read error: {}", e);
                    break Some(format!("Read failed: {}", e));
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
        log::info!("Closing serial port {}", self.port);
        self.stream = None;
        self.is_connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.is_connected
    }
}
