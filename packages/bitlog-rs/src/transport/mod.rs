// Pluggable byte transports
//
// A transport delivers the peripheral's UART output as raw chunks. Chunk
// boundaries are arbitrary; reassembly happens downstream. New transports are
// added by:
// 1. Implementing the Transport trait
// 2. Adding a variant to TransportConfig
// 3. Registering it in create_transport
//
// Current implementations:
// - BLE: Nordic UART notifications (requires the `ble` feature)
// - Serial: USB serial console of the device (unix only)
// - TCP: raw byte stream from a radio bridge
// - File: replay of a captured stream in fixed-size chunks
//
// Only BLE uses the DeviceFilter. The other transports are point-to-point
// links with nothing to scan for.

mod file;
mod tcp;

#[cfg(feature = "ble")]
mod ble;

#[cfg(target_family = "unix")]
mod serial;

use crate::error::{LoggerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
#[cfg(feature = "ble")]
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use file::FileTransport;
pub use tcp::TcpTransport;

#[cfg(feature = "ble")]
pub use ble::BleTransport;

#[cfg(target_family = "unix")]
pub use serial::SerialTransport;

/// Nordic UART service exposed by the peripheral.
pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Characteristic the peripheral notifies its UART output on.
pub const UART_TX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

pub const DEFAULT_NAME_PREFIX: &str = "BBC micro:bit";

/// How long a BLE scan waits for a matching device by default.
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 10_000;

/// Whether this build can connect over Bluetooth LE.
pub const BLE_AVAILABLE: bool = cfg!(feature = "ble");

/// Size of a single read from stream transports.
pub(crate) const READ_BUFFER_SIZE: usize = 256;

/// Which device to connect to and which channel carries the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub name_prefix: String,
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            service: UART_SERVICE_UUID,
            characteristic: UART_TX_CHARACTERISTIC_UUID,
        }
    }
}

/// A connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub name: String,
    pub address: String,
}

/// What a transport reports while streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Chunk(Vec<u8>),
    Disconnected { reason: Option<String> },
}

/// Configuration for the available transports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    /// Bluetooth LE Nordic UART, device chosen by the DeviceFilter
    #[serde(rename = "ble")]
    Ble {
        #[serde(default = "default_scan_timeout_ms")]
        scan_timeout_ms: u64,
    },

    /// Serial port (e.g. /dev/ttyACM0)
    #[serde(rename = "serial")]
    Serial { port: String, baud_rate: u32 },

    /// TCP stream, `host:port`
    #[serde(rename = "tcp")]
    Tcp { address: String },

    /// Captured stream replayed from a file
    #[serde(rename = "file")]
    File {
        path: PathBuf,
        chunk_size: usize,
        /// Delay between chunks in milliseconds
        #[serde(default)]
        rate_limit_ms: Option<u64>,
    },
}

fn default_scan_timeout_ms() -> u64 {
    DEFAULT_SCAN_TIMEOUT_MS
}

/// Trait for all transports
///
/// `connect` and `start` are the only suspending operations. Once started,
/// a transport sends chunks in arrival order and finishes with a single
/// `Disconnected` event when the peer goes away.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to a device matching `filter`
    async fn connect(&mut self, filter: &DeviceFilter) -> Result<DeviceHandle>;

    /// Stream events to `sender` until the peer disconnects or the receiver closes
    async fn start(&mut self, sender: mpsc::Sender<TransportEvent>) -> Result<()>;

    /// Close the connection
    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Create a transport from configuration.
///
/// Fails with a connection error when the host cannot provide the serial
/// transport, and with `Unsupported` when BLE support is not compiled in.
pub fn create_transport(config: TransportConfig) -> Result<Box<dyn Transport>> {
    match config {
        TransportConfig::Ble { scan_timeout_ms: 0 } => Err(LoggerError::InvalidConfig(
            "scan_timeout_ms must be at least 1".to_string(),
        )),

        #[cfg(feature = "ble")]
        TransportConfig::Ble { scan_timeout_ms } => Ok(Box::new(BleTransport::new(
            Duration::from_millis(scan_timeout_ms),
        ))),

        #[cfg(not(feature = "ble"))]
        TransportConfig::Ble { .. } => Err(LoggerError::Unsupported(
            "Bluetooth LE support is not compiled in (build with the `ble` feature)".to_string(),
        )),

        #[cfg(target_family = "unix")]
        TransportConfig::Serial { port, baud_rate } => {
            Ok(Box::new(SerialTransport::new(port, baud_rate)))
        }

        #[cfg(not(target_family = "unix"))]
        TransportConfig::Serial { .. } => Err(LoggerError::Connection(
            "Serial transport is not available on this host".to_string(),
        )),

        TransportConfig::Tcp { address } => Ok(Box::new(TcpTransport::new(address))),

        TransportConfig::File {
            path,
            chunk_size,
            rate_limit_ms,
        } => {
            if chunk_size == 0 {
                return Err(LoggerError::InvalidConfig(
                    "chunk_size must be at least 1".to_string(),
                ));
            }
            Ok(Box::new(FileTransport::new(path, chunk_size, rate_limit_ms)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants() {
        assert_eq!(
            UART_SERVICE_UUID.to_string(),
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(
            UART_TX_CHARACTERISTIC_UUID.to_string(),
            "6e400002-b5a3-f393-e0a9-e50e24dcca9e"
        );
    }

    #[test]
    fn test_config_serde() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"type":"file","path":"capture.txt","chunk_size":20}"#)
                .unwrap();
        match config {
            TransportConfig::File {
                chunk_size,
                rate_limit_ms,
                ..
            } => {
                assert_eq!(chunk_size, 20);
                assert_eq!(rate_limit_ms, None);
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_ble_config_serde() {
        let config: TransportConfig = serde_json::from_str(r#"{"type":"ble"}"#).unwrap();
        match config {
            TransportConfig::Ble { scan_timeout_ms } => {
                assert_eq!(scan_timeout_ms, DEFAULT_SCAN_TIMEOUT_MS)
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_zero_scan_timeout_rejected() {
        let result = create_transport(TransportConfig::Ble { scan_timeout_ms: 0 });
        assert!(matches!(result, Err(LoggerError::InvalidConfig(_))));
    }

    #[cfg(feature = "ble")]
    #[test]
    fn test_ble_transport_created() {
        let transport = create_transport(TransportConfig::Ble {
            scan_timeout_ms: 500,
        })
        .unwrap();
        assert!(!transport.is_connected());
    }

    #[cfg(not(feature = "ble"))]
    #[test]
    fn test_ble_not_compiled_in() {
        let result = create_transport(TransportConfig::Ble {
            scan_timeout_ms: 500,
        });
        assert!(matches!(result, Err(LoggerError::Unsupported(_))));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = create_transport(TransportConfig::File {
            path: PathBuf::from("capture.txt"),
            chunk_size: 0,
            rate_limit_ms: None,
        });
        assert!(matches!(result, Err(LoggerError::InvalidConfig(_))));
    }
}
