// Bluetooth LE transport
//
// Connects to the device over the Nordic UART service: scan for a name
// starting with the filter's prefix, check that the connected device exposes
// the UART service, then subscribe to notifications on its TX characteristic.
// Every notification payload is forwarded as one chunk.

use super::{DeviceFilter, DeviceHandle, Transport, TransportEvent};
use crate::error::{LoggerError, Result};
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How often the adapter's device list is checked while scanning.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BleTransport {
    scan_timeout: Duration,
    adapter: Option<Adapter>,
    peripheral: Option<Peripheral>,
    tx: Option<Characteristic>,
    is_connected: bool,
}

impl BleTransport {
    pub fn new(scan_timeout: Duration) -> Self {
        Self {
            scan_timeout,
            adapter: None,
            peripheral: None,
            tx: None,
            is_connected: false,
        }
    }

    fn reset(&mut self) {
        self.adapter = None;
        self.peripheral = None;
        self.tx = None;
        self.is_connected = false;
    }
}

fn ble_error(context: &str, e: btleplug::Error) -> LoggerError {
    LoggerError::Connection(format!("{}: {}", context, e))
}

fn name_matches(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

/// Pick the notifying TX characteristic of the UART service.
fn select_tx_characteristic(
    characteristics: impl IntoIterator<Item = Characteristic>,
    filter: &DeviceFilter,
) -> Result<Characteristic> {
    let in_service: Vec<Characteristic> = characteristics
        .into_iter()
        .filter(|c| c.service_uuid == filter.service)
        .collect();

    if in_service.is_empty() {
        return Err(LoggerError::Connection(format!(
            "Device does not expose the UART service {}",
            filter.service
        )));
    }

    in_service
        .into_iter()
        .find(|c| {
            c.uuid == filter.characteristic
                && c.properties
                    .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
        })
        .ok_or_else(|| {
            LoggerError::Connection(format!(
                "UART service has no notifying characteristic {}",
                filter.characteristic
            ))
        })
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|e| ble_error("Bluetooth is unavailable", e))?;
    manager
        .adapters()
        .await
        .map_err(|e| ble_error("Listing Bluetooth adapters failed", e))?
        .into_iter()
        .next()
        .ok_or_else(|| LoggerError::Connection("No Bluetooth adapter found".to_string()))
}

/// Poll the adapter until a device with a matching name shows up.
async fn find_device(
    adapter: &Adapter,
    prefix: &str,
    timeout: Duration,
) -> Result<Option<(Peripheral, String)>> {
    let deadline = Instant::now() + timeout;

    let found = 'scan: loop {
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| ble_error("Listing devices failed", e))?;

        for peripheral in peripherals {
            let name = match peripheral.properties().await {
                Ok(Some(properties)) => properties.local_name,
                _ => None,
            };
            if let Some(name) = name {
                if name_matches(&name, prefix) {
                    break 'scan Some((peripheral, name));
                }
            }
        }

        if Instant::now() >= deadline {
            break None;
        }
        tokio::time::sleep(SCAN_POLL_INTERVAL).await;
    };

    Ok(found)
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self, filter: &DeviceFilter) -> Result<DeviceHandle> {
        let adapter = first_adapter().await?;

        log::info!(
            "Scanning for '{}' devices ({} ms)",
            filter.name_prefix,
            self.scan_timeout.as_millis()
        );
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| ble_error("Starting scan failed", e))?;
        let found = find_device(&adapter, &filter.name_prefix, self.scan_timeout).await;
        if let Err(e) = adapter.stop_scan().await {
            log::debug!("Stopping scan failed: {}", e);
        }

        let (peripheral, name) = found?.ok_or_else(|| {
            LoggerError::Connection(format!(
                "No device named '{}*' found",
                filter.name_prefix
            ))
        })?;
        let address = peripheral.address().to_string();
        log::info!("Connecting to {} ({})", name, address);

        peripheral
            .connect()
            .await
            .map_err(|e| ble_error("Device rejected the connection", e))?;

        let tx = match peripheral.discover_services().await {
            Ok(()) => select_tx_characteristic(peripheral.characteristics(), filter),
            Err(e) => Err(ble_error("Service discovery failed", e)),
        };
        let tx = match tx {
            Ok(tx) => tx,
            Err(e) => {
                peripheral.disconnect().await.ok();
                return Err(e);
            }
        };

        self.adapter = Some(adapter);
        self.peripheral = Some(peripheral);
        self.tx = Some(tx);
        self.is_connected = true;
        log::info!("BLE connected to {}", name);

        Ok(DeviceHandle { name, address })
    }

    async fn start(&mut self, sender: mpsc::Sender<TransportEvent>) -> Result<()> {
        let (adapter, peripheral, tx) = match (&self.adapter, &self.peripheral, &self.tx) {
            (Some(adapter), Some(peripheral), Some(tx)) => {
                (adapter.clone(), peripheral.clone(), tx.clone())
            }
            _ => return Err(LoggerError::NotConnected),
        };

        let mut adapter_events = adapter
            .events()
            .await
            .map_err(|e| ble_error("Watching adapter events failed", e))?;
        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| ble_error("Opening notification stream failed", e))?;
        peripheral
            .subscribe(&tx)
            .await
            .map_err(|e| ble_error("Subscribing to UART notifications failed", e))?;

        let id = peripheral.id();
        let reason = loop {
            tokio::select! {
                notification = notifications.next() => match notification {
                    Some(notification) if notification.uuid == tx.uuid => {
                        if sender
                            .send(TransportEvent::Chunk(notification.value))
                            .await
                            .is_err()
                        {
                            log::warn!("Transport receiver closed");
                            return Ok(());
                        }
                    }
                    Some(_) => {}
                    None => {
                        log::info!("Notification stream ended");
                        break None;
                    }
                },
                event = adapter_events.next() => match event {
                    Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                        log::info!("Device disconnected");
                        break None;
                    }
                    Some(_) => {}
                    None => break Some("adapter event stream closed".to_string()),
                },
            }
        };

        self.reset();
        sender
            .send(TransportEvent::Disconnected { reason })
            .await
            .ok();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let result = match (&self.peripheral, &self.tx) {
            (Some(peripheral), Some(tx)) => {
                log::info!("Closing BLE connection");
                peripheral.unsubscribe(tx).await.ok();
                peripheral
                    .disconnect()
                    .await
                    .map_err(|e| ble_error("Disconnect failed", e))
            }
            _ => Ok(()),
        };
        self.reset();
        result
    }

    fn is_connected(&self) -> bool {
        self.is_connected
    }
}
