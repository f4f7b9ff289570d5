//! BLE transport on top of the platform Bluetooth stack.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{CharacteristicRef, DeviceHandle, RawNotification, Transport};

/// Extra scan window used when connecting by address to a peripheral the
/// adapter has not observed yet (platform stacks cannot dial an unseen
/// address).
const CONNECT_SCAN_WINDOW: Duration = Duration::from_secs(2);

/// Transport backed by the first available Bluetooth adapter.
pub struct BleTransport {
    adapter: Adapter,
    peripheral: Option<Peripheral>,
    characteristics: HashMap<Uuid, Characteristic>,
    forward_task: Option<JoinHandle<()>>,
}

impl BleTransport {
    /// Creates a transport on the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAdapter`] if the host has no Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoAdapter)?;

        Ok(Self {
            adapter,
            peripheral: None,
            characteristics: HashMap::new(),
            forward_task: None,
        })
    }

    /// Creates a transport on a specific adapter.
    #[must_use]
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            peripheral: None,
            characteristics: HashMap::new(),
            forward_task: None,
        }
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string() == address {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    fn connected_peripheral(&self) -> Result<&Peripheral> {
        self.peripheral.as_ref().ok_or(Error::NotConnected)
    }

    fn native_characteristic(&self, characteristic: &CharacteristicRef) -> Result<&Characteristic> {
        self.characteristics
            .get(&characteristic.uuid)
            .ok_or(Error::CharacteristicNotFound(characteristic.uuid))
    }

    fn abort_forwarding(&mut self) {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
    }
}

/// Pushes notifications from the peripheral's stream into the session's
/// channel until either side goes away.
///
/// Dropping the sender on stream end is what lets the session observe a
/// transport-level disconnect.
async fn forward_notifications(
    mut stream: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
    notify_tx: mpsc::Sender<RawNotification>,
) {
    while let Some(notification) = stream.next().await {
        tracing::trace!(
            "notification from {}: {} bytes",
            notification.uuid,
            notification.value.len()
        );
        let raw = RawNotification {
            uuid: notification.uuid,
            value: notification.value,
        };
        if notify_tx.send(raw).await.is_err() {
            tracing::debug!("notification receiver dropped");
            return;
        }
    }
    tracing::debug!("notification stream ended");
}

impl Transport for BleTransport {
    fn discover(
        &mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeviceHandle>>> + Send + '_>> {
        Box::pin(async move {
            tracing::debug!("scanning for {}ms", timeout.as_millis());
            self.adapter.start_scan(ScanFilter::default()).await?;
            tokio::time::sleep(timeout).await;
            self.adapter.stop_scan().await?;

            let mut handles = Vec::new();
            for peripheral in self.adapter.peripherals().await? {
                let properties = peripheral.properties().await.ok().flatten();
                handles.push(DeviceHandle {
                    address: peripheral.address().to_string(),
                    name: properties.as_ref().and_then(|p| p.local_name.clone()),
                    rssi: properties.as_ref().and_then(|p| p.rssi),
                });
            }
            tracing::debug!("discovered {} peripheral(s)", handles.len());
            Ok(handles)
        })
    }

    fn connect(
        &mut self,
        device: DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut peripheral = self.find_peripheral(&device.address).await?;

            // An address-only target may never have been scanned for; give
            // the adapter one chance to observe it.
            if peripheral.is_none() {
                tracing::debug!("peripheral {} unknown, scanning", device.address);
                self.adapter.start_scan(ScanFilter::default()).await?;
                tokio::time::sleep(CONNECT_SCAN_WINDOW).await;
                self.adapter.stop_scan().await?;
                peripheral = self.find_peripheral(&device.address).await?;
            }

            let peripheral = peripheral.ok_or(Error::Ble(btleplug::Error::DeviceNotFound))?;

            if peripheral.is_connected().await? {
                tracing::debug!("peripheral {} already connected", device.address);
            } else {
                peripheral.connect().await?;
                tracing::info!("connected to {}", device.address);
            }

            self.peripheral = Some(peripheral);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.abort_forwarding();
            self.characteristics.clear();

            if let Some(peripheral) = self.peripheral.take() {
                peripheral.disconnect().await?;
                tracing::info!("disconnected");
            }
            Ok(())
        })
    }

    fn resolve_services(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<Uuid, CharacteristicRef>>> + Send + '_>> {
        Box::pin(async move {
            let peripheral = self.connected_peripheral()?.clone();
            peripheral.discover_services().await?;

            self.characteristics.clear();
            let mut catalog = HashMap::new();
            for characteristic in peripheral.characteristics() {
                let entry = CharacteristicRef {
                    uuid: characteristic.uuid,
                    readable: characteristic.properties.contains(CharPropFlags::READ),
                    writable: characteristic.properties.contains(CharPropFlags::WRITE),
                    notifiable: characteristic.properties.contains(CharPropFlags::NOTIFY),
                };
                catalog.insert(characteristic.uuid, entry);
                self.characteristics
                    .insert(characteristic.uuid, characteristic);
            }
            tracing::debug!("resolved {} characteristic(s)", catalog.len());
            Ok(catalog)
        })
    }

    fn read(
        &mut self,
        characteristic: CharacteristicRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let peripheral = self.connected_peripheral()?;
            let native = self.native_characteristic(&characteristic)?;
            Ok(peripheral.read(native).await?)
        })
    }

    fn write(
        &mut self,
        characteristic: CharacteristicRef,
        data: Bytes,
        with_response: bool,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let peripheral = self.connected_peripheral()?;
            let native = self.native_characteristic(&characteristic)?;
            let write_type = if with_response {
                WriteType::WithResponse
            } else {
                WriteType::WithoutResponse
            };
            tracing::trace!("writing {} bytes to {}", data.len(), characteristic.uuid);
            peripheral.write(native, &data, write_type).await?;
            Ok(())
        })
    }

    fn subscribe(
        &mut self,
        characteristic: CharacteristicRef,
        notify_tx: mpsc::Sender<RawNotification>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let peripheral = self.connected_peripheral()?;
            let native = self.native_characteristic(&characteristic)?;

            let stream = peripheral.notifications().await?;
            peripheral.subscribe(native).await?;
            tracing::info!("subscribed to {}", characteristic.uuid);

            self.abort_forwarding();
            self.forward_task = Some(tokio::spawn(forward_notifications(stream, notify_tx)));
            Ok(())
        })
    }

    fn unsubscribe(
        &mut self,
        characteristic: CharacteristicRef,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let peripheral = self.connected_peripheral()?;
            let native = self.native_characteristic(&characteristic)?;
            peripheral.unsubscribe(native).await?;
            tracing::info!("unsubscribed from {}", characteristic.uuid);

            // Anything already queued in the session's channel still gets
            // decoded; closing the forwarder just stops new deliveries.
            self.abort_forwarding();
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.peripheral.is_some()
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.abort_forwarding();
    }
}
