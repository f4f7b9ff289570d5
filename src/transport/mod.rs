//! Transport layer for BLE communication.
//!
//! This module defines the boundary the session drives. The production
//! implementation is [`BleTransport`] on top of the platform Bluetooth
//! stack; tests script an in-memory mock against the same trait.

pub mod ble;
#[cfg(test)]
pub mod mock;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Identity of a discovered peripheral. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Opaque stable identifier (MAC address or platform device id).
    pub address: String,
    /// Advertised name, if the peripheral broadcast one.
    pub name: Option<String>,
    /// Signal strength hint at discovery time, in dBm.
    pub rssi: Option<i16>,
}

impl DeviceHandle {
    /// Handle for a device known only by address (discovery skipped).
    #[must_use]
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: None,
        }
    }
}

/// A resolved characteristic and its capability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicRef {
    /// 128-bit characteristic identifier.
    pub uuid: Uuid,
    /// Supports reads.
    pub readable: bool,
    /// Supports write-with-response.
    pub writable: bool,
    /// Supports notifications.
    pub notifiable: bool,
}

/// An unsolicited characteristic value push.
///
/// Transient: pushed into the session's channel in arrival order and
/// consumed immediately by the decoder.
#[derive(Debug, Clone)]
pub struct RawNotification {
    /// Source characteristic.
    pub uuid: Uuid,
    /// Raw payload bytes.
    pub value: Vec<u8>,
}

/// Trait for transport implementations.
///
/// One live connection per transport instance; `connect` on an already
/// connected peripheral is a success (idempotent reconnection).
pub trait Transport: Send + Sync {
    /// Runs one discovery pass, returning every peripheral seen within
    /// `timeout`.
    fn discover(
        &mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeviceHandle>>> + Send + '_>>;

    /// Connects to the device.
    fn connect(
        &mut self,
        device: DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Disconnects from the device.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Resolves the service catalog to a characteristic map.
    fn resolve_services(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<HashMap<Uuid, CharacteristicRef>>> + Send + '_>>;

    /// Reads a characteristic value.
    fn read(
        &mut self,
        characteristic: CharacteristicRef,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>>;

    /// Writes to a characteristic, optionally requiring a response.
    fn write(
        &mut self,
        characteristic: CharacteristicRef,
        data: Bytes,
        with_response: bool,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Subscribes to notifications, pushing them into `notify_tx`.
    ///
    /// The implementation must close the channel (drop its sender) when
    /// the peripheral's notification stream ends, so the session can
    /// observe connection loss.
    fn subscribe(
        &mut self,
        characteristic: CharacteristicRef,
        notify_tx: mpsc::Sender<RawNotification>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stops notifications for the characteristic.
    fn unsubscribe(
        &mut self,
        characteristic: CharacteristicRef,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

pub use ble::BleTransport;
