//! Session configuration.
//!
//! Everything the original scripts kept as module-level globals (device
//! name, UUIDs, activation bytes, retry counts) lives in one immutable
//! struct handed to the session. There is no process-wide mutable state.

use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::Error;
use crate::protocol::uuids;
use crate::retry::RetryPolicy;

/// Default single-pass discovery scan window.
pub const DEFAULT_DISCOVER_TIMEOUT: Duration = Duration::from_secs(10);

/// How the target device is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Match the advertised name exactly (case-sensitive).
    Name(String),
    /// Connect straight to a known address, skipping discovery.
    Address(String),
}

/// What the session does once activation succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// Stay active and collect measurement notifications.
    #[default]
    Monitor,
    /// Tear down immediately after a successful activation write.
    ActivateOnly,
}

/// The characteristic identifiers a session resolves.
///
/// Defaults target the QardioARM 2; a different cuff with a different
/// vendor characteristic overrides per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUuids {
    /// Measurement characteristic to subscribe to.
    pub measurement: Uuid,
    /// Feature characteristic (optional, read).
    pub feature: Uuid,
    /// Vendor activation characteristic (write-with-response).
    pub activation: Uuid,
    /// Battery level characteristic (optional, read).
    pub battery_level: Uuid,
}

impl Default for ProfileUuids {
    fn default() -> Self {
        Self {
            measurement: uuids::BLOOD_PRESSURE_MEASUREMENT,
            feature: uuids::BLOOD_PRESSURE_FEATURE,
            activation: uuids::VENDOR_ACTIVATION,
            battery_level: uuids::BATTERY_LEVEL,
        }
    }
}

/// Immutable configuration for one session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Device to find and connect to.
    pub target: Target,
    /// Retry policy shared by every fallible operation.
    pub retry: RetryPolicy,
    /// Scan window per discovery attempt.
    pub discover_timeout: Duration,
    /// Opaque vendor payload written to start a measurement cycle.
    pub activation_payload: Bytes,
    /// Characteristic identifiers to resolve.
    pub uuids: ProfileUuids,
    /// Monitor or activate-and-leave.
    pub mode: SessionMode,
    /// Read device information and battery level after resolution.
    pub read_device_info: bool,
}

impl MonitorConfig {
    /// Creates a configuration for the given target with QardioARM 2
    /// defaults.
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self {
            target,
            retry: RetryPolicy::default(),
            discover_timeout: DEFAULT_DISCOVER_TIMEOUT,
            activation_payload: Bytes::from_static(&uuids::QARDIO_ACTIVATION_PAYLOAD),
            uuids: ProfileUuids::default(),
            mode: SessionMode::default(),
            read_device_info: true,
        }
    }

    /// Configuration targeting a QardioARM 2 by its advertised name.
    #[must_use]
    pub fn qardio_arm2() -> Self {
        Self::new(Target::Name(uuids::QARDIO_ARM2_NAME.to_string()))
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt discovery scan window.
    #[must_use]
    pub const fn discover_timeout(mut self, timeout: Duration) -> Self {
        self.discover_timeout = timeout;
        self
    }

    /// Sets the session mode.
    #[must_use]
    pub const fn mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Overrides the characteristic identifiers.
    #[must_use]
    pub fn uuids(mut self, uuids: ProfileUuids) -> Self {
        self.uuids = uuids;
        self
    }

    /// Sets the activation payload from raw bytes.
    #[must_use]
    pub fn activation_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.activation_payload = payload.into();
        self
    }

    /// Sets the activation payload from a hex string, e.g. `"f101"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidActivationPayload`] for non-hex input or an
    /// empty payload.
    pub fn activation_payload_hex(mut self, hex_payload: &str) -> Result<Self, Error> {
        let payload = hex::decode(hex_payload).map_err(|e| Error::InvalidActivationPayload {
            reason: e.to_string(),
        })?;
        if payload.is_empty() {
            return Err(Error::InvalidActivationPayload {
                reason: "payload is empty".into(),
            });
        }
        self.activation_payload = Bytes::from(payload);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qardio_defaults() {
        let config = MonitorConfig::qardio_arm2();
        assert_eq!(config.target, Target::Name("QardioARM 2".to_string()));
        assert_eq!(config.activation_payload.as_ref(), &[0xF1, 0x01]);
        assert_eq!(config.uuids.activation, uuids::VENDOR_ACTIVATION);
        assert_eq!(config.mode, SessionMode::Monitor);
    }

    #[test]
    fn test_activation_payload_hex() {
        let config = MonitorConfig::qardio_arm2()
            .activation_payload_hex("f101")
            .unwrap();
        assert_eq!(config.activation_payload.as_ref(), &[0xF1, 0x01]);

        assert!(
            MonitorConfig::qardio_arm2()
                .activation_payload_hex("zz")
                .is_err()
        );
        assert!(
            MonitorConfig::qardio_arm2()
                .activation_payload_hex("")
                .is_err()
        );
    }

    #[test]
    fn test_builder_overrides() {
        let config = MonitorConfig::new(Target::Address("AA:BB:CC:DD:EE:FF".into()))
            .discover_timeout(Duration::from_secs(3))
            .mode(SessionMode::ActivateOnly);
        assert_eq!(config.discover_timeout, Duration::from_secs(3));
        assert_eq!(config.mode, SessionMode::ActivateOnly);
    }
}
