//! # qardio
//!
//! A Rust client library for QardioARM 2 blood pressure monitors over
//! Bluetooth LE.
//!
//! The cuff speaks the standard Bluetooth Blood Pressure Profile plus one
//! vendor quirk: a proprietary characteristic must be written to start a
//! measurement cycle. This library drives the whole session (discovery,
//! connection, activation, monitoring, teardown) and decodes measurement
//! notifications into exact-decimal readings.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Bounded-retry session state machine with per-failure reasons
//! - IEEE-11073 SFLOAT decoding with exact decimal values and tagged
//!   sentinel handling
//! - Append-only measurement log shared with reporting code
//! - Event stream for state changes and decoded readings
//!
//! ## Quick Start
//!
//! ```no_run
//! use qardio::{MonitorConfig, Session, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qardio::Error> {
//!     let mut session = Session::ble(MonitorConfig::qardio_arm2()).await?;
//!     let mut events = session.subscribe();
//!
//!     // Discover, connect, subscribe and trigger a measurement cycle.
//!     session.start().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let SessionEvent::Measurement(reading) = event {
//!             println!(
//!                 "{}/{} {}",
//!                 reading.systolic, reading.diastolic, reading.unit
//!             );
//!             break;
//!         }
//!     }
//!
//!     session.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - SFLOAT and measurement payload decoding, fixed UUIDs
//! - [`types`] - Decoded readings and device information
//! - [`transport`] - The BLE boundary ([`transport::Transport`]) and its
//!   btleplug implementation
//! - [`retry`] - Bounded-attempt retry policies
//! - [`session`] - The connection session state machine
//! - [`event`] - Session event stream
//! - [`record`] - Append-only measurement log

pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
pub mod record;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use config::{MonitorConfig, ProfileUuids, SessionMode, Target};
pub use error::{DecodeError, Error, Result};
pub use event::{SessionEvent, Subscription};
pub use protocol::{SFloat, SpecialValue, decode_measurement, parse_feature};
pub use record::MeasurementLog;
pub use retry::{Backoff, RetryPolicy};
pub use session::{Session, SessionState};
pub use transport::{BleTransport, CharacteristicRef, DeviceHandle, RawNotification, Transport};
pub use types::{
    BloodPressureFeature, DeviceInformation, DeviceTimestamp, Measurement, MeasurementStatus,
    PressureUnit,
};
