//! Error types for the qardio library.

use thiserror::Error;
use uuid::Uuid;

use crate::protocol::sfloat::SpecialValue;

/// The main error type for qardio operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bluetooth stack error.
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    /// No Bluetooth adapter is available on this host.
    #[error("no bluetooth adapter available")]
    NoAdapter,

    /// Measurement decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// No matching device was advertised within the retry budget.
    #[error("device not discovered after {attempts} attempt(s)")]
    DiscoveryTimeout { attempts: u32 },

    /// Connecting to the device failed after all retries.
    #[error("connection failed after {attempts} attempt(s): {source}")]
    ConnectionFailure {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The device dropped the connection while the session was active.
    #[error("connection lost")]
    ConnectionLost,

    /// A required characteristic is missing from the service catalog.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// Subscribing to measurement notifications failed after all retries.
    #[error("subscription failed after {attempts} attempt(s): {source}")]
    SubscriptionFailure {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Writing the vendor activation payload failed after all retries.
    #[error("activation failed after {attempts} attempt(s): {source}")]
    ActivationFailure {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// The session already ran; construct a new one to retry.
    #[error("session already started")]
    AlreadyStarted,

    /// Invalid activation payload configuration.
    #[error("invalid activation payload: {reason}")]
    InvalidActivationPayload { reason: String },
}

/// Measurement decoding errors.
///
/// These never affect session state: a malformed notification is reported
/// and the session keeps monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload shorter than the mandatory flags + three SFLOAT fields.
    #[error("measurement too short: need at least 7 bytes, got {0}")]
    TooShort(usize),

    /// A flag claimed a field present but the bytes ran out.
    #[error("truncated measurement: {field} needs {needed} byte(s), {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// Timestamp bytes do not form a valid calendar date-time.
    #[error(
        "invalid timestamp: {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
    )]
    InvalidTimestamp {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },

    /// A numeric value was requested from a reserved SFLOAT sentinel.
    #[error("special SFLOAT value: {0}")]
    SpecialValue(SpecialValue),
}

/// Result type alias for qardio operations.
pub type Result<T> = std::result::Result<T, Error>;
