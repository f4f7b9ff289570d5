//! Protocol definitions for the Blood Pressure Profile.
//!
//! This module contains the low-level protocol pieces:
//! - IEEE-11073 SFLOAT decoding
//! - Measurement and feature payload parsing
//! - Fixed GATT identifiers

pub mod parser;
pub mod sfloat;
pub mod uuids;

pub use parser::{MIN_MEASUREMENT_LEN, decode_measurement, parse_feature};
pub use sfloat::{SFloat, SpecialValue};
