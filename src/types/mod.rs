//! Data types for decoded readings and device information.

pub mod device;
pub mod measurement;

pub use device::{BloodPressureFeature, DeviceInformation};
pub use measurement::{DeviceTimestamp, Measurement, MeasurementStatus, PressureUnit};
