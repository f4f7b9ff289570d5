//! Fixed GATT identifiers for the blood pressure profile and the Qardio
//! vendor extension.
//!
//! These are configuration constants, never negotiated at runtime. The
//! defaults in [`crate::config::MonitorConfig`] point at them; callers
//! talking to a different cuff can override per session.

use uuid::{Uuid, uuid};

/// Blood Pressure Service.
pub const BLOOD_PRESSURE_SERVICE: Uuid = uuid!("00001810-0000-1000-8000-00805f9b34fb");

/// Blood Pressure Measurement characteristic (notify).
pub const BLOOD_PRESSURE_MEASUREMENT: Uuid = uuid!("00002a35-0000-1000-8000-00805f9b34fb");

/// Blood Pressure Feature characteristic (read).
pub const BLOOD_PRESSURE_FEATURE: Uuid = uuid!("00002a49-0000-1000-8000-00805f9b34fb");

/// Intermediate Cuff Pressure characteristic (notify).
///
/// Same payload layout as the measurement characteristic. The default
/// session does not subscribe to it; override the measurement UUID in the
/// config to watch cuff inflation instead of final readings.
pub const INTERMEDIATE_CUFF_PRESSURE: Uuid = uuid!("00002a36-0000-1000-8000-00805f9b34fb");

/// Qardio vendor characteristic that triggers a measurement cycle when
/// written (write-with-response).
pub const VENDOR_ACTIVATION: Uuid = uuid!("583cb5b3-875d-40ed-9098-c39eb0c1983d");

/// Device Information Service.
pub const DEVICE_INFORMATION_SERVICE: Uuid = uuid!("0000180a-0000-1000-8000-00805f9b34fb");

/// Manufacturer Name String characteristic.
pub const MANUFACTURER_NAME: Uuid = uuid!("00002a29-0000-1000-8000-00805f9b34fb");

/// Model Number String characteristic.
pub const MODEL_NUMBER: Uuid = uuid!("00002a24-0000-1000-8000-00805f9b34fb");

/// Serial Number String characteristic.
pub const SERIAL_NUMBER: Uuid = uuid!("00002a25-0000-1000-8000-00805f9b34fb");

/// Firmware Revision String characteristic.
pub const FIRMWARE_REVISION: Uuid = uuid!("00002a26-0000-1000-8000-00805f9b34fb");

/// Hardware Revision String characteristic.
pub const HARDWARE_REVISION: Uuid = uuid!("00002a27-0000-1000-8000-00805f9b34fb");

/// Software Revision String characteristic.
pub const SOFTWARE_REVISION: Uuid = uuid!("00002a28-0000-1000-8000-00805f9b34fb");

/// Battery Service.
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

/// Battery Level characteristic (read).
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// Advertised name of the QardioARM 2.
pub const QARDIO_ARM2_NAME: &str = "QardioARM 2";

/// Vendor activation payload that starts a measurement cycle.
pub const QARDIO_ACTIVATION_PAYLOAD: [u8; 2] = [0xF1, 0x01];
