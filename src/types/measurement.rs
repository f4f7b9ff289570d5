//! Decoded blood pressure measurement types.

use std::fmt;

use crate::error::DecodeError;
use crate::protocol::sfloat::SFloat;

/// Pressure unit selected by flag bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureUnit {
    /// Millimetres of mercury.
    MmHg,
    /// Kilopascals.
    KPa,
}

impl PressureUnit {
    /// Maps flag bit 0 to the unit.
    #[must_use]
    pub const fn from_flag(kpa: bool) -> Self {
        if kpa { Self::KPa } else { Self::MmHg }
    }
}

impl fmt::Display for PressureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MmHg => "mmHg",
            Self::KPa => "kPa",
        })
    }
}

/// Calendar date-time reported by the device alongside a measurement.
///
/// Construction validates the calendar, so an invalid wire timestamp
/// becomes [`DecodeError::InvalidTimestamp`] instead of a bogus date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTimestamp {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl DeviceTimestamp {
    /// Creates a validated timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidTimestamp`] if any component is out of
    /// calendar range (year 1582-9999 per the GATT Date Time definition).
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, DecodeError> {
        let valid = (1582..=9999).contains(&year)
            && (1..=12).contains(&month)
            && (1..=days_in_month(year, month)).contains(&day)
            && hour <= 23
            && minute <= 59
            && second <= 59;

        if valid {
            Ok(Self {
                year,
                month,
                day,
                hour,
                minute,
                second,
            })
        } else {
            Err(DecodeError::InvalidTimestamp {
                year,
                month,
                day,
                hour,
                minute,
                second,
            })
        }
    }

    /// Year (1582-9999).
    #[must_use]
    pub const fn year(self) -> u16 {
        self.year
    }

    /// Month (1-12).
    #[must_use]
    pub const fn month(self) -> u8 {
        self.month
    }

    /// Day of month (1-31).
    #[must_use]
    pub const fn day(self) -> u8 {
        self.day
    }

    /// Hour (0-23).
    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute (0-59).
    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Second (0-59).
    #[must_use]
    pub const fn second(self) -> u8 {
        self.second
    }
}

impl fmt::Display for DeviceTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Measurement status bitfield (flag bit 4).
///
/// Retained opaque; the accessors surface the profile-defined bits for
/// display without validating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementStatus(u16);

impl MeasurementStatus {
    /// Wraps the raw little-endian bitfield.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bitfield.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Body movement during measurement.
    #[must_use]
    pub const fn body_movement_detected(self) -> bool {
        self.0 & 0x0001 != 0
    }

    /// Cuff fit too loose.
    #[must_use]
    pub const fn cuff_fit_loose(self) -> bool {
        self.0 & 0x0002 != 0
    }

    /// Irregular pulse detected.
    #[must_use]
    pub const fn irregular_pulse_detected(self) -> bool {
        self.0 & 0x0004 != 0
    }

    /// Pulse rate range detection (0 = in range, 1 = exceeds upper limit,
    /// 2 = below lower limit).
    #[must_use]
    pub const fn pulse_rate_range(self) -> u8 {
        ((self.0 >> 3) & 0x0003) as u8
    }

    /// Improper measurement position.
    #[must_use]
    pub const fn improper_position(self) -> bool {
        self.0 & 0x0020 != 0
    }
}

/// A decoded blood pressure reading.
///
/// Optional fields are present exactly when the corresponding flag bit was
/// set and the payload carried the bytes; a flagged field with missing
/// bytes fails decoding instead of being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Systolic pressure.
    pub systolic: SFloat,
    /// Diastolic pressure.
    pub diastolic: SFloat,
    /// Mean arterial pressure.
    pub mean_arterial: SFloat,
    /// Pressure unit for all three values.
    pub unit: PressureUnit,
    /// Raw flags byte, retained for diagnostics.
    pub flags: u8,
    /// Device-reported measurement time.
    pub timestamp: Option<DeviceTimestamp>,
    /// Pulse rate in beats per minute.
    pub pulse_rate: Option<SFloat>,
    /// User slot on multi-user cuffs (0-255).
    pub user_id: Option<u8>,
    /// Measurement status bitfield.
    pub status: Option<MeasurementStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_validation() {
        assert!(DeviceTimestamp::new(2024, 3, 15, 8, 30, 0).is_ok());
        assert!(DeviceTimestamp::new(2024, 2, 29, 0, 0, 0).is_ok());
        assert!(DeviceTimestamp::new(2023, 2, 29, 0, 0, 0).is_err());
        assert!(DeviceTimestamp::new(2024, 0, 1, 0, 0, 0).is_err());
        assert!(DeviceTimestamp::new(2024, 13, 1, 0, 0, 0).is_err());
        assert!(DeviceTimestamp::new(2024, 4, 31, 0, 0, 0).is_err());
        assert!(DeviceTimestamp::new(2024, 1, 1, 24, 0, 0).is_err());
        assert!(DeviceTimestamp::new(2024, 1, 1, 0, 60, 0).is_err());
        assert!(DeviceTimestamp::new(1000, 1, 1, 0, 0, 0).is_err());
    }

    #[test]
    fn test_timestamp_display() {
        let ts = DeviceTimestamp::new(2024, 3, 15, 8, 30, 0).unwrap();
        assert_eq!(ts.to_string(), "2024-03-15 08:30:00");
    }

    #[test]
    fn test_status_bits() {
        let status = MeasurementStatus::from_bits(0b0010_0101);
        assert!(status.body_movement_detected());
        assert!(!status.cuff_fit_loose());
        assert!(status.irregular_pulse_detected());
        assert_eq!(status.pulse_rate_range(), 0);
        assert!(status.improper_position());

        let status = MeasurementStatus::from_bits(0b0000_1000);
        assert_eq!(status.pulse_rate_range(), 1);
    }

    #[test]
    fn test_unit_from_flag() {
        assert_eq!(PressureUnit::from_flag(false), PressureUnit::MmHg);
        assert_eq!(PressureUnit::from_flag(true), PressureUnit::KPa);
        assert_eq!(PressureUnit::MmHg.to_string(), "mmHg");
        assert_eq!(PressureUnit::KPa.to_string(), "kPa");
    }
}
