//! Binary parsing for Blood Pressure Profile payloads.
//!
//! Decoding is pure: bytes in, [`Measurement`] or [`DecodeError`] out. The
//! session never lets a decode failure affect connection state.

use std::io::Cursor;

use bytes::Buf;

use crate::error::DecodeError;
use crate::protocol::sfloat::SFloat;
use crate::types::{
    BloodPressureFeature, DeviceTimestamp, Measurement, MeasurementStatus, PressureUnit,
};

/// Minimum measurement payload: flags byte plus three SFLOATs.
pub const MIN_MEASUREMENT_LEN: usize = 7;

/// Flag bit 0: unit is kPa instead of mmHg.
const FLAG_UNIT_KPA: u8 = 0x01;
/// Flag bit 1: timestamp field present.
const FLAG_TIMESTAMP: u8 = 0x02;
/// Flag bit 2: pulse rate field present.
const FLAG_PULSE_RATE: u8 = 0x04;
/// Flag bit 3: user id field present.
const FLAG_USER_ID: u8 = 0x08;
/// Flag bit 4: measurement status field present.
const FLAG_STATUS: u8 = 0x10;

/// Fails with [`DecodeError::Truncated`] if fewer than `needed` bytes
/// remain for `field`.
fn require(cursor: &Cursor<&[u8]>, field: &'static str, needed: usize) -> Result<(), DecodeError> {
    let remaining = cursor.remaining();
    if remaining < needed {
        return Err(DecodeError::Truncated {
            field,
            needed,
            remaining,
        });
    }
    Ok(())
}

/// Decodes a Blood Pressure Measurement notification.
///
/// Format:
/// ```text
/// [flags:1] [systolic:2LE] [diastolic:2LE] [mean_arterial:2LE]
/// (flags bit1: [year:2LE] [month:1] [day:1] [hour:1] [minute:1] [second:1])
/// (flags bit2: [pulse_rate:2LE]) (flags bit3: [user_id:1])
/// (flags bit4: [status:2LE])
/// ```
/// All 2-byte pressure and pulse fields are IEEE-11073 SFLOATs. Trailing
/// bytes beyond the last flagged field are ignored for forward
/// compatibility; a flagged field without its bytes is an error.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] for payloads under 7 bytes,
/// [`DecodeError::Truncated`] naming the field whose bytes ran out, or
/// [`DecodeError::InvalidTimestamp`] for a non-calendar date.
pub fn decode_measurement(data: &[u8]) -> Result<Measurement, DecodeError> {
    if data.len() < MIN_MEASUREMENT_LEN {
        return Err(DecodeError::TooShort(data.len()));
    }

    let mut cursor = Cursor::new(data);

    let flags = cursor.get_u8();
    let systolic = SFloat::from_raw(cursor.get_u16_le());
    let diastolic = SFloat::from_raw(cursor.get_u16_le());
    let mean_arterial = SFloat::from_raw(cursor.get_u16_le());
    let unit = PressureUnit::from_flag(flags & FLAG_UNIT_KPA != 0);

    let timestamp = if flags & FLAG_TIMESTAMP != 0 {
        require(&cursor, "timestamp", 7)?;
        let year = cursor.get_u16_le();
        let month = cursor.get_u8();
        let day = cursor.get_u8();
        let hour = cursor.get_u8();
        let minute = cursor.get_u8();
        let second = cursor.get_u8();
        Some(DeviceTimestamp::new(year, month, day, hour, minute, second)?)
    } else {
        None
    };

    let pulse_rate = if flags & FLAG_PULSE_RATE != 0 {
        require(&cursor, "pulse rate", 2)?;
        Some(SFloat::from_raw(cursor.get_u16_le()))
    } else {
        None
    };

    let user_id = if flags & FLAG_USER_ID != 0 {
        require(&cursor, "user id", 1)?;
        Some(cursor.get_u8())
    } else {
        None
    };

    let status = if flags & FLAG_STATUS != 0 {
        require(&cursor, "measurement status", 2)?;
        Some(MeasurementStatus::from_bits(cursor.get_u16_le()))
    } else {
        None
    };

    Ok(Measurement {
        systolic,
        diastolic,
        mean_arterial,
        unit,
        flags,
        timestamp,
        pulse_rate,
        user_id,
        status,
    })
}

/// Parses the Blood Pressure Feature characteristic value.
///
/// Format: `[features:2LE]`, extra bytes tolerated.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] for fewer than 2 bytes.
pub fn parse_feature(data: &[u8]) -> Result<BloodPressureFeature, DecodeError> {
    if data.len() < 2 {
        return Err(DecodeError::Truncated {
            field: "feature bits",
            needed: 2,
            remaining: data.len(),
        });
    }
    Ok(BloodPressureFeature::from_bits(u16::from_le_bytes([
        data[0], data[1],
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sfloat::SpecialValue;

    const BASE: [u8; 7] = [0x00, 0x28, 0x01, 0x50, 0x00, 0x5A, 0x00];

    fn sfloat(mantissa: i16, exponent: i8) -> SFloat {
        SFloat::Value { mantissa, exponent }
    }

    #[test]
    fn test_decode_mandatory_only() {
        let m = decode_measurement(&BASE).unwrap();
        assert_eq!(m.systolic, sfloat(296, 0)); // raw 0x0128
        assert_eq!(m.diastolic, sfloat(80, 0)); // raw 0x0050
        assert_eq!(m.mean_arterial, sfloat(90, 0)); // raw 0x005A
        assert_eq!(m.unit, PressureUnit::MmHg);
        assert_eq!(m.flags, 0x00);
        assert_eq!(m.timestamp, None);
        assert_eq!(m.pulse_rate, None);
        assert_eq!(m.user_id, None);
        assert_eq!(m.status, None);
    }

    #[test]
    fn test_decode_kpa_unit() {
        let mut data = BASE;
        data[0] = 0x01;
        let m = decode_measurement(&data).unwrap();
        assert_eq!(m.unit, PressureUnit::KPa);
        // Unit flag changes nothing else.
        assert_eq!(m.systolic, sfloat(296, 0));
        assert_eq!(m.diastolic, sfloat(80, 0));
        assert_eq!(m.mean_arterial, sfloat(90, 0));
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(decode_measurement(&[]), Err(DecodeError::TooShort(0)));
        assert_eq!(
            decode_measurement(&BASE[..6]),
            Err(DecodeError::TooShort(6))
        );
    }

    #[test]
    fn test_decode_timestamp_and_pulse() {
        // flags 0x06: timestamp + pulse rate, 2024-03-15 08:30:00, 72 bpm
        let mut data = vec![0x06, 0x28, 0x01, 0x50, 0x00, 0x5A, 0x00];
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[3, 15, 8, 30, 0]);
        data.extend_from_slice(&0x0048u16.to_le_bytes());

        let m = decode_measurement(&data).unwrap();
        let ts = m.timestamp.unwrap();
        assert_eq!(ts.to_string(), "2024-03-15 08:30:00");
        assert_eq!(m.pulse_rate, Some(sfloat(72, 0)));
        assert_eq!(m.user_id, None);
        assert_eq!(m.status, None);
    }

    #[test]
    fn test_decode_user_id_and_status() {
        let mut data = vec![0x18, 0x28, 0x01, 0x50, 0x00, 0x5A, 0x00];
        data.push(3); // user id
        data.extend_from_slice(&0x0005u16.to_le_bytes()); // status

        let m = decode_measurement(&data).unwrap();
        assert_eq!(m.user_id, Some(3));
        let status = m.status.unwrap();
        assert!(status.body_movement_detected());
        assert!(status.irregular_pulse_detected());
    }

    #[test]
    fn test_truncated_names_the_field() {
        // Each flagged field, with all earlier fields fully present and the
        // flagged one cut off, names itself in the error.
        let cases: [(u8, &[u8], &str); 4] = [
            (0x02, &[0xE8, 0x07, 3, 15, 8, 30], "timestamp"),
            (0x04, &[0x48], "pulse rate"),
            (0x08, &[], "user id"),
            (0x10, &[0x00], "measurement status"),
        ];

        for (flag, partial, name) in cases {
            let mut data = vec![flag, 0x28, 0x01, 0x50, 0x00, 0x5A, 0x00];
            data.extend_from_slice(partial);
            match decode_measurement(&data) {
                Err(DecodeError::Truncated { field, .. }) => assert_eq!(field, name),
                other => panic!("flags {flag:#04x}: expected Truncated, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_truncated_with_all_flags_set() {
        // flags 0x1E: full timestamp and pulse present, user id missing.
        let mut data = vec![0x1E, 0x28, 0x01, 0x50, 0x00, 0x5A, 0x00];
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[3, 15, 8, 30, 0]);
        data.extend_from_slice(&0x0048u16.to_le_bytes());

        match decode_measurement(&data) {
            Err(DecodeError::Truncated { field, .. }) => assert_eq!(field, "user id"),
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        // Month 13 is not a calendar date.
        let mut data = vec![0x02, 0x28, 0x01, 0x50, 0x00, 0x5A, 0x00];
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[13, 1, 0, 0, 0]);

        assert!(matches!(
            decode_measurement(&data),
            Err(DecodeError::InvalidTimestamp { month: 13, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = BASE.to_vec();
        data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let m = decode_measurement(&data).unwrap();
        assert_eq!(m.systolic, sfloat(296, 0));
    }

    #[test]
    fn test_sentinel_pressure_is_tagged_not_numeric() {
        // Systolic register carries NaN; the measurement still decodes.
        let data = [0x00, 0xFF, 0x07, 0x50, 0x00, 0x5A, 0x00];
        let m = decode_measurement(&data).unwrap();
        assert_eq!(m.systolic, SFloat::Special(SpecialValue::NaN));
        assert_eq!(m.diastolic, sfloat(80, 0));
    }

    #[test]
    fn test_parse_feature() {
        let features = parse_feature(&[0x05, 0x00]).unwrap();
        assert!(features.body_movement_detection());
        assert!(features.irregular_pulse_detection());
        assert!(!features.cuff_fit_detection());

        // Extra bytes tolerated.
        assert!(parse_feature(&[0x05, 0x00, 0xFF]).is_ok());

        assert!(matches!(
            parse_feature(&[0x05]),
            Err(DecodeError::Truncated {
                field: "feature bits",
                ..
            })
        ));
    }
}
