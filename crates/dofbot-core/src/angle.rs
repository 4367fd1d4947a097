//! Angle Conversion
//!
//! Converts between joint angles in degrees and the bus servos' native
//! position units:
//! - Servos 1-4 and 6: 0-180° ↔ 900-3100
//! - Servo 5 (wrist rotation): 0-270° ↔ 380-3700
//!
//! Servos 2, 3 and 4 are mounted inverted, so their commanded angle is
//! reflected (`180 - angle`) before mapping and after reading back.

use crate::protocol::ArmError;

/// Number of servos on the arm
pub const SERVO_COUNT: u8 = 6;

/// Degree range and position range of one servo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoRange {
    /// Largest valid angle in degrees (the smallest is 0)
    pub max_angle: u16,
    /// Position for 0°
    pub min_position: u16,
    /// Position for `max_angle`
    pub max_position: u16,
}

/// Range of servos 1-4 and 6
pub const STANDARD_RANGE: ServoRange = ServoRange {
    max_angle: 180,
    min_position: 900,
    max_position: 3100,
};

/// Range of servo 5
pub const WRIST_RANGE: ServoRange = ServoRange {
    max_angle: 270,
    min_position: 380,
    max_position: 3700,
};

/// Range table entry for an arm servo
pub fn range_for(servo_id: u8) -> Result<ServoRange, ArmError> {
    match servo_id {
        5 => Ok(WRIST_RANGE),
        1..=SERVO_COUNT => Ok(STANDARD_RANGE),
        _ => Err(ArmError::InvalidServoId {
            id: servo_id,
            min: 1,
            max: SERVO_COUNT,
        }),
    }
}

/// Whether the servo is mounted inverted
pub fn is_inverted(servo_id: u8) -> bool {
    matches!(servo_id, 2..=4)
}

/// Check `angle` against the servo's range without converting it
pub fn validate(servo_id: u8, angle: u16) -> Result<ServoRange, ArmError> {
    let range = range_for(servo_id)?;
    if angle > range.max_angle {
        return Err(ArmError::AngleOutOfRange {
            id: servo_id,
            angle,
            max: range.max_angle,
        });
    }
    Ok(range)
}

/// Arduino-style integer `map()`, truncating
pub fn map_range(value: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Convert degrees to a device position
pub fn to_position(servo_id: u8, angle: u16) -> Result<u16, ArmError> {
    let range = validate(servo_id, angle)?;
    let effective = if is_inverted(servo_id) {
        180 - angle
    } else {
        angle
    };
    Ok(range.position_of(effective))
}

/// Convert a device position back to degrees.
///
/// Returns `None` when the rounded angle falls outside the servo's range;
/// out-of-range readings are treated as failed reads rather than clamped.
pub fn to_angle(servo_id: u8, position: u16) -> Option<u16> {
    let range = range_for(servo_id).ok()?;
    let angle = range.angle_of(position)?;
    if is_inverted(servo_id) {
        Some(180 - angle)
    } else {
        Some(angle)
    }
}

impl ServoRange {
    /// Map an angle already known to be in range, no inversion applied
    pub fn position_of(&self, angle: u16) -> u16 {
        map_range(
            angle as i64,
            0,
            self.max_angle as i64,
            self.min_position as i64,
            self.max_position as i64,
        ) as u16
    }

    /// Inverse of [`position_of`](Self::position_of), rounded to the
    /// nearest degree
    pub fn angle_of(&self, position: u16) -> Option<u16> {
        let span = (self.max_position - self.min_position) as f64;
        let degrees = self.max_angle as f64 * (position as f64 - self.min_position as f64) / span;
        let rounded = degrees.round();
        if rounded < 0.0 || rounded > self.max_angle as f64 {
            return None;
        }
        Some(rounded as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(to_position(1, 0).unwrap(), 900);
        assert_eq!(to_position(1, 180).unwrap(), 3100);
        assert_eq!(to_position(5, 0).unwrap(), 380);
        assert_eq!(to_position(5, 270).unwrap(), 3700);
    }

    #[test]
    fn test_truncating_map() {
        assert_eq!(to_position(1, 90).unwrap(), 2000);
        // 90 * 3320 / 270 = 1106.67
        assert_eq!(to_position(5, 90).unwrap(), 1486);
        // 150 * 2200 / 180 = 1833.33
        assert_eq!(to_position(6, 150).unwrap(), 2733);
    }

    #[test]
    fn test_inverted_joints() {
        for id in 2..=4 {
            assert_eq!(to_position(id, 30).unwrap(), to_position(1, 150).unwrap());
            assert_eq!(to_position(id, 0).unwrap(), 3100);
            assert_eq!(to_angle(id, 3100), Some(0));
        }
        assert!(!is_inverted(1));
        assert!(!is_inverted(5));
        assert!(!is_inverted(6));
    }

    #[test]
    fn test_range_errors() {
        assert!(matches!(
            to_position(1, 181),
            Err(ArmError::AngleOutOfRange { id: 1, angle: 181, max: 180 })
        ));
        assert!(to_position(5, 270).is_ok());
        assert!(to_position(5, 271).is_err());
        assert!(matches!(
            to_position(7, 10),
            Err(ArmError::InvalidServoId { id: 7, .. })
        ));
        assert!(to_position(0, 10).unwrap_err().is_range_error());
    }

    #[test]
    fn test_reading_out_of_range_fails() {
        assert_eq!(to_angle(1, 0), None);
        assert_eq!(to_angle(1, 3200), None);
        assert_eq!(to_angle(5, 3800), None);
        // Rounds back into range
        assert_eq!(to_angle(1, 895), Some(0));
    }

    #[test]
    fn test_roundtrip_within_one_degree() {
        for id in 1..=SERVO_COUNT {
            let max = range_for(id).unwrap().max_angle;
            for angle in 0..=max {
                let pos = to_position(id, angle).unwrap();
                let back = to_angle(id, pos).unwrap();
                assert!(
                    (back as i32 - angle as i32).abs() <= 1,
                    "servo {} angle {} came back as {}",
                    id,
                    angle,
                    back
                );
            }
        }
    }
}
