// libs/doctor-cell/src/services/timegrid.rs
//
// Minute-of-day arithmetic for the HH:MM wall-clock values the rest of
// the scheduling engine is built on.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::ScheduleError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time of day, stored as minutes since midnight.
///
/// Serializes as the zero-padded "HH:MM" string used on the wire and in
/// storage; ordering and arithmetic are numeric on the minute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Strict "HH:MM" parse: exactly two zero-padded digit groups
    /// separated by ':', hours 0-23, minutes 0-59.
    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let bytes = input.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(ScheduleError::InvalidTimeFormat(input.to_string()));
        }

        let digit = |b: u8| -> Result<u16, ScheduleError> {
            if b.is_ascii_digit() {
                Ok((b - b'0') as u16)
            } else {
                Err(ScheduleError::InvalidTimeFormat(input.to_string()))
            }
        };

        let hours = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minutes = digit(bytes[3])? * 10 + digit(bytes[4])?;

        if hours > 23 || minutes > 59 {
            return Err(ScheduleError::InvalidTimeFormat(input.to_string()));
        }

        Ok(Self(hours * 60 + minutes))
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// None if the result would cross midnight.
    pub fn checked_add_minutes(self, minutes: u16) -> Option<Self> {
        Self::from_minutes(self.0.checked_add(minutes)?)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Enumerate candidate slot starts: start, start+step, ... for as long as
/// the whole step still fits before `end_minutes`. Empty when the step is
/// non-positive or nothing fits.
pub fn enumerate(start_minutes: u16, end_minutes: u16, step_minutes: i32) -> Vec<u16> {
    let mut offsets = Vec::new();
    if step_minutes <= 0 {
        return offsets;
    }

    let step = step_minutes as u32;
    let end = end_minutes as u32;
    let mut current = start_minutes as u32;

    while current + step <= end {
        offsets.push(current as u16);
        current += step;
    }

    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_well_formed_times() {
        assert_eq!(ClockTime::parse("00:00").unwrap().minutes(), 0);
        assert_eq!(ClockTime::parse("09:30").unwrap().minutes(), 570);
        assert_eq!(ClockTime::parse("23:59").unwrap().minutes(), 1439);
    }

    #[test]
    fn rejects_malformed_times() {
        for input in ["9:00", "09:0", "0900", "09-00", "24:00", "09:60", "ab:cd", "", "09:000"] {
            assert_matches!(
                ClockTime::parse(input),
                Err(ScheduleError::InvalidTimeFormat(_)),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn formats_zero_padded() {
        assert_eq!(ClockTime::parse("07:05").unwrap().to_string(), "07:05");
        assert_eq!(ClockTime::parse("16:30").unwrap().to_string(), "16:30");
    }

    #[test]
    fn orders_numerically() {
        let early = ClockTime::parse("08:59").unwrap();
        let late = ClockTime::parse("09:00").unwrap();
        assert!(early < late);
        assert_eq!(late, ClockTime::parse("09:00").unwrap());
    }

    #[test]
    fn checked_add_stops_at_midnight() {
        let late = ClockTime::parse("23:45").unwrap();
        assert_eq!(late.checked_add_minutes(14).unwrap().to_string(), "23:59");
        assert_eq!(late.checked_add_minutes(15), None);
    }

    #[test]
    fn serde_round_trips_as_string() {
        let time = ClockTime::parse("13:15").unwrap();
        let encoded = serde_json::to_string(&time).unwrap();
        assert_eq!(encoded, "\"13:15\"");
        let decoded: ClockTime = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, time);
    }

    #[test]
    fn serde_rejects_malformed_string() {
        assert!(serde_json::from_str::<ClockTime>("\"25:00\"").is_err());
    }

    #[test]
    fn enumerate_requires_full_fit() {
        // 09:00-10:00 with 25-minute steps: 09:25 fits, 09:50 + 25 would
        // cross the boundary.
        assert_eq!(enumerate(540, 600, 25), vec![540, 565]);
    }

    #[test]
    fn enumerate_includes_slot_ending_exactly_at_boundary() {
        assert_eq!(enumerate(540, 600, 30), vec![540, 570]);
    }

    #[test]
    fn enumerate_empty_cases() {
        assert!(enumerate(540, 600, 0).is_empty());
        assert!(enumerate(540, 600, -30).is_empty());
        assert!(enumerate(600, 540, 30).is_empty());
        assert!(enumerate(540, 540, 30).is_empty());
        assert!(enumerate(540, 560, 30).is_empty());
    }

    #[test]
    fn enumerate_full_working_day() {
        // 09:00-17:00 in 30-minute steps: 16 candidates.
        let offsets = enumerate(540, 1020, 30);
        assert_eq!(offsets.len(), 16);
        assert_eq!(offsets[0], 540);
        assert_eq!(*offsets.last().unwrap(), 990);
    }
}
