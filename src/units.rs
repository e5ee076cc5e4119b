//! Static unit conversion tables.
//!
//! All internal arithmetic runs on meters and seconds; the input document
//! picks its own distance and time units and every boundary crossing goes
//! through the factors below. Factors are fixed by the wire format and are
//! not configurable.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Distance unit accepted on the wire.
///
/// The factor converts one unit to meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceUnit {
    Foot,
    #[default]
    Metre,
    Ell,
    Fathom,
    Peninkulma,
    Rast,
}

impl DistanceUnit {
    /// Meters per one unit of distance.
    pub const fn meters_per_unit(self) -> f64 {
        match self {
            DistanceUnit::Foot => 0.3048,
            DistanceUnit::Metre => 1.0,
            DistanceUnit::Ell => 1.143,
            DistanceUnit::Fathom => 1.8288,
            DistanceUnit::Peninkulma => 6000.0,
            DistanceUnit::Rast => 10000.0,
        }
    }

    /// Converts a value expressed in this unit to meters.
    pub fn to_meters(self, value: f64) -> f64 {
        value * self.meters_per_unit()
    }

    /// Converts meters back to this unit.
    pub fn from_meters(self, meters: f64) -> f64 {
        meters / self.meters_per_unit()
    }

    const fn name(self) -> &'static str {
        match self {
            DistanceUnit::Foot => "Foot",
            DistanceUnit::Metre => "Metre",
            DistanceUnit::Ell => "Ell",
            DistanceUnit::Fathom => "Fathom",
            DistanceUnit::Peninkulma => "Peninkulma",
            DistanceUnit::Rast => "Rast",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Time unit accepted on the wire.
///
/// The factor converts one unit to seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    #[default]
    Second,
    Minute,
    Hour,
}

impl TimeUnit {
    /// Seconds per one unit of time.
    pub const fn seconds_per_unit(self) -> f64 {
        match self {
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 3600.0,
        }
    }

    /// Converts a value expressed in this unit to seconds.
    pub fn to_seconds(self, value: f64) -> f64 {
        value * self.seconds_per_unit()
    }

    /// Converts seconds back to this unit.
    pub fn from_seconds(self, seconds: f64) -> f64 {
        seconds / self.seconds_per_unit()
    }

    const fn name(self) -> &'static str {
        match self {
            TimeUnit::Second => "Second",
            TimeUnit::Minute => "Minute",
            TimeUnit::Hour => "Hour",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Wire names are matched case-insensitively; serialization emits the
// canonical capitalized form so round-trips are stable.

impl FromStr for DistanceUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foot" => Ok(DistanceUnit::Foot),
            "metre" => Ok(DistanceUnit::Metre),
            "ell" => Ok(DistanceUnit::Ell),
            "fathom" => Ok(DistanceUnit::Fathom),
            "peninkulma" => Ok(DistanceUnit::Peninkulma),
            "rast" => Ok(DistanceUnit::Rast),
            _ => Err(()),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "second" => Ok(TimeUnit::Second),
            "minute" => Ok(TimeUnit::Minute),
            "hour" => Ok(TimeUnit::Hour),
            _ => Err(()),
        }
    }
}

impl Serialize for DistanceUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DistanceUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            de::Error::unknown_variant(
                &s,
                &["Foot", "Metre", "Ell", "Fathom", "Peninkulma", "Rast"],
            )
        })
    }
}

impl Serialize for TimeUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| de::Error::unknown_variant(&s, &["Second", "Minute", "Hour"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Distance factors ──────────────────────────────────────────────

    #[test]
    fn distance_factors_to_meters() {
        assert!((DistanceUnit::Foot.to_meters(1.0) - 0.3048).abs() < 1e-12);
        assert!((DistanceUnit::Metre.to_meters(1.0) - 1.0).abs() < 1e-12);
        assert!((DistanceUnit::Ell.to_meters(1.0) - 1.143).abs() < 1e-12);
        assert!((DistanceUnit::Fathom.to_meters(1.0) - 1.8288).abs() < 1e-12);
        assert!((DistanceUnit::Peninkulma.to_meters(1.0) - 6000.0).abs() < 1e-9);
        assert!((DistanceUnit::Rast.to_meters(1.0) - 10000.0).abs() < 1e-9);
    }

    #[test]
    fn distance_round_trip_preserves_value() {
        let units = [
            DistanceUnit::Foot,
            DistanceUnit::Metre,
            DistanceUnit::Ell,
            DistanceUnit::Fathom,
            DistanceUnit::Peninkulma,
            DistanceUnit::Rast,
        ];
        for unit in units {
            let back = unit.from_meters(unit.to_meters(123.456));
            assert!((back - 123.456).abs() < 1e-9, "{unit}: got {back}");
        }
    }

    // ── Time factors ──────────────────────────────────────────────────

    #[test]
    fn time_factors_to_seconds() {
        assert!((TimeUnit::Second.to_seconds(1.0) - 1.0).abs() < 1e-12);
        assert!((TimeUnit::Minute.to_seconds(1.0) - 60.0).abs() < 1e-12);
        assert!((TimeUnit::Hour.to_seconds(1.0) - 3600.0).abs() < 1e-12);
    }

    #[test]
    fn time_round_trip_preserves_value() {
        for unit in [TimeUnit::Second, TimeUnit::Minute, TimeUnit::Hour] {
            let back = unit.from_seconds(unit.to_seconds(42.5));
            assert!((back - 42.5).abs() < 1e-12, "{unit}: got {back}");
        }
    }

    // ── Wire format ───────────────────────────────────────────────────

    #[test]
    fn distance_unit_parses_case_insensitively() {
        let unit: DistanceUnit = serde_json::from_str("\"peninkulma\"").unwrap();
        assert_eq!(unit, DistanceUnit::Peninkulma);
        let unit: DistanceUnit = serde_json::from_str("\"FOOT\"").unwrap();
        assert_eq!(unit, DistanceUnit::Foot);
    }

    #[test]
    fn time_unit_parses_case_insensitively() {
        let unit: TimeUnit = serde_json::from_str("\"MiNuTe\"").unwrap();
        assert_eq!(unit, TimeUnit::Minute);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(serde_json::from_str::<DistanceUnit>("\"league\"").is_err());
        assert!(serde_json::from_str::<TimeUnit>("\"fortnight\"").is_err());
    }

    #[test]
    fn serialization_emits_canonical_names() {
        assert_eq!(
            serde_json::to_string(&DistanceUnit::Rast).unwrap(),
            "\"Rast\""
        );
        assert_eq!(serde_json::to_string(&TimeUnit::Hour).unwrap(), "\"Hour\"");
    }
}
