use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement convention a request and its cached result are pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitSystem {
    /// Celsius, metres per second.
    #[default]
    #[serde(rename = "C")]
    Metric,
    /// Fahrenheit, miles per hour.
    #[serde(rename = "F")]
    Imperial,
}

impl UnitSystem {
    /// Value of the provider's `units` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    /// Short symbol used when persisting and displaying temperatures.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "C",
            UnitSystem::Imperial => "F",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "m/s",
            UnitSystem::Imperial => "mph",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UnitSystem::Metric => UnitSystem::Imperial,
            UnitSystem::Imperial => UnitSystem::Metric,
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitSystem {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "metric" | "c" => Ok(UnitSystem::Metric),
            "imperial" | "f" => Ok(UnitSystem::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// One successful current-conditions lookup.
///
/// Temperatures and wind speed are already expressed in the unit system the
/// request used. Nothing downstream converts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeather {
    pub city: String,
    /// ISO two-letter code, or empty when the provider omits it.
    pub country: String,
    /// Observation time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    /// Provider-defined code that drives icon selection.
    pub condition_code: i64,
    pub humidity_pct: Option<u8>,
    pub wind_speed: Option<f64>,
    pub pressure_hpa: Option<u32>,
    pub coordinates: Option<Coordinates>,
    /// Unit system the values above are expressed in.
    pub unit: UnitSystem,
}

impl NormalizedWeather {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// "London, GB", or just the city when the country is unknown.
    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.city.clone()
        } else {
            format!("{}, {}", self.city, self.country)
        }
    }
}

/// Cache lookup key: trimmed, lowercased city plus the unit system tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(city: &str, unit: UnitSystem) -> Self {
        Self(format!("{}|{}", city.trim().to_lowercase(), unit.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_normalizes_case_and_whitespace() {
        let a = CacheKey::new("  London ", UnitSystem::Metric);
        let b = CacheKey::new("london", UnitSystem::Metric);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "london|metric");
    }

    #[test]
    fn cache_key_differs_by_unit() {
        let metric = CacheKey::new("Paris", UnitSystem::Metric);
        let imperial = CacheKey::new("Paris", UnitSystem::Imperial);
        assert_ne!(metric, imperial);
    }

    #[test]
    fn unit_system_parses_names_and_symbols() {
        assert_eq!(UnitSystem::try_from("metric").unwrap(), UnitSystem::Metric);
        assert_eq!(UnitSystem::try_from("F").unwrap(), UnitSystem::Imperial);
        assert_eq!(UnitSystem::try_from(" Imperial ").unwrap(), UnitSystem::Imperial);

        let err = UnitSystem::try_from("kelvin").unwrap_err();
        assert!(err.to_string().contains("Unknown unit system"));
    }

    #[test]
    fn unit_system_toggles_both_ways() {
        assert_eq!(UnitSystem::Metric.toggled(), UnitSystem::Imperial);
        assert_eq!(UnitSystem::Imperial.toggled(), UnitSystem::Metric);
    }

    #[test]
    fn unit_system_persists_as_symbol() {
        let json = serde_json::to_string(&UnitSystem::Imperial).unwrap();
        assert_eq!(json, "\"F\"");
        let back: UnitSystem = serde_json::from_str("\"C\"").unwrap();
        assert_eq!(back, UnitSystem::Metric);
    }

    #[test]
    fn display_name_omits_missing_country() {
        let mut w = NormalizedWeather {
            city: "London".into(),
            country: "GB".into(),
            timestamp_ms: 1_700_000_000_000,
            temperature: 20.0,
            feels_like: 19.0,
            condition: "clear sky".into(),
            condition_code: 800,
            humidity_pct: Some(50),
            wind_speed: None,
            pressure_hpa: None,
            coordinates: None,
            unit: UnitSystem::Metric,
        };
        assert_eq!(w.display_name(), "London, GB");
        w.country.clear();
        assert_eq!(w.display_name(), "London");
        assert_eq!(w.observed_at().unwrap().timestamp(), 1_700_000_000);
    }
}
