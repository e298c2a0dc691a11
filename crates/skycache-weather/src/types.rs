use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Weather condition categories mapped from provider icon names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Windy,
    Rain,
    Showers,
    Snow,
    Thunderstorm,
    #[default]
    Unknown,
}

impl WeatherCondition {
    /// Convert a Visual Crossing icon name to a WeatherCondition
    /// See: https://www.visualcrossing.com/resources/documentation/weather-api/defining-icon-set-in-the-weather-api/
    pub fn from_icon(icon: &str) -> Self {
        match icon {
            "clear-day" | "clear-night" => Self::Clear,
            "partly-cloudy-day" | "partly-cloudy-night" => Self::PartlyCloudy,
            "cloudy" => Self::Cloudy,
            "fog" => Self::Fog,
            "wind" => Self::Windy,
            "rain" => Self::Rain,
            "showers-day" | "showers-night" => Self::Showers,
            "snow" | "snow-showers-day" | "snow-showers-night" => Self::Snow,
            "thunder-rain" | "thunder-showers-day" | "thunder-showers-night" => {
                Self::Thunderstorm
            }
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Windy => "Windy",
            Self::Rain => "Rain",
            Self::Showers => "Showers",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }

    /// Get a short glyph for text and HTML output
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Clear => "☀",
            Self::PartlyCloudy => "⛅",
            Self::Cloudy => "☁",
            Self::Fog => "🌫",
            Self::Windy => "🌬",
            Self::Rain | Self::Showers => "🌧",
            Self::Snow => "❄",
            Self::Thunderstorm => "⛈",
            Self::Unknown => "·",
        }
    }
}

/// Conditions at observation time (`currentConditions` in the payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feelslike: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windspeed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurrentConditions {
    pub fn condition(&self) -> WeatherCondition {
        self.icon
            .as_deref()
            .map(WeatherCondition::from_icon)
            .unwrap_or_default()
    }
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub datetime: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feelslike: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipprob: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DayForecast {
    pub fn condition(&self) -> WeatherCondition {
        self.icon
            .as_deref()
            .map(WeatherCondition::from_icon)
            .unwrap_or_default()
    }
}

/// Structured upstream payload.
///
/// Fields the resolver and renderers use are typed; every other top-level
/// field is kept in `extra` so nothing from the provider is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub days: Vec<DayForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_conditions: Option<CurrentConditions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WeatherRecord {
    /// Best available place name: provider-resolved, then as queried.
    pub fn display_name(&self) -> Option<&str> {
        self.resolved_address
            .as_deref()
            .or(self.address.as_deref())
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayForecast> {
        self.days.iter().find(|d| d.datetime == date)
    }
}

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "api")]
    Upstream,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Upstream => "api",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherResult {
    /// Location as the caller entered it
    pub location: String,
    pub record: WeatherRecord,
    pub origin: Origin,
    pub observed_at: DateTime<Utc>,
}

/// A single day picked out of a resolved record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayWeather {
    pub location: String,
    pub day: DayForecast,
    pub current: Option<CurrentConditions>,
    pub origin: Origin,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_clear() {
        assert_eq!(WeatherCondition::from_icon("clear-day"), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_icon("clear-night"), WeatherCondition::Clear);
    }

    #[test]
    fn test_icon_partly_cloudy() {
        assert_eq!(
            WeatherCondition::from_icon("partly-cloudy-day"),
            WeatherCondition::PartlyCloudy
        );
        assert_eq!(
            WeatherCondition::from_icon("partly-cloudy-night"),
            WeatherCondition::PartlyCloudy
        );
    }

    #[test]
    fn test_icon_precipitation() {
        assert_eq!(WeatherCondition::from_icon("rain"), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_icon("showers-day"), WeatherCondition::Showers);
        assert_eq!(WeatherCondition::from_icon("snow-showers-night"), WeatherCondition::Snow);
        assert_eq!(
            WeatherCondition::from_icon("thunder-rain"),
            WeatherCondition::Thunderstorm
        );
    }

    #[test]
    fn test_icon_unknown_defaults() {
        assert_eq!(WeatherCondition::from_icon("hail"), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_icon(""), WeatherCondition::Unknown);
    }

    #[test]
    fn test_condition_description() {
        assert_eq!(WeatherCondition::Clear.description(), "Clear");
        assert_eq!(WeatherCondition::Thunderstorm.description(), "Thunderstorm");
    }

    #[test]
    fn test_origin_labels() {
        assert_eq!(Origin::Cache.as_str(), "cache");
        assert_eq!(Origin::Upstream.as_str(), "api");
        assert_eq!(serde_json::to_string(&Origin::Upstream).unwrap(), "\"api\"");
    }

    #[test]
    fn test_record_day_lookup() {
        let record: WeatherRecord = serde_json::from_value(serde_json::json!({
            "address": "paris",
            "days": [
                {"datetime": "2024-07-15", "tempmax": 80.1},
                {"datetime": "2024-07-16", "tempmax": 78.0}
            ]
        }))
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 7, 16).unwrap();
        assert_eq!(record.day(date).and_then(|d| d.tempmax), Some(78.0));
        assert!(record
            .day(NaiveDate::from_ymd_opt(2024, 7, 20).unwrap())
            .is_none());
        assert_eq!(record.display_name(), Some("paris"));
    }
}
