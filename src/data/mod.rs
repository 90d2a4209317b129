//! Payload types and the remote calls that produce them
//!
//! Every client here implements [`RemoteCall`](crate::fetch::RemoteCall) and is
//! only ever invoked through the orchestrator.

pub mod http;
pub mod market;
pub mod news;
pub mod translation;
pub mod weather;

pub use http::http_client;
pub use market::{MarketClient, Quote, Ticker, TickerRemote};
pub use news::{Article, NewsClient};
pub use translation::{translation_cache_key, Translation, TranslationClient};
pub use weather::{weather_code_to_condition, WeatherClient};

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Current weather conditions at the configured location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Current temperature in Celsius
    pub temperature: f64,
    /// Feels-like temperature in Celsius
    pub feels_like: f64,
    pub condition: WeatherCondition,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Wind speed in km/h
    pub wind: f64,
    /// Today's maximum UV index
    pub uv: f64,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Types of weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Rain,
    Showers,
    Thunderstorm,
    Snow,
    Fog,
}

impl WeatherCondition {
    pub fn label(&self) -> &'static str {
        match self {
            WeatherCondition::Clear => "Clear",
            WeatherCondition::PartlyCloudy => "Partly cloudy",
            WeatherCondition::Cloudy => "Cloudy",
            WeatherCondition::Rain => "Rain",
            WeatherCondition::Showers => "Freezing showers",
            WeatherCondition::Thunderstorm => "Thunderstorm",
            WeatherCondition::Snow => "Snow",
            WeatherCondition::Fog => "Fog",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_report_serialization_roundtrip() {
        let report = WeatherReport {
            temperature: 22.5,
            feels_like: 24.0,
            condition: WeatherCondition::PartlyCloudy,
            humidity: 65,
            wind: 12.5,
            uv: 6.0,
            sunrise: NaiveTime::from_hms_opt(5, 30, 0).unwrap(),
            sunset: NaiveTime::from_hms_opt(21, 15, 0).unwrap(),
            fetched_at: Utc::now(),
        };

        let json = serde_json::to_string(&report).expect("Failed to serialize WeatherReport");
        let back: WeatherReport =
            serde_json::from_str(&json).expect("Failed to deserialize WeatherReport");

        assert_eq!(back, report);
    }

    #[test]
    fn test_condition_labels_are_distinct() {
        let conditions = [
            WeatherCondition::Clear,
            WeatherCondition::PartlyCloudy,
            WeatherCondition::Cloudy,
            WeatherCondition::Rain,
            WeatherCondition::Showers,
            WeatherCondition::Thunderstorm,
            WeatherCondition::Snow,
            WeatherCondition::Fog,
        ];

        for (i, a) in conditions.iter().enumerate() {
            for b in &conditions[i + 1..] {
                assert_ne!(a.label(), b.label());
            }
        }
    }
}
