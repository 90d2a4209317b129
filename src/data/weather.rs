//! Open-Meteo weather API client
//!
//! Fetches current conditions plus today's sunrise, sunset and UV maximum.
//! Open-Meteo needs no API key.

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::get_json;
use super::{WeatherCondition, WeatherReport};
use crate::config::Location;
use crate::fetch::{RemoteCall, RemoteError};

/// Base URL for the Open-Meteo API
const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Current-conditions variables requested from Open-Meteo
const CURRENT_FIELDS: [&str; 5] = [
    "temperature_2m",
    "relative_humidity_2m",
    "apparent_temperature",
    "weather_code",
    "wind_speed_10m",
];

/// Client for fetching weather data for one location
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    location: Location,
    base_url: String,
}

impl WeatherClient {
    pub fn new(client: Client, location: Location) -> Self {
        Self {
            client,
            location,
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    /// Points the client at another server (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Fetches the current weather report
    pub async fn fetch_weather(&self) -> Result<WeatherReport, RemoteError> {
        let request = self.client.get(&self.base_url).query(&[
            ("latitude", self.location.latitude.to_string()),
            ("longitude", self.location.longitude.to_string()),
            ("current", CURRENT_FIELDS.join(",")),
            ("daily", "sunrise,sunset,uv_index_max".to_string()),
            ("forecast_days", "1".to_string()),
            ("timezone", "auto".to_string()),
        ]);

        let response: OpenMeteoResponse = get_json(request).await?;
        parse_response(response)
    }
}

#[async_trait]
impl RemoteCall for WeatherClient {
    type Output = WeatherReport;

    async fn call(&self) -> Result<WeatherReport, RemoteError> {
        self.fetch_weather().await
    }
}

/// Turns the Open-Meteo payload into a report
fn parse_response(response: OpenMeteoResponse) -> Result<WeatherReport, RemoteError> {
    let current = response.current;
    let daily = response.daily;

    let uv = daily
        .uv_index_max
        .first()
        .copied()
        .ok_or_else(|| missing("uv_index_max"))?;
    let sunrise = parse_time(daily.sunrise.first().ok_or_else(|| missing("sunrise"))?)?;
    let sunset = parse_time(daily.sunset.first().ok_or_else(|| missing("sunset"))?)?;

    Ok(WeatherReport {
        temperature: current.temperature_2m,
        feels_like: current.apparent_temperature,
        condition: weather_code_to_condition(current.weather_code),
        humidity: current.relative_humidity_2m.clamp(0.0, 100.0) as u8,
        wind: current.wind_speed_10m,
        uv,
        sunrise,
        sunset,
        fetched_at: Utc::now(),
    })
}

fn missing(field: &str) -> RemoteError {
    RemoteError::Malformed(format!("missing field {field}"))
}

/// Parses the time part of an ISO 8601 local datetime such as "2024-07-15T05:30"
fn parse_time(time_str: &str) -> Result<NaiveTime, RemoteError> {
    time_str
        .split('T')
        .nth(1)
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .ok_or_else(|| RemoteError::Malformed(format!("invalid time format: {time_str}")))
}

/// Map WMO weather code to WeatherCondition
///
/// - 0: Clear sky
/// - 1-3: Partly cloudy
/// - 45, 48: Fog
/// - 51-55, 61-65, 80-82: Drizzle, rain, rain showers
/// - 56-57, 66-67: Freezing drizzle and rain
/// - 71-77, 85-86: Snow
/// - 95-99: Thunderstorm
pub fn weather_code_to_condition(code: u8) -> WeatherCondition {
    match code {
        0 => WeatherCondition::Clear,
        1..=3 => WeatherCondition::PartlyCloudy,
        45 | 48 => WeatherCondition::Fog,
        51..=55 | 61..=65 | 80..=82 => WeatherCondition::Rain,
        56..=57 | 66..=67 => WeatherCondition::Showers,
        71..=77 | 85..=86 => WeatherCondition::Snow,
        95..=99 => WeatherCondition::Thunderstorm,
        _ => WeatherCondition::Cloudy,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenMeteoResponse {
    current: CurrentWeather,
    daily: DailyWeather,
}

#[derive(Debug, Serialize, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    weather_code: u8,
    wind_speed_10m: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct DailyWeather {
    sunrise: Vec<String>,
    sunset: Vec<String>,
    uv_index_max: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_RESPONSE: &str = r#"{
        "latitude": 40.71,
        "longitude": -74.01,
        "timezone": "America/New_York",
        "current": {
            "time": "2024-07-15T14:00",
            "interval": 900,
            "temperature_2m": 29.5,
            "relative_humidity_2m": 58,
            "apparent_temperature": 31.2,
            "weather_code": 2,
            "wind_speed_10m": 11.4
        },
        "daily": {
            "time": ["2024-07-15"],
            "sunrise": ["2024-07-15T05:41"],
            "sunset": ["2024-07-15T20:26"],
            "uv_index_max": [8.1]
        }
    }"#;

    #[test]
    fn test_parse_valid_response() {
        let response: OpenMeteoResponse = serde_json::from_str(VALID_RESPONSE).unwrap();

        let report = parse_response(response).unwrap();

        assert!((report.temperature - 29.5).abs() < 0.01);
        assert!((report.feels_like - 31.2).abs() < 0.01);
        assert_eq!(report.condition, WeatherCondition::PartlyCloudy);
        assert_eq!(report.humidity, 58);
        assert_eq!(report.sunrise, NaiveTime::from_hms_opt(5, 41, 0).unwrap());
        assert_eq!(report.sunset, NaiveTime::from_hms_opt(20, 26, 0).unwrap());
    }

    #[test]
    fn test_missing_daily_values_are_malformed() {
        let mut response: OpenMeteoResponse = serde_json::from_str(VALID_RESPONSE).unwrap();
        response.daily.sunset.clear();

        let err = parse_response(response).unwrap_err();

        assert!(matches!(err, RemoteError::Malformed(msg) if msg.contains("sunset")));
    }

    #[test]
    fn test_invalid_time_is_malformed() {
        assert!(parse_time("2024-07-15 05:41").is_err());
        assert!(parse_time("2024-07-15T25:99").is_err());
        assert_eq!(
            parse_time("2024-07-15T06:05").unwrap(),
            NaiveTime::from_hms_opt(6, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_weather_codes() {
        assert_eq!(weather_code_to_condition(0), WeatherCondition::Clear);
        assert_eq!(weather_code_to_condition(3), WeatherCondition::PartlyCloudy);
        assert_eq!(weather_code_to_condition(48), WeatherCondition::Fog);
        assert_eq!(weather_code_to_condition(63), WeatherCondition::Rain);
        assert_eq!(weather_code_to_condition(66), WeatherCondition::Showers);
        assert_eq!(weather_code_to_condition(75), WeatherCondition::Snow);
        assert_eq!(weather_code_to_condition(96), WeatherCondition::Thunderstorm);
        assert_eq!(weather_code_to_condition(200), WeatherCondition::Cloudy);
    }
}
