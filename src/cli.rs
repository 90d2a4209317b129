//! Command-line interface parsing for the briefing dashboard
//!
//! Flags given here override the config file; API keys can also come from the
//! environment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{DashboardConfig, Location};

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// A ticker symbol is empty or contains unexpected characters
    #[error("Invalid symbol: '{0}'. Symbols are letters, digits, '.', '-' or ':'")]
    InvalidSymbol(String),

    /// Coordinates outside the valid range
    #[error("Invalid coordinates: {lat}, {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    /// Only one of --lat / --lon was given
    #[error("--lat and --lon must be given together")]
    IncompleteLocation,

    /// Empty text to translate
    #[error("Nothing to translate")]
    EmptyText,
}

/// News, market and weather briefing in the terminal
#[derive(Parser, Debug)]
#[command(name = "briefing")]
#[command(about = "News, market and weather briefing with offline fallback")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the durable cache
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Guardian API key for news
    #[arg(long, env = "GUARDIAN_API_KEY", hide_env_values = true)]
    pub guardian_key: Option<String>,

    /// Finnhub API key for market quotes
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
    pub finnhub_key: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Latest headlines
    News {
        /// Guardian section, e.g. "world" or "business"
        #[arg(long)]
        section: Option<String>,
    },
    /// Market ticker
    Market {
        /// Comma-separated symbols, e.g. AAPL,MSFT
        #[arg(long, value_delimiter = ',')]
        symbols: Option<Vec<String>>,
    },
    /// Current weather
    Weather {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Translate a piece of text
    Translate {
        text: String,
        /// Target language code, e.g. "fr"
        #[arg(long)]
        to: Option<String>,
    },
    /// News, market and weather in one go
    All,
    /// Keep refreshing the dashboard until Ctrl-C
    Watch,
    /// Manage the durable cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Remove all cached data
    Clear,
    /// Remove only expired records
    Purge,
}

/// Normalizes ticker symbols to upper case and checks their characters
pub fn parse_symbols(raw: &[String]) -> Result<Vec<String>, CliError> {
    raw.iter()
        .map(|s| {
            let symbol = s.trim().to_ascii_uppercase();
            let valid = !symbol.is_empty()
                && symbol
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
            if valid {
                Ok(symbol)
            } else {
                Err(CliError::InvalidSymbol(s.clone()))
            }
        })
        .collect()
}

/// Builds a location from optional --lat/--lon flags
pub fn parse_location(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Location>, CliError> {
    match (lat, lon) {
        (None, None) => Ok(None),
        (Some(lat), Some(lon)) => {
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
                Ok(Some(Location {
                    latitude: lat,
                    longitude: lon,
                }))
            } else {
                Err(CliError::InvalidCoordinates { lat, lon })
            }
        }
        _ => Err(CliError::IncompleteLocation),
    }
}

impl Cli {
    /// Applies global flags on top of a loaded config
    pub fn apply_overrides(&self, config: &mut DashboardConfig) {
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(key) = &self.guardian_key {
            config.guardian_api_key = Some(key.clone());
        }
        if let Some(key) = &self.finnhub_key {
            config.finnhub_api_key = Some(key.clone());
        }
        if let Command::News {
            section: Some(section),
        } = &self.command
        {
            config.news_section = Some(section.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_symbols_normalizes_case() {
        let symbols = parse_symbols(&strings(&["aapl", " msft ", "BRK.B"])).unwrap();
        assert_eq!(symbols, strings(&["AAPL", "MSFT", "BRK.B"]));
    }

    #[test]
    fn test_parse_symbols_invalid() {
        let result = parse_symbols(&strings(&["AAPL", "no way"]));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid symbol"));
        assert!(err.to_string().contains("no way"));

        assert!(parse_symbols(&strings(&[""])).is_err());
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(parse_location(None, None).unwrap(), None);
        assert_eq!(
            parse_location(Some(49.28), Some(-123.12)).unwrap(),
            Some(Location {
                latitude: 49.28,
                longitude: -123.12
            })
        );
        assert_eq!(
            parse_location(Some(49.28), None).unwrap_err(),
            CliError::IncompleteLocation
        );
        assert!(matches!(
            parse_location(Some(95.0), Some(0.0)),
            Err(CliError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_cli_parse_news() {
        let cli = Cli::parse_from(["briefing", "news"]);
        assert_eq!(cli.command, Command::News { section: None });
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_market_symbols() {
        let cli = Cli::parse_from(["briefing", "market", "--symbols", "AAPL,TSLA"]);
        assert_eq!(
            cli.command,
            Command::Market {
                symbols: Some(strings(&["AAPL", "TSLA"]))
            }
        );
    }

    #[test]
    fn test_cli_parse_weather_negative_longitude() {
        let cli = Cli::parse_from(["briefing", "weather", "--lat", "49.28", "--lon", "-123.12"]);
        assert_eq!(
            cli.command,
            Command::Weather {
                lat: Some(49.28),
                lon: Some(-123.12)
            }
        );
    }

    #[test]
    fn test_cli_parse_translate() {
        let cli = Cli::parse_from(["briefing", "translate", "Markets rally", "--to", "fr"]);
        assert_eq!(
            cli.command,
            Command::Translate {
                text: "Markets rally".to_string(),
                to: Some("fr".to_string())
            }
        );
    }

    #[test]
    fn test_cli_parse_cache_actions() {
        let cli = Cli::parse_from(["briefing", "cache", "clear"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheAction::Clear
            }
        );
        let cli = Cli::parse_from(["briefing", "-v", "cache", "purge"]);
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheAction::Purge
            }
        );
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["briefing"]).is_err());
        assert!(Cli::try_parse_from(["briefing", "horoscope"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "briefing",
            "--cache-dir",
            "/tmp/briefing-test",
            "--guardian-key",
            "g-key",
            "news",
            "--section",
            "world",
        ]);
        let mut config = DashboardConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/briefing-test")));
        assert_eq!(config.guardian_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.news_section.as_deref(), Some("world"));
    }
}
