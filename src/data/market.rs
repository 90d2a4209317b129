//! Finnhub quote client and the batched market ticker
//!
//! The ticker fetches each symbol with its own sub-call so that one bad symbol
//! only produces a placeholder in the ticker instead of failing it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{get_json, missing_api_key};
use crate::fetch::{join_batch, BatchItem, RemoteCall, RemoteError};

/// Base URL for the Finnhub quote endpoint
const FINNHUB_QUOTE_URL: &str = "https://finnhub.io/api/v1/quote";

/// Latest quote for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    /// Absolute change since previous close
    pub change: f64,
    /// Percent change since previous close
    pub change_percent: f64,
    pub previous_close: f64,
}

impl Quote {
    pub fn is_up(&self) -> bool {
        self.change >= 0.0
    }
}

/// One ticker slot per requested symbol, in request order
pub type Ticker = Vec<BatchItem<Quote>>;

/// Client for Finnhub quotes
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl MarketClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: FINNHUB_QUOTE_URL.to_string(),
        }
    }

    /// Points the client at another server (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetches the quote for a single symbol
    pub async fn fetch_quote(&self, symbol: &str) -> Result<Quote, RemoteError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_api_key("Finnhub"))?;

        let request = self
            .client
            .get(&self.base_url)
            .query(&[("symbol", symbol), ("token", api_key)]);
        let response: FinnhubQuote = get_json(request).await?;
        parse_quote(symbol, response)
    }
}

/// Remote call producing a whole ticker for a fixed symbol batch
#[derive(Debug, Clone)]
pub struct TickerRemote {
    client: MarketClient,
    symbols: Vec<String>,
}

impl TickerRemote {
    pub fn new(client: MarketClient, symbols: Vec<String>) -> Self {
        Self { client, symbols }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

#[async_trait]
impl RemoteCall for TickerRemote {
    type Output = Ticker;

    async fn call(&self) -> Result<Ticker, RemoteError> {
        join_batch(&self.symbols, |symbol| {
            let client = self.client.clone();
            let symbol = symbol.clone();
            async move { client.fetch_quote(&symbol).await }
        })
        .await
    }
}

fn parse_quote(symbol: &str, quote: FinnhubQuote) -> Result<Quote, RemoteError> {
    // Finnhub answers unknown symbols with an all-zero quote
    if quote.timestamp == 0 && quote.current == 0.0 {
        return Err(RemoteError::Status {
            status: 404,
            message: format!("no quote for {symbol}"),
        });
    }

    Ok(Quote {
        symbol: symbol.to_string(),
        price: quote.current,
        change: quote.change.unwrap_or(0.0),
        change_percent: quote.change_percent.unwrap_or(0.0),
        previous_close: quote.previous_close,
    })
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    #[serde(rename = "c")]
    current: f64,
    #[serde(rename = "d")]
    change: Option<f64>,
    #[serde(rename = "dp")]
    change_percent: Option<f64>,
    #[serde(rename = "pc")]
    previous_close: f64,
    #[serde(rename = "t", default)]
    timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote() {
        let raw: FinnhubQuote = serde_json::from_str(concat!(
            r#"{"c":190.5,"d":-1.25,"dp":-0.652,"h":192.0,"l":189.1,"#,
            r#""o":191.0,"pc":191.75,"t":1721059200}"#
        ))
        .unwrap();

        let quote = parse_quote("AAPL", raw).unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert!((quote.price - 190.5).abs() < 1e-9);
        assert!((quote.change + 1.25).abs() < 1e-9);
        assert!(!quote.is_up());
    }

    #[test]
    fn test_unknown_symbol_is_not_found() {
        let raw: FinnhubQuote =
            serde_json::from_str(r#"{"c":0,"d":null,"dp":null,"h":0,"l":0,"o":0,"pc":0,"t":0}"#)
                .unwrap();

        let err = parse_quote("NOPE", raw).unwrap_err();

        assert!(matches!(err, RemoteError::Status { status: 404, .. }));
    }

    #[test]
    fn test_malformed_quote_fails_to_decode() {
        assert!(serde_json::from_str::<FinnhubQuote>(r#"{"error":"bad"}"#).is_err());
    }

    #[tokio::test]
    async fn test_ticker_without_key_fails_as_a_whole() {
        let remote = TickerRemote::new(
            MarketClient::new(Client::new(), None),
            vec!["AAPL".to_string(), "MSFT".to_string()],
        );

        let err = remote.call().await.unwrap_err();

        assert!(matches!(err, RemoteError::Status { status: 401, .. }));
    }
}
