//! HTTP status and body handling of the API clients
//!
//! Each test starts a local axum server and points a client at it through
//! `with_base_url`, so the real services are never contacted.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use briefing::cache::{DurableCache, MemoryStorage, VolatileCache};
use briefing::clock::ManualClock;
use briefing::config::Location;
use briefing::data::{MarketClient, NewsClient, TranslationClient, WeatherClient};
use briefing::fetch::{FetchError, Orchestrator, RemoteError, Resource, ResourceConfig};
use briefing::rate_limit::RateLimiter;

/// Starts a server with one route per failure mode and returns its address
async fn start_server() -> SocketAddr {
    let app = Router::new()
        .route(
            "/unauthorized",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    r#"{"message":"Invalid authentication credentials"}"#,
                )
            }),
        )
        .route(
            "/unavailable",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
        )
        .route(
            "/html",
            get(|| async { (StatusCode::OK, "<html><body>Sign in</body></html>") }),
        )
        .route(
            "/quote",
            get(|| async {
                (
                    StatusCode::OK,
                    concat!(
                        r#"{"c":190.5,"d":-1.25,"dp":-0.652,"h":192.0,"l":189.1,"#,
                        r#""o":191.0,"pc":191.75,"t":1721059200}"#
                    ),
                )
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    // Give the server a moment to start accepting
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

/// Client that ignores proxy settings from the environment
fn local_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("Failed to build client")
}

fn orchestrator() -> Orchestrator {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    Orchestrator::new(
        Arc::new(VolatileCache::new(100, clock.clone())),
        DurableCache::new(Arc::new(MemoryStorage::new()), "briefing", clock.clone()),
        Arc::new(RateLimiter::new(clock.clone())),
        clock,
    )
}

fn vancouver() -> Location {
    Location {
        latitude: 49.28,
        longitude: -123.12,
    }
}

#[tokio::test]
async fn test_unauthorized_is_a_status_error_with_body() {
    let addr = start_server().await;
    let news = NewsClient::new(local_client(), Some("bad-key".to_string()))
        .with_base_url(format!("http://{addr}/unauthorized"));

    let err = news.fetch_latest().await.unwrap_err();

    match err {
        RemoteError::Status { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("Invalid authentication credentials"));
        }
        other => panic!("expected a 401 status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_becomes_rejection_through_orchestrator() {
    let addr = start_server().await;
    let news = NewsClient::new(local_client(), Some("bad-key".to_string()))
        .with_base_url(format!("http://{addr}/unauthorized"));
    let resource = Resource::new(ResourceConfig::new("news", "guardian-api"), news);

    let err = orchestrator().fetch(&resource).await.unwrap_err();

    assert!(matches!(err, FetchError::RemoteRejected { status: 401, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_service_unavailable_becomes_unavailable() {
    let addr = start_server().await;
    let weather = WeatherClient::new(local_client(), vancouver())
        .with_base_url(format!("http://{addr}/unavailable"));

    let err = weather.fetch_weather().await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 503, .. }));

    let resource = Resource::new(ResourceConfig::new("weather", "open-meteo-api"), weather);
    let err = orchestrator().fetch(&resource).await.unwrap_err();
    assert!(matches!(err, FetchError::RemoteUnavailable { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_non_json_success_body_is_malformed() {
    let addr = start_server().await;
    let translation = TranslationClient::new(local_client(), "Markets rally", "fr")
        .with_base_url(format!("http://{addr}/html"));

    let err = translation.translate().await.unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)));

    let resource = Resource::new(ResourceConfig::new("translation", "mymemory-api"), translation);
    let err = orchestrator().fetch(&resource).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_quote_is_decoded_from_local_server() {
    let addr = start_server().await;
    let market = MarketClient::new(local_client(), Some("key".to_string()))
        .with_base_url(format!("http://{addr}/quote"));

    let quote = market.fetch_quote("AAPL").await.unwrap();

    assert_eq!(quote.symbol, "AAPL");
    assert!((quote.price - 190.5).abs() < f64::EPSILON);
    assert!(!quote.is_up());
}

#[tokio::test]
async fn test_quote_rejection_carries_status() {
    let addr = start_server().await;
    let market = MarketClient::new(local_client(), Some("bad-key".to_string()))
        .with_base_url(format!("http://{addr}/unauthorized"));

    let err = market.fetch_quote("AAPL").await.unwrap_err();

    assert!(matches!(err, RemoteError::Status { status: 401, .. }));
}
