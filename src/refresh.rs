//! Background data refresh system
//!
//! Runs one periodic task per dashboard panel. Each tick goes through the
//! orchestrator, so refreshes are served from cache while it is live and are
//! subject to the same quotas as manual fetches. Results are reported to the
//! consumer over a tokio channel.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::context::AppContext;
use crate::data::{Article, Ticker, WeatherReport};
use crate::fetch::{FetchError, FetchSource, Orchestrator, RemoteCall, Resource};

/// Data for one dashboard panel
#[derive(Debug, Clone)]
pub enum Panel {
    News(Vec<Article>),
    Market(Ticker),
    Weather(WeatherReport),
}

/// Messages sent from background refresh to the consumer
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// A panel has data, possibly from cache or stale
    Updated {
        resource: String,
        panel: Panel,
        source: FetchSource,
        cached_at: DateTime<Utc>,
    },
    /// A refresh failed and no cached data was available
    Failed { resource: String, error: FetchError },
}

/// Configuration for refresh intervals
///
/// A `None` interval disables that panel.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub news_interval: Option<Duration>,
    pub market_interval: Option<Duration>,
    pub weather_interval: Option<Duration>,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            news_interval: Some(Duration::from_secs(300)),   // 5 minutes
            market_interval: Some(Duration::from_secs(60)),  // 1 minute
            weather_interval: Some(Duration::from_secs(600)), // 10 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh system
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawns one refresh task per enabled panel
    ///
    /// Each task fetches immediately, then once per interval.
    pub fn spawn(context: &AppContext, config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if config.enabled {
            let orchestrator = context.orchestrator();
            if let Some(period) = config.news_interval {
                tasks.push(spawn_panel_task(
                    orchestrator.clone(),
                    context.news_resource(),
                    Panel::News,
                    period,
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                ));
            }
            if let Some(period) = config.market_interval {
                tasks.push(spawn_panel_task(
                    orchestrator.clone(),
                    context.market_resource(None),
                    Panel::Market,
                    period,
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                ));
            }
            if let Some(period) = config.weather_interval {
                tasks.push(spawn_panel_task(
                    orchestrator.clone(),
                    context.weather_resource(None),
                    Panel::Weather,
                    period,
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                ));
            }
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
            tasks,
        }
    }

    /// Number of running panel tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for the next message; `None` once every task has stopped
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Stops the background tasks and waits for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

fn spawn_panel_task<R>(
    orchestrator: Orchestrator,
    resource: Resource<R>,
    to_panel: fn(R::Output) -> Panel,
    period: Duration,
    tx: mpsc::Sender<RefreshMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    R: RemoteCall + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(resource = resource.name(), "refresh tick");
                    let message = match orchestrator.fetch(&resource).await {
                        Ok(fetched) => RefreshMessage::Updated {
                            resource: resource.name().to_string(),
                            panel: to_panel(fetched.data),
                            source: fetched.source,
                            cached_at: fetched.cached_at,
                        },
                        Err(error) => RefreshMessage::Failed {
                            resource: resource.name().to_string(),
                            error,
                        },
                    };
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }
    })
}

/// Checks for pending refresh messages without blocking
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::clock::ManualClock;
    use crate::config::DashboardConfig;
    use std::sync::Arc;

    fn create_test_context() -> AppContext {
        AppContext::with_parts(
            DashboardConfig::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn only_news() -> RefreshConfig {
        RefreshConfig {
            news_interval: Some(Duration::from_secs(300)),
            market_interval: None,
            weather_interval: None,
            enabled: true,
        }
    }

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.news_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.market_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.weather_interval, Some(Duration::from_secs(600)));
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_refresh_handle_spawn_disabled() {
        let config = RefreshConfig {
            enabled: false,
            ..Default::default()
        };

        let mut handle = RefreshHandle::spawn(&create_test_context(), config);

        assert_eq!(handle.task_count(), 0);
        assert!(try_recv(&mut handle).is_none());
    }

    #[tokio::test]
    async fn test_refresh_serves_cached_panel() {
        let context = create_test_context();
        let article = Article {
            id: "world/1".to_string(),
            title: "Headline".to_string(),
            section: "World news".to_string(),
            url: "https://example.org/world/1".to_string(),
            published_at: Utc::now(),
            summary: None,
        };
        context
            .orchestrator()
            .durable()
            .set("news", &vec![article], Duration::from_secs(3600));

        let mut handle = RefreshHandle::spawn(&context, only_news());
        let message = handle.recv().await.expect("refresh message");

        match message {
            RefreshMessage::Updated {
                resource,
                panel: Panel::News(articles),
                source,
                ..
            } => {
                assert_eq!(resource, "news");
                assert_eq!(articles.len(), 1);
                assert_eq!(source, FetchSource::Durable);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_reports_failure_without_cache() {
        // No API key and nothing cached
        let context = create_test_context();

        let mut handle = RefreshHandle::spawn(&context, only_news());
        let message = handle.recv().await.expect("refresh message");

        assert!(matches!(
            message,
            RefreshMessage::Failed { ref resource, error: FetchError::RemoteRejected { .. } }
                if resource == "news"
        ));
        handle.shutdown().await;
    }
}
