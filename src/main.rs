//! Briefing - news, market and weather in the terminal
//!
//! Thin consumer of the fetch pipeline: every command goes through the
//! orchestrator, so repeated runs are served from the durable cache and
//! outages degrade to stale data marked `(stale)`.

use clap::Parser;
use std::error::Error;

use briefing::cli::{parse_location, parse_symbols, CacheAction, Cli, CliError, Command};
use briefing::config::DashboardConfig;
use briefing::context::AppContext;
use briefing::data::{Article, Ticker, Translation, WeatherReport};
use briefing::fetch::{BatchItem, FetchError, FetchSource, Fetched};
use briefing::logging::init_logging;
use briefing::refresh::{Panel, RefreshConfig, RefreshHandle, RefreshMessage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Report errors with their Display text rather than Debug
    if let Err(e) = run(&cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let context = AppContext::new(config);

    match &cli.command {
        Command::News { .. } => show_news(&context).await?,
        Command::Market { symbols } => {
            let symbols = symbols.as_deref().map(parse_symbols).transpose()?;
            show_market(&context, symbols).await?;
        }
        Command::Weather { lat, lon } => {
            let location = parse_location(*lat, *lon)?;
            let fetched = context
                .orchestrator()
                .fetch(&context.weather_resource(location))
                .await?;
            print_weather(&fetched.data, stale_marker(&fetched));
        }
        Command::Translate { text, to } => {
            if text.trim().is_empty() {
                return Err(CliError::EmptyText.into());
            }
            let fetched = context
                .orchestrator()
                .fetch(&context.translation_resource(text, to.as_deref()))
                .await?;
            print_translation(&fetched.data, stale_marker(&fetched));
        }
        Command::All => show_all(&context).await,
        Command::Watch => watch(&context).await?,
        Command::Cache { action } => match action {
            CacheAction::Clear => {
                context.clear_caches();
                println!("Cache cleared");
            }
            CacheAction::Purge => {
                let removed = context.purge_expired();
                println!("Removed {removed} expired record(s)");
            }
        },
    }

    Ok(())
}

async fn show_news(context: &AppContext) -> Result<(), FetchError> {
    let fetched = context.orchestrator().fetch(&context.news_resource()).await?;
    print_news(&fetched.data, stale_marker(&fetched));
    Ok(())
}

async fn show_market(context: &AppContext, symbols: Option<Vec<String>>) -> Result<(), FetchError> {
    let fetched = context
        .orchestrator()
        .fetch(&context.market_resource(symbols))
        .await?;
    print_ticker(&fetched.data, stale_marker(&fetched));
    Ok(())
}

/// Fetches every panel concurrently; a failed panel does not hide the others
async fn show_all(context: &AppContext) {
    let orchestrator = context.orchestrator();
    let news_resource = context.news_resource();
    let market_resource = context.market_resource(None);
    let weather_resource = context.weather_resource(None);

    let (news, market, weather) = tokio::join!(
        orchestrator.fetch(&news_resource),
        orchestrator.fetch(&market_resource),
        orchestrator.fetch(&weather_resource),
    );

    match weather {
        Ok(fetched) => print_weather(&fetched.data, stale_marker(&fetched)),
        Err(e) => print_failure(&e),
    }
    println!();
    match market {
        Ok(fetched) => print_ticker(&fetched.data, stale_marker(&fetched)),
        Err(e) => print_failure(&e),
    }
    println!();
    match news {
        Ok(fetched) => print_news(&fetched.data, stale_marker(&fetched)),
        Err(e) => print_failure(&e),
    }
}

async fn watch(context: &AppContext) -> Result<(), Box<dyn Error>> {
    let mut handle = RefreshHandle::spawn(context, RefreshConfig::default());
    println!("Watching for updates, press Ctrl-C to stop");

    loop {
        tokio::select! {
            message = handle.recv() => match message {
                Some(RefreshMessage::Updated { panel, source, .. }) => {
                    let marker = if source == FetchSource::Stale { " (stale)" } else { "" };
                    println!();
                    match panel {
                        Panel::News(articles) => print_news(&articles, marker),
                        Panel::Market(ticker) => print_ticker(&ticker, marker),
                        Panel::Weather(report) => print_weather(&report, marker),
                    }
                }
                Some(RefreshMessage::Failed { error, .. }) => print_failure(&error),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn stale_marker<T>(fetched: &Fetched<T>) -> &'static str {
    if fetched.is_stale() {
        " (stale)"
    } else {
        ""
    }
}

fn print_failure(error: &FetchError) {
    println!("{}: unavailable ({error})", error.resource());
}

fn print_news(articles: &[Article], marker: &str) {
    println!("News{marker}");
    if articles.is_empty() {
        println!("  no headlines");
    }
    for article in articles {
        println!(
            "  {} [{}] {}",
            article.published_at.format("%H:%M"),
            article.section,
            article.title
        );
    }
}

fn print_ticker(ticker: &Ticker, marker: &str) {
    println!("Market{marker}");
    for item in ticker {
        match item {
            BatchItem::Ready { value: quote } => {
                let arrow = if quote.is_up() { "▲" } else { "▼" };
                println!(
                    "  {:<8} {:>10.2} {} {:+.2} ({:+.2}%)",
                    quote.symbol, quote.price, arrow, quote.change, quote.change_percent
                );
            }
            BatchItem::Placeholder { key, .. } => println!("  {key:<8} {:>10}", "--"),
        }
    }
}

fn print_weather(report: &WeatherReport, marker: &str) {
    println!("Weather{marker}");
    println!(
        "  {:.1}°C (feels {:.1}°C), {}",
        report.temperature,
        report.feels_like,
        report.condition.label()
    );
    println!(
        "  humidity {}%, wind {:.0} km/h, UV {:.1}",
        report.humidity, report.wind, report.uv
    );
    println!(
        "  sunrise {}, sunset {}",
        report.sunrise.format("%H:%M"),
        report.sunset.format("%H:%M")
    );
}

fn print_translation(translation: &Translation, marker: &str) {
    println!("{} ({}){marker}", translation.translated_text, translation.target);
}
