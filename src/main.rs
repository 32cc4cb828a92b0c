use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedwall::aggregator::Aggregator;
use feedwall::cli::{Cli, Commands};
use feedwall::config::{Config, SourceConfig};
use feedwall::domain::{FeedEvent, QueryList, SourceType};
use feedwall::errors::FeedwallError;
use feedwall::sources::{ParseContext, SourceRegistry};
use feedwall::transport::{HttpTransport, Transport};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedwall=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Run {
            duration,
            show_purges,
        } => cmd_run(config, duration.map(Duration::from_secs), show_purges).await,
        Commands::Fetch { source, queries } => cmd_fetch(&config, &source, queries).await,
        Commands::Sources => cmd_sources(&config),
        Commands::Config => cmd_config(&config),
    }
}

async fn cmd_run(config: Config, duration: Option<Duration>, show_purges: bool) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(config.aggregator.request_timeout()));
    let (mut aggregator, mut events) = Aggregator::new(config.aggregator, transport);

    for (source, error) in aggregator.disabled_sources() {
        eprintln!("Skipping {}: {}", source, error);
    }

    if aggregator.source_count() == 0 {
        println!("No sources configured.");
        return Ok(());
    }

    let sources: Vec<String> = aggregator.sources().iter().map(|s| s.to_string()).collect();
    println!("Polling {} (Ctrl-C to stop)\n", sources.join(", "));

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    aggregator.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(FeedEvent::CachePurged(items)) if show_purges => {
                    println!("[cache] {} valid items", items.len());
                    for item in &items {
                        println!("  {}", FeedEvent::NewItem(item.clone()).format());
                    }
                }
                Some(FeedEvent::CachePurged(_)) => {}
                Some(event) => println!("{}", event.format()),
                None => break,
            },
        }
    }

    aggregator.shutdown().await;

    let items = aggregator.valid_items();
    println!("\nStopped with {} valid items.", items.len());

    Ok(())
}

async fn cmd_fetch(config: &Config, source: &str, queries: Vec<String>) -> Result<()> {
    let source_type: SourceType = source.parse().map_err(FeedwallError::UnsupportedSource)?;

    let source_config = config
        .aggregator
        .sources
        .get(&source_type)
        .cloned()
        .unwrap_or_default();
    let adapter = SourceRegistry::build(source_type, &source_config, &config.aggregator)?;

    let queries: QueryList = if queries.is_empty() {
        source_config.queries.clone()
    } else {
        queries.into_iter().collect()
    };

    let Some(request) = adapter.build_query(&queries) else {
        println!("No search terms for {}.", source_type);
        return Ok(());
    };

    println!("Fetching {}...\n", request.url);

    let transport = HttpTransport::new(config.aggregator.request_timeout());
    let response = transport
        .fetch(&request)
        .await
        .with_context(|| format!("request to {} failed", source_type))?;

    if !response.is_ok() {
        println!("{} answered HTTP {}.", source_type, response.status);
        return Ok(());
    }

    let context = ParseContext::new(config.aggregator.min_date_at(Utc::now()), request.url);
    let items = adapter.process_response(&response.body, &context);

    if items.is_empty() {
        println!("No items.");
        return Ok(());
    }

    for item in &items {
        println!("{}", FeedEvent::NewItem(item.clone()).format());
    }
    println!("\n{} items.", items.len());

    Ok(())
}

fn cmd_sources(config: &Config) -> Result<()> {
    if config.aggregator.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!("Configured sources:\n");
    for (source, source_config) in &config.aggregator.sources {
        print_source(*source, source_config);
    }

    Ok(())
}

fn print_source(source: SourceType, source_config: &SourceConfig) {
    let state = if source_config.enabled { "enabled" } else { "disabled" };
    println!(
        "  {} [{}] every {}s",
        source, state, source_config.interval_secs
    );
    if let Some(endpoint) = &source_config.endpoint {
        println!("    Endpoint: {}", endpoint);
    }

    let terms: Vec<String> = source_config.queries.clone().into();
    if !terms.is_empty() {
        println!("    Terms: {}", terms.join(", "));
    }
    println!();
}

fn cmd_config(config: &Config) -> Result<()> {
    if let Some(path) = &config.config_path {
        eprintln!("Loaded from {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config.aggregator)?);
    Ok(())
}
