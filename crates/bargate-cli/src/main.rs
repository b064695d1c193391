use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use bargate_adapters::registry::AdapterRegistry;
use bargate_adapters::resolve::{BarQuery, QueryError, QueryResolver};
use bargate_adapters::timeparse;
use bargate_core::{BarStore, Period, SourceCatalog};

#[derive(Parser)]
#[command(name = "bargate", about = "Query and manage OHLC bar data")]
struct Cli {
    /// Root directory for data storage (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Path to the source catalog JSON file
    #[arg(long, default_value = "sources.json")]
    sources: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch bars for a symbol, stored data first, then live sources
    Bars {
        /// Ticker symbol
        #[arg(short, long)]
        symbol: String,

        /// Restrict the query to one source (name or id)
        #[arg(long)]
        source: Option<String>,

        /// Bar granularity: 1m, 5m, 1h, 1d
        #[arg(long, default_value = "1d")]
        period: Period,

        /// Range start (RFC 3339, date, or epoch seconds)
        #[arg(long)]
        start: Option<String>,

        /// Range end (RFC 3339, date, or epoch seconds)
        #[arg(long)]
        end: Option<String>,

        /// Emit bars as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List configured data sources
    Sources,

    /// List symbols a source can serve
    Symbols {
        /// Source to ask (name or id); all enabled sources if omitted
        #[arg(long)]
        source: Option<String>,
    },

    /// Fetch bars from a source and persist them to the store
    Import {
        /// Source to fetch from (name or id)
        #[arg(long)]
        source: String,

        /// Ticker symbol
        #[arg(short, long)]
        symbol: String,

        /// Bar granularity: 1m, 5m, 1h, 1d
        #[arg(long, default_value = "1d")]
        period: Period,

        /// Range start (RFC 3339, date, or epoch seconds)
        #[arg(long)]
        start: Option<String>,

        /// Range end (RFC 3339, date, or epoch seconds)
        #[arg(long)]
        end: Option<String>,
    },
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(text) => timeparse::parse_timestamp(text)
            .map(Some)
            .with_context(|| format!("invalid {name} timestamp: {text}")),
    }
}

async fn cmd_bars(
    resolver: &QueryResolver<'_>,
    symbol: &str,
    source: Option<&str>,
    period: Period,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let mut query = BarQuery::new(symbol.to_uppercase())
        .with_period(period)
        .with_range(start, end);
    if let Some(source) = source {
        query = query.with_source(source);
    }

    let resolution = match resolver.resolve(&query).await {
        Ok(resolution) => resolution,
        Err(QueryError::NoDataFound { symbol }) => {
            println!("No data found for {symbol}.");
            return Ok(());
        }
        Err(e) => return Err(e).context("query failed"),
    };

    let origin = if resolution.from_store { "store" } else { "live" };
    info!(
        "{}: {} bar(s) from {} ({origin})",
        query.symbol,
        resolution.bars.len(),
        resolution.source,
    );

    if json {
        let text = serde_json::to_string_pretty(&resolution.bars)
            .context("failed to serialize bars")?;
        println!("{text}");
    } else {
        for bar in &resolution.bars {
            println!(
                "{}  o={:<10} h={:<10} l={:<10} c={:<10} v={}",
                bar.timestamp.to_rfc3339(),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume,
            );
        }
    }

    Ok(())
}

fn cmd_sources(catalog: &SourceCatalog, registry: &AdapterRegistry) -> Result<()> {
    if catalog.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    for source in catalog.iter() {
        let id = source
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = if source.enabled { "enabled" } else { "disabled" };
        let known = registry.kinds().any(|k| k == source.kind);
        let note = if known { "" } else { "  (unregistered type)" };
        println!("{id:>4}  {:<20} {:<10} {state}{note}", source.name, source.kind);
    }

    Ok(())
}

async fn cmd_symbols(
    catalog: &SourceCatalog,
    registry: &AdapterRegistry,
    source: Option<&str>,
) -> Result<()> {
    let sources: Vec<_> = match source {
        Some(key) => vec![
            catalog
                .find(key)
                .with_context(|| format!("data source '{key}' not found"))?,
        ],
        None => catalog.enabled().collect(),
    };

    for descriptor in sources {
        let adapter = registry
            .resolve(descriptor)
            .with_context(|| format!("failed to build adapter for '{}'", descriptor.name))?;
        let symbols = adapter
            .list_symbols()
            .await
            .with_context(|| format!("failed to list symbols for '{}'", descriptor.name))?;

        if symbols.is_empty() {
            println!("{}: no symbols", descriptor.name);
            continue;
        }

        for symbol in &symbols {
            let periods: Vec<&str> = symbol.periods.iter().map(|p| p.as_str()).collect();
            println!(
                "{}: {} ({})",
                descriptor.name,
                symbol.symbol,
                periods.join(", ")
            );
        }
    }

    Ok(())
}

async fn cmd_import(
    catalog: &SourceCatalog,
    registry: &AdapterRegistry,
    store: &BarStore,
    source: &str,
    symbol: &str,
    period: Period,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    let descriptor = catalog
        .find(source)
        .with_context(|| format!("data source '{source}' not found"))?;
    let adapter = registry
        .resolve(descriptor)
        .with_context(|| format!("failed to build adapter for '{}'", descriptor.name))?;

    let symbol = symbol.to_uppercase();
    let bars = adapter
        .fetch_bars(&symbol, period, start, end)
        .await
        .with_context(|| format!("fetch from '{}' failed", descriptor.name))?;

    if bars.is_empty() {
        println!("{symbol}: '{}' returned no bars, nothing written.", descriptor.name);
        return Ok(());
    }

    store
        .write_bars(&descriptor.name, &symbol, &bars)
        .with_context(|| format!("failed to write {symbol}"))?;
    info!(
        "{symbol}: wrote {} bar(s) from {}",
        bars.len(),
        descriptor.name
    );

    Ok(())
}

fn load_catalog(path: &PathBuf) -> Result<SourceCatalog> {
    if !path.exists() {
        return Ok(SourceCatalog::default());
    }
    SourceCatalog::load(path)
        .with_context(|| format!("failed to load source catalog from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let store = BarStore::new(&cli.data_dir);
    let catalog = load_catalog(&cli.sources)?;
    let registry = AdapterRegistry::with_builtins();

    match &cli.command {
        Commands::Bars {
            symbol,
            source,
            period,
            start,
            end,
            json,
        } => {
            let start = parse_bound(start.as_deref(), "start")?;
            let end = parse_bound(end.as_deref(), "end")?;
            let resolver = QueryResolver::new(&registry, &store, &catalog);
            cmd_bars(
                &resolver,
                symbol,
                source.as_deref(),
                *period,
                start,
                end,
                *json,
            )
            .await?;
        }
        Commands::Sources => {
            cmd_sources(&catalog, &registry)?;
        }
        Commands::Symbols { source } => {
            cmd_symbols(&catalog, &registry, source.as_deref()).await?;
        }
        Commands::Import {
            source,
            symbol,
            period,
            start,
            end,
        } => {
            let start = parse_bound(start.as_deref(), "start")?;
            let end = parse_bound(end.as_deref(), "end")?;
            cmd_import(
                &catalog, &registry, &store, source, symbol, *period, start, end,
            )
            .await?;
        }
    }

    Ok(())
}
