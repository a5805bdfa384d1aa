use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hazard_feed::apis::factory::create_source;
use hazard_feed::config::Config;
use hazard_feed::constants::get_supported_sources;
use hazard_feed::infra::http_client::ReqwestHttp;
use hazard_feed::infra::random::SharedRng;
use hazard_feed::pipeline::{Aggregator, SourceOutcome};
use hazard_feed::{logging, metrics, server};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hazard_feed")]
#[command(about = "Natural-hazard event feed aggregator")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (defaults to HAZARD_CONFIG or ./config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the aggregated feed over HTTP
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one aggregation and print the events as JSON
    Fetch {
        /// Specific sources to run (comma-separated). Available: usgs, firms, neo, hazards, gdacs, eonet, meteorites, nhc
        #[arg(long)]
        sources: Option<String>,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// List the known sources and whether they are enabled
    Sources,
}

fn build_aggregator(config: &Config, only: Option<&str>) -> anyhow::Result<Aggregator> {
    let http = Arc::new(
        ReqwestHttp::new(config.http_timeout(), &config.http.user_agent)
            .context("building HTTP client")?,
    );
    let rng = Arc::new(SharedRng::from_entropy());

    let Some(list) = only else {
        return Ok(Aggregator::from_config(config, http, rng));
    };

    let mut sources = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match create_source(name, config, http.clone(), rng.clone()) {
            Some(source) => sources.push(source),
            None => warn!("Unknown source: {}", name),
        }
    }
    if sources.is_empty() {
        bail!(
            "no known sources in '{}'; available: {}",
            list,
            get_supported_sources().join(", ")
        );
    }
    Ok(Aggregator::new(sources, config.source_timeout()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("HAZARD_CONFIG").ok());
    let mut config = Config::load(config_path.as_deref())?;

    // Held until exit so the file writer flushes
    let _log_guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            metrics::init_metrics();
            let aggregator = Arc::new(build_aggregator(&config, None)?);
            info!(sources = ?aggregator.source_names(), "Starting hazard feed server");
            server::start_server(aggregator, config.bind_addr()).await?;
        }
        Commands::Fetch { sources, pretty } => {
            let aggregator = build_aggregator(&config, sources.as_deref())?;
            let (events, reports) = aggregator.aggregate_with_report().await;
            for report in &reports {
                match &report.outcome {
                    SourceOutcome::Ok { count } => info!(source = report.source, count, "source ok"),
                    SourceOutcome::Failed { reason } => {
                        warn!(source = report.source, reason = %reason, "source failed")
                    }
                    SourceOutcome::TimedOut => warn!(source = report.source, "source timed out"),
                }
            }
            let json = if pretty {
                serde_json::to_string_pretty(&events)?
            } else {
                serde_json::to_string(&events)?
            };
            println!("{}", json);
        }
        Commands::Sources => {
            for name in get_supported_sources() {
                let state = if config.source_enabled(name) { "enabled" } else { "disabled" };
                println!("{:<8} {}", name, state);
            }
        }
    }

    Ok(())
}
