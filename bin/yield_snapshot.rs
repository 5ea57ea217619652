//! # Yield Snapshot
//!
//! One-shot run of the Extra Finance adaptor: reads the configuration, builds
//! the live collaborators (subgraph, price service, RPC pair reader) and
//! prints the resulting pool records as a JSON array on stdout.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin yield_snapshot -- --pretty
//! cargo run --bin yield_snapshot -- --config Config.toml --chain optimism
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use ethers::prelude::{Http, Provider};
use extra_finance_yields::{
    metrics, AggregatorConfig, LlamaPriceClient, PoolAggregator, Settings, SubgraphClient,
    UniswapV2LpUnwrapper,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "yield_snapshot", about = "Print Extra Finance pool records as JSON")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "Config.toml")]
    config: PathBuf,

    /// Chain to query, overrides the configured one
    #[arg(long)]
    chain: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn init_logging() {
    #[cfg(feature = "observability")]
    tracing_subscriber::fmt().json().with_writer(std::io::stderr).init();

    #[cfg(not(feature = "observability"))]
    env_logger::init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_logging();
    metrics::describe_metrics();

    let args = Args::parse();

    let mut settings = Settings::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(chain) = args.chain {
        settings.protocol.chain = chain.to_lowercase();
    }
    info!("Settings loaded for chain {}", settings.protocol.chain);

    let subgraph = SubgraphClient::new(
        settings.subgraph.urls.clone(),
        settings.subgraph_timeout(),
        settings.subgraph.max_retries,
        settings.subgraph.retry_base_ms,
    )?;
    let prices = LlamaPriceClient::new(
        &settings.price_service.base_url,
        settings.price_service_timeout(),
    )?;
    let provider = Provider::<Http>::try_from(settings.rpc.http_url.as_str())
        .with_context(|| format!("invalid RPC url {}", settings.rpc.http_url))?;
    let unwrapper = UniswapV2LpUnwrapper::new(Arc::new(provider));

    let aggregator = PoolAggregator::new(
        AggregatorConfig::from_settings(&settings),
        Arc::new(subgraph),
        Arc::new(prices),
        Arc::new(unwrapper),
        Arc::new(settings.farm_rate_table()),
    );

    let records = aggregator.get_pools_data().await?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    println!("{}", json);
    Ok(())
}
