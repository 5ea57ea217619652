//! # Extra Finance Yields
//!
//! Yield adaptor for Extra Finance on Optimism. Produces one normalized pool
//! record per lending reserve and per leveraged farming vault, each carrying a
//! USD TVL and a base APY.
//!
//! ## Overview
//!
//! A single call to [`PoolAggregator::get_pools_data`] reads one snapshot of
//! protocol state and turns it into records:
//!
//! - **Raw data**: vaults and lending reserves from the protocol subgraph
//! - **Pricing**: one batch request for every token involved
//! - **Lending**: supplied liquidity valued in USD, borrow rate compounded to APY
//! - **Vaults**: LP positions unwrapped into token amounts, leverage debt attached
//! - **Aggregation**: lending records first, then vault records, non-finite dropped
//!
//! ## Architecture
//!
//! ### Sources
//! Every upstream sits behind a trait ([`RawDataSource`], [`PriceSource`],
//! [`LpUnwrapper`], [`FarmRateSource`]) so the pipeline runs unchanged against
//! live endpoints or in-memory fixtures.
//!
//! ### Engines
//! The lending and vault engines are pure over their inputs. Numeric work is
//! done in `Decimal` and converted to `f64` only when a record is assembled.

// Core Types
/// Raw subgraph rows, pool records and numeric conversions
pub mod types;
/// Chain labels, pool keys and record filters
pub mod utils;
/// Fixed-point helpers for on-chain integer amounts
pub mod normalization;

// Sources
/// Token price lookup and the price service client
pub mod price_resolver;
/// Protocol subgraph client
pub mod subgraph;
/// LP token decomposition into underlying amounts
pub mod lp_unwrap;
/// Farming reward rates per pair
pub mod farm_rates;
/// Smart contract ABIs (read-only)
pub mod contracts;

// Engines
/// Lending reserve TVL and APY
pub mod lending;
/// Leveraged vault TVL and APY
pub mod vault_metrics;
/// Pipeline root producing pool records
pub mod aggregator;

// Infrastructure
/// Configuration management
pub mod settings;
/// Metrics and observability
pub mod metrics;

// Re-exports for convenience
pub use aggregator::{AggregatorConfig, AggregatorError, PoolAggregator};
pub use farm_rates::{FarmRateSource, StaticFarmRates};
pub use lp_unwrap::{LpUnwrapper, UniswapV2LpUnwrapper};
pub use price_resolver::{LlamaPriceClient, PriceSource};
pub use settings::Settings;
pub use subgraph::{RawDataSource, SubgraphClient};
pub use types::{PoolRecord, PROJECT, PROTOCOL};
