// src/farm_rates.rs
//
// Farming base rate of a vault's own (unlevered) capital, by pair.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Source of the farming APR (percentage) a pair earns on deposited capital.
#[async_trait]
pub trait FarmRateSource: Send + Sync {
    /// `None` when the pair has no known rate.
    async fn farm_apr(&self, chain: &str, pair: &str) -> Option<Decimal>;
}

/// Fixed table of rates keyed by lowercased pair address, usually loaded from
/// the `[farm_rates]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticFarmRates {
    rates: HashMap<String, Decimal>,
}

impl StaticFarmRates {
    pub fn new<I, K>(rates: I) -> Self
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        let rates = rates
            .into_iter()
            .map(|(pair, apr)| (pair.as_ref().trim().to_lowercase(), apr))
            .collect();
        Self { rates }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[async_trait]
impl FarmRateSource for StaticFarmRates {
    async fn farm_apr(&self, _chain: &str, pair: &str) -> Option<Decimal> {
        self.rates.get(&pair.trim().to_lowercase()).copied()
    }
}
