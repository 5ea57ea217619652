// src/utils.rs
// Formatting helpers shared by the pool record assembly

use crate::types::PoolRecord;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static CHAIN_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("optimism", "Optimism"),
        ("ethereum", "Ethereum"),
        ("arbitrum", "Arbitrum"),
        ("base", "Base"),
        ("bsc", "Binance"),
        ("avax", "Avalanche"),
        ("xdai", "xDai"),
        ("polygon", "Polygon"),
    ])
});

/// Display label for a chain identifier (`optimism` -> `Optimism`).
/// Unknown chains get their first letter uppercased.
pub fn format_chain(chain: &str) -> String {
    let key = chain.trim().to_lowercase();
    if let Some(label) = CHAIN_LABELS.get(key.as_str()) {
        return label.to_string();
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Pool key: `<address>-<chain>`, lowercased.
pub fn pool_key(address: &str, chain: &str) -> String {
    format!("{}-{}", address.trim(), chain).to_lowercase()
}

pub fn keep_finite(record: &PoolRecord) -> bool {
    record.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_and_unknown_chains() {
        assert_eq!(format_chain("optimism"), "Optimism");
        assert_eq!(format_chain("bsc"), "Binance");
        assert_eq!(format_chain("mode"), "Mode");
        assert_eq!(format_chain(""), "");
    }

    #[test]
    fn pool_key_is_case_normalized() {
        assert_eq!(
            pool_key("0xAbCdEF", "optimism"),
            "0xabcdef-optimism"
        );
    }

    #[test]
    fn keep_finite_rejects_nan_and_infinity() {
        let mut record = PoolRecord {
            pool: "p".into(),
            chain: "Optimism".into(),
            project: "extra-finance".into(),
            symbol: None,
            underlying_tokens: vec![],
            pool_meta: "Lending Pool".into(),
            tvl_usd: 1.0,
            apy_base: 0.0,
        };
        assert!(keep_finite(&record));
        record.tvl_usd = f64::NAN;
        assert!(!keep_finite(&record));
        record.tvl_usd = 1.0;
        record.apy_base = f64::INFINITY;
        assert!(!keep_finite(&record));
    }
}
