//! Raw records as indexed by the Extra Finance subgraph.
//!
//! Every field is declared and defaulted so that a partially populated
//! subgraph row still deserializes; numeric fields stay decimal strings until
//! a metrics engine parses them.

use crate::types::conversions::{parse_base_units, parse_u256_str};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// One lending reserve (`lendingReservePools` entity).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLendingReserve {
    pub id: String,
    pub reserve_id: String,
    pub underlying_token_address: String,
    pub e_token_address: String,
    pub total_liquidity: String,
    pub total_borrows: String,
    pub borrowing_rate: String,
}

impl RawLendingReserve {
    /// Total liquidity in underlying base units, `None` when malformed.
    pub fn total_liquidity_units(&self) -> Option<U256> {
        parse_base_units(&self.total_liquidity).ok()
    }

    pub fn total_borrows_units(&self) -> Option<U256> {
        parse_base_units(&self.total_borrows).ok()
    }

    pub fn has_liquidity(&self) -> bool {
        self.total_liquidity_units()
            .map(|v| !v.is_zero())
            .unwrap_or(false)
    }
}

/// One leveraged farming vault (`vaults` entity).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFarmVault {
    pub id: String,
    pub vault_id: String,
    pub block_number: String,
    pub block_timestamp: String,
    pub pair: String,
    pub token0: String,
    pub token1: String,
    pub stable: bool,
    pub paused: bool,
    pub frozen: bool,
    pub borrowing_enabled: bool,
    pub max_leverage: String,
    pub total_lp: String,
    pub debt_position_id0: Option<String>,
    pub debt_position_id1: Option<String>,
}

impl RawFarmVault {
    pub fn total_lp_units(&self) -> Option<U256> {
        parse_u256_str(&self.total_lp).ok()
    }

    pub fn has_lp(&self) -> bool {
        self.total_lp_units().map(|v| !v.is_zero()).unwrap_or(false)
    }

    /// A vault is processed only when it is live and holds LP.
    pub fn is_eligible(&self) -> bool {
        !self.paused && self.has_lp()
    }

    /// Non-empty debt position ids, in slot order.
    pub fn debt_position_ids(&self) -> impl Iterator<Item = &str> {
        [&self.debt_position_id0, &self.debt_position_id1]
            .into_iter()
            .filter_map(|id| id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Point-in-time subgraph document for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubgraphSnapshot {
    pub vaults: Vec<RawFarmVault>,
    pub lending_reserve_pools: Vec<RawLendingReserve>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "vaults": [{
            "id": "0x01",
            "vaultId": "1",
            "pair": "0xPAIR",
            "token0": "0xA",
            "token1": "0xB",
            "stable": false,
            "paused": false,
            "frozen": false,
            "borrowingEnabled": true,
            "maxLeverage": "300",
            "totalLp": "5000",
            "debtPositionId0": "2",
            "debtPositionId1": null
        }],
        "lendingReservePools": [{
            "id": "0x02",
            "reserveId": "2",
            "underlyingTokenAddress": "0xA",
            "eTokenAddress": "0xE",
            "totalLiquidity": "1000",
            "totalBorrows": "10",
            "borrowingRate": "50000000000000000"
        }]
    }"#;

    #[test]
    fn deserializes_subgraph_document() {
        let snapshot: SubgraphSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        assert_eq!(snapshot.vaults.len(), 1);
        assert_eq!(snapshot.lending_reserve_pools[0].reserve_id, "2");
        assert_eq!(snapshot.vaults[0].total_lp, "5000");
        assert_eq!(
            snapshot.vaults[0].debt_position_ids().collect::<Vec<_>>(),
            vec!["2"]
        );
    }

    #[test]
    fn missing_fields_default() {
        let vault: RawFarmVault = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(!vault.paused);
        assert!(!vault.is_eligible());
        assert_eq!(vault.debt_position_ids().count(), 0);
    }

    #[test]
    fn paused_vault_is_not_eligible() {
        let vault = RawFarmVault {
            total_lp: "10".to_string(),
            paused: true,
            ..Default::default()
        };
        assert!(vault.has_lp());
        assert!(!vault.is_eligible());
    }

    #[test]
    fn zero_or_malformed_liquidity_is_filtered() {
        let mut reserve = RawLendingReserve {
            total_liquidity: "0".to_string(),
            ..Default::default()
        };
        assert!(!reserve.has_liquidity());
        reserve.total_liquidity = "n/a".to_string();
        assert!(!reserve.has_liquidity());
        reserve.total_liquidity = "1".to_string();
        assert!(reserve.has_liquidity());
    }

    #[test]
    fn liquidity_above_decimal_range_still_counts() {
        let reserve = RawLendingReserve {
            total_liquidity: "200000000000000000000000000000".to_string(),
            total_borrows: "900000000000000000000000000000".to_string(),
            ..Default::default()
        };
        assert!(reserve.has_liquidity());
        assert_eq!(
            reserve.total_borrows_units(),
            Some(U256::from(9u64) * U256::exp10(29))
        );
    }
}
