use serde::{Deserialize, Serialize};

/// Project label carried by every emitted record.
pub const PROJECT: &str = "extra-finance";

/// Display name and landing page of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolDescriptor {
    pub name: &'static str,
    pub url: &'static str,
}

pub const PROTOCOL: ProtocolDescriptor = ProtocolDescriptor {
    name: PROJECT,
    url: "https://app.extrafi.io",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Lending,
    LeveragedFarming,
}

impl PoolKind {
    pub fn label(&self) -> &'static str {
        match self {
            PoolKind::Lending => "Lending Pool",
            PoolKind::LeveragedFarming => "Leveraged Yield Farming",
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Unified pool record handed to the yield catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    /// `<contract address>-<chain>`, lowercased
    pub pool: String,
    pub chain: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub underlying_tokens: Vec<String>,
    pub pool_meta: String,
    pub tvl_usd: f64,
    pub apy_base: f64,
}

impl PoolRecord {
    pub fn is_finite(&self) -> bool {
        self.tvl_usd.is_finite() && self.apy_base.is_finite()
    }
}
