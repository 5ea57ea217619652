// Types Module - subgraph rows, output records and numeric conversions

pub mod conversions;
pub mod pool_record;
pub mod raw;

pub use pool_record::{PoolKind, PoolRecord, ProtocolDescriptor, PROJECT, PROTOCOL};
pub use raw::{RawFarmVault, RawLendingReserve, SubgraphSnapshot};
