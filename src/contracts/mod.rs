// Contracts Module - Public ABIs Only

pub mod i_uniswap_v2_pair;

pub use i_uniswap_v2_pair::IUniswapV2Pair;
