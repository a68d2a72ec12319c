//! Chain registry
//!
//! Maps numeric chain ids to the hosted transaction service and the block
//! explorer used for links in console output.

pub mod chains;

pub use chains::{chain_by_name, chain_info, ChainInfo, CHAINS, LOCAL};
