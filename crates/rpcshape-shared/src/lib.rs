//! Configuration and observability shared by rpcshape crates

pub mod config;
pub mod observability;

pub use config::*;
pub use observability::*;
