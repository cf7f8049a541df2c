//! `rpcshape`: convenience façade that re-exports `rpcshape-core` and the
//! configuration and observability pieces of `rpcshape-shared`.

#![deny(missing_docs)]

/// Re-export **everything** from rpcshape-core at the crate root, so users can `use rpcshape::*;`.
#[doc(inline)]
pub use rpcshape_core::*;

/// Also expose rpcshape-core as a nested module for `rpcshape::core::...` paths.
pub use rpcshape_core as core;

/// Configuration loading and the tracing/metrics bootstrap.
#[doc(inline)]
pub use rpcshape_shared::{
    FieldCase, ObservabilityConfig, ObservabilitySystem, RpcActionConfig, RpcShapeConfig,
};

pub use rpcshape_shared as shared;
