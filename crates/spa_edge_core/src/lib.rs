//! Provider-free primitives for the SPA edge topology.
//!
//! This crate owns the invocation contract and the declarative description of
//! the stack (route rules, cache policies, fallback mappings, origin settings).
//! Rule selection, fallback substitution and gateway host derivation are pure
//! functions over that data. It intentionally excludes AWS SDK and Lambda
//! runtime concerns; those live in `spa_edge_lambda`.

pub mod contract;
pub mod distribution;
pub mod fallback;
pub mod gateway;
pub mod invalidation;
pub mod origin_store;
pub mod routing;
pub mod topology;
