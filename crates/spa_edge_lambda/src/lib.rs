//! AWS-oriented adapters and handlers for the SPA edge stack.
//!
//! This crate owns runtime integration details (the Lambda entry point, the
//! router adapter, static origin and invalidation adapters, deployment sync)
//! and builds on the provider-free primitives in `spa_edge_core`.

pub mod adapters;
pub mod error;
pub mod handlers;
pub mod telemetry;
