//! db-fanout - execution grouping for a sharding database proxy.
//!
//! This library exposes the core modules for use in integration tests.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod proxy;
pub mod report;
pub mod route;
pub mod rule;
