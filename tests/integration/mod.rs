//! Integration tests for db-fanout.

pub mod config_test;
pub mod decoration_test;
pub mod grouping_test;
pub mod routing_test;
