//! Shared library surface for the routewatch service and its tests.

pub mod backoff;
pub mod config;
pub mod fix_source;
pub mod loops;
pub mod provider;
pub mod sink;
