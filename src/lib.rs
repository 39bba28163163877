//! Skycast library
//!
//! Exposes the cache, upstream adapters, configuration and HTTP server so
//! the binary and integration tests share one implementation.

pub mod cache;
pub mod cli;
pub mod data;
pub mod server;
