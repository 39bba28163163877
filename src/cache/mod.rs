//! Cache module for short-lived upstream responses
//!
//! This module provides an in-memory TTL cache with an injectable clock and
//! the key builders used to group nearby coordinates into one entry.

mod clock;
mod key;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{geo_key, query_key};
pub use manager::TtlCache;
