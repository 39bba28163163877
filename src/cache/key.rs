//! Cache key derivation
//!
//! Coordinates are rounded to two decimal places (roughly a 1 km grid) so
//! that nearby requests share a cache entry.

/// Rounds a coordinate to two decimal places, half away from zero
fn round_to_grid(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // -0.0 and 0.0 must produce the same key
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Builds a cache key from a namespace prefix and a coordinate pair
///
/// The key has the form `"{prefix}:{lat},{lon}"` with both coordinates
/// rounded to the grid.
pub fn geo_key(lat: f64, lon: f64, prefix: &str) -> String {
    format!("{}:{},{}", prefix, round_to_grid(lat), round_to_grid(lon))
}

/// Builds a cache key for a free-text query, ignoring case and surrounding
/// whitespace
pub fn query_key(prefix: &str, query: &str) -> String {
    format!("{}:{}", prefix, query.trim().to_lowercase())
}
