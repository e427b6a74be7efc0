//! Race distance normalisation.
//!
//! All distances inside the crate are furlongs. Source strings come in
//! three shapes: already numeric (`"12.5"`), composite unit tokens
//! (`"2m 3f 210y"`) or garbage.

/// Furlongs per mile
pub const FURLONGS_PER_MILE: f64 = 8.0;

/// Yards per furlong
pub const YARDS_PER_FURLONG: f64 = 220.0;

/// Long-distance boundary used by the scoring bands (12f = 1m 4f)
pub const LONG_DISTANCE_FURLONGS: f64 = 12.0;

/// Convert a distance string to furlongs.
///
/// A fully numeric string is returned unchanged. Otherwise each
/// whitespace-separated token must be a number followed by `m`, `f` or `y`;
/// tokens that do not parse contribute nothing. Infinite and NaN values
/// count as unparseable. Never fails.
pub fn to_furlongs(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Ok(value) = trimmed.parse::<f64>() {
        return if value.is_finite() { value } else { 0.0 };
    }

    trimmed
        .split_whitespace()
        .filter_map(token_furlongs)
        .sum()
}

/// Parse one `<number><unit>` token.
fn token_furlongs(token: &str) -> Option<f64> {
    let token = token.to_ascii_lowercase();
    let unit = token.chars().last()?;
    let number = token[..token.len() - unit.len_utf8()]
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())?;

    match unit {
        'm' => Some(number * FURLONGS_PER_MILE),
        'f' => Some(number),
        'y' => Some(number / YARDS_PER_FURLONG),
        _ => None,
    }
}
