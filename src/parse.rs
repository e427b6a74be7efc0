//! Lenient parsers for scraped price and age strings.

/// Parse a price string into fractional odds.
///
/// `"5/2"` -> 2.5, `"3.5"` -> 3.5, `"Evs"` -> 1.0. Favourite markers
/// (`F`, `J`, `C`) are stripped. Returns `None` for anything else.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, 'F' | 'J' | 'C' | 'f' | 'j' | 'c'));

    if cleaned.is_empty() {
        return None;
    }

    let lower = cleaned.to_ascii_lowercase();
    if lower == "evs" || lower == "evens" || lower == "ev" {
        return Some(1.0);
    }

    if let Some((num, den)) = cleaned.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        return Some(num / den);
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the leading integer from an age string (`"5 years"`, `"5yo"`).
pub fn parse_age(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
