//! Human duration tokens (`30m`, `2h`, `5d`).

use std::sync::OnceLock;

use regex::Regex;

static DURATION_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn duration_re() -> Option<&'static Regex> {
    DURATION_RE
        .get_or_init(|| Regex::new(r"(\d+)([smhd])").ok())
        .as_ref()
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit {
        "s" => Some(1),
        "m" => Some(60),
        "h" => Some(3600),
        "d" => Some(86_400),
        _ => None,
    }
}

/// Parse the first `<integer><unit>` token anywhere in `text` into seconds.
///
/// Units are `s`, `m`, `h`, `d`. Only the first match counts, so
/// `"5m or 2h"` is 300. Returns `None` when no token exists or the value
/// overflows.
pub fn parse_seconds(text: &str) -> Option<u64> {
    let caps = duration_re()?.captures(text)?;
    let amount = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let mult = unit_seconds(caps.get(2)?.as_str())?;
    amount.checked_mul(mult)
}

/// Render seconds as a short human string using the two largest non-zero units.
pub fn format_seconds(seconds: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "d"), (3600, "h"), (60, "m"), (1, "s")];

    if seconds == 0 {
        return "0s".to_string();
    }

    let mut rest = seconds;
    let mut parts = Vec::new();
    for (size, suffix) in UNITS {
        if rest >= size {
            parts.push(format!("{}{suffix}", rest / size));
            rest %= size;
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_seconds("45s"), Some(45));
        assert_eq!(parse_seconds("30m"), Some(1800));
        assert_eq!(parse_seconds("2h"), Some(7200));
        assert_eq!(parse_seconds("5d"), Some(432_000));
    }

    #[test]
    fn unknown_unit_is_not_found() {
        assert_eq!(parse_seconds("10x"), None);
        assert_eq!(parse_seconds("no duration here"), None);
        assert_eq!(parse_seconds(""), None);
    }

    #[test]
    fn token_is_found_anywhere_and_first_match_wins() {
        assert_eq!(parse_seconds("timeout @bob 10m please"), Some(600));
        assert_eq!(parse_seconds("5m or maybe 2h"), Some(300));
    }

    #[test]
    fn overflow_is_not_found() {
        assert_eq!(parse_seconds("99999999999999999999d"), None);
        assert_eq!(parse_seconds("18446744073709551615d"), None);
    }

    #[test]
    fn formats_two_largest_units() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_seconds(45), "45s");
        assert_eq!(format_seconds(600), "10m");
        assert_eq!(format_seconds(5400), "1h 30m");
        assert_eq!(format_seconds(2 * 86_400 + 3 * 3600 + 59), "2d 3h");
    }
}
