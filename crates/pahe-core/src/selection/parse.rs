//! Selection expression parser.

use super::{EpisodeSelection, SelectionError};

/// Parses a comma-separated selection expression.
///
/// Each token is `N` or `A-B` (inclusive, `A <= B`); whitespace around tokens
/// and around the range bounds is ignored, and empty tokens (`"1,,2"`,
/// trailing commas) are skipped. An expression with no tokens at all is
/// rejected. When `max_valid` is given, any value above it fails with
/// [`SelectionError::OutOfBounds`].
///
/// # Examples
///
/// - `parse("1-3,5,2", None)` → `{1,2,3,5}`
/// - `parse("3-1", None)` → `InvalidRangeSyntax`
/// - `parse("1-10", Some(5))` → `OutOfBounds`
pub fn parse(expression: &str, max_valid: Option<u32>) -> Result<EpisodeSelection, SelectionError> {
    let mut ranges = Vec::new();

    for raw in expression.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        let (start, end) = parse_token(token)?;
        if let Some(max) = max_valid {
            if end > max {
                return Err(SelectionError::OutOfBounds { value: end, max });
            }
        }
        ranges.push(start..=end);
    }

    if ranges.is_empty() {
        return Err(invalid(expression.trim()));
    }

    Ok(EpisodeSelection::from_ranges(ranges))
}

fn parse_token(token: &str) -> Result<(u32, u32), SelectionError> {
    match token.split_once('-') {
        None => {
            let n = parse_positive(token).ok_or_else(|| invalid(token))?;
            Ok((n, n))
        }
        Some((a, b)) => {
            let start = parse_positive(a.trim()).ok_or_else(|| invalid(token))?;
            let end = parse_positive(b.trim()).ok_or_else(|| invalid(token))?;
            if start > end {
                return Err(invalid(token));
            }
            Ok((start, end))
        }
    }
}

/// Digits only (no sign), value >= 1, fits in u32.
fn parse_positive(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|&n| n >= 1)
}

fn invalid(token: &str) -> SelectionError {
    SelectionError::InvalidRangeSyntax {
        token: token.to_string(),
    }
}
