//! Fix-ups applied to AreTomo's IMOD-format output before import.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use tracing::warn;

// The list never spans lines; the line ending stays outside the match.
static EXCLUDELIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"EXCLUDELIST[ \t]+([^\r\n]*)").expect("valid regex"));

/// Strips trailing whitespace from every line of a `.tlt` file and drops
/// trailing blank lines. The result has no final newline.
pub fn trim_tlt(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Shifts `EXCLUDELIST` entries in `tilt.com` from 0-based to 1-based
/// section numbers and re-joins them with commas.
///
/// A list containing anything other than integers is left unchanged.
pub fn renumber_excludelist(text: &str) -> String {
    EXCLUDELIST
        .replace_all(text, |caps: &Captures| {
            let raw = &caps[1];
            let shifted: Result<Vec<String>, _> = raw
                .replace(',', " ")
                .split_whitespace()
                .map(|n| n.parse::<i64>().map(|n| (n + 1).to_string()))
                .collect();
            match shifted {
                Ok(numbers) => format!("EXCLUDELIST {}", numbers.join(",")),
                Err(_) => {
                    warn!(list = raw, "EXCLUDELIST is not a list of integers, leaving it as is");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
