//! Conversion of the platform's compact `PT#H#M#S` duration tokens.

use std::sync::LazyLock;

use regex::Regex;

/// Value returned when a token cannot be understood at all.
pub const ZERO_DURATION: &str = "00:00:00";

static DURATION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("duration pattern compiles")
});

/// Normalizes a duration token such as `PT1H2M10S` into `HH:MM:SS`.
///
/// Groups are optional but must appear in H, M, S order. Only the prefix of the
/// token has to match, so trailing data is ignored. Anything that does not
/// start with `PT` yields [`ZERO_DURATION`]; a malformed duration is a data
/// quality problem, never an error. Hours are not wrapped at 24.
pub fn parse(token: &str) -> String {
    total_seconds(token)
        .map(format_seconds)
        .unwrap_or_else(|| ZERO_DURATION.to_string())
}

/// Total number of seconds described by `token`, or `None` when the token does
/// not follow the grammar (or overflows).
pub fn total_seconds(token: &str) -> Option<u64> {
    let captures = DURATION_TOKEN.captures(token.trim())?;
    let group = |index: usize| -> Option<u64> {
        match captures.get(index) {
            Some(value) => value.as_str().parse().ok(),
            None => Some(0),
        }
    };

    group(1)?
        .checked_mul(3600)?
        .checked_add(group(2)?.checked_mul(60)?)?
        .checked_add(group(3)?)
}

/// Renders a second count as zero-padded `HH:MM:SS`.
pub fn format_seconds(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
