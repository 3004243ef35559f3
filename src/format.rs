//! Rendering helpers for metadata formatting hints.
//!
//! The interpreter tags fields with a [`crate::schema::Formatting`] hint but
//! never formats values itself; renderers (and the contents summary) call
//! these.

use jiff::Timestamp;

/// Sentinel shown for a missing value.
pub const NONE_PLACEHOLDER: &str = "<none>";

/// Sentinel shown for absent output streams.
pub const NO_OUTPUT_PLACEHOLDER: &str = "(no output)";

/// Human duration in s/m/h/d units: `42s`, `1.5m`, `3h`, `2d`.
pub fn duration_str(seconds: f64) -> String {
    with_unit(seconds, &[("d", 86_400.0), ("h", 3_600.0), ("m", 60.0)], "s")
}

/// Binary byte size in k/m/g/t units: `512`, `4k`, `1.5g`.
#[allow(clippy::cast_precision_loss)] // display only
pub fn size_str(bytes: u64) -> String {
    with_unit(
        bytes as f64,
        &[
            ("t", 1_099_511_627_776.0),
            ("g", 1_073_741_824.0),
            ("m", 1_048_576.0),
            ("k", 1_024.0),
        ],
        "",
    )
}

/// ISO-like UTC timestamp from epoch seconds, e.g. `2016-03-01 14:05:00`.
/// Out-of-range values fall back to the raw number.
pub fn date_str(epoch_seconds: i64) -> String {
    match Timestamp::from_second(epoch_seconds) {
        Ok(ts) => ts.strftime("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => epoch_seconds.to_string(),
    }
}

/// Render an optional value, substituting [`NONE_PLACEHOLDER`] when absent.
pub fn contents_str(value: Option<&str>) -> String {
    value.unwrap_or(NONE_PLACEHOLDER).to_string()
}

/// Like [`contents_str`], but absent or empty output reads as
/// [`NO_OUTPUT_PLACEHOLDER`].
pub fn verbose_contents_str(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => NO_OUTPUT_PLACEHOLDER.to_string(),
    }
}

/// Pick the largest unit with magnitude at least one and format with at
/// most one decimal place.
fn with_unit(value: f64, units: &[(&str, f64)], base_unit: &str) -> String {
    for (suffix, scale) in units {
        if value >= *scale {
            return format!("{}{suffix}", trim_decimal(value / scale));
        }
    }
    format!("{}{base_unit}", trim_decimal(value))
}

fn trim_decimal(value: f64) -> String {
    let formatted = format!("{value:.1}");
    formatted
        .strip_suffix(".0")
        .map_or(formatted.clone(), ToString::to_string)
}
