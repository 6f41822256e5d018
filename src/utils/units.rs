//! Parsing of human-friendly sizes ("500 KiB") and timespans ("3 days"),
//! mapped onto integer bytes and real seconds.

use bytesize::ByteSize;

use crate::utils::errors::SimulationError;

/// One simulated year, matching the definition used by timespan parsing
/// (365.25 days).
pub const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Parse a size with an optional binary or decimal suffix ("1 MiB",
/// "500 KiB", "2GB") into a byte count.
pub fn parse_size(text: &str) -> Result<u64, SimulationError> {
    text.parse::<ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|_| SimulationError::InvalidSize(text.to_string()))
}

/// Parse a timespan with unit suffixes ("30 s", "5 minutes", "8 hours",
/// "3 days", "100 years") into seconds.
pub fn parse_timespan(text: &str) -> Result<f64, SimulationError> {
    // humantime wants the value and its unit juxtaposed
    let compact: String = text.split_whitespace().collect();
    humantime::parse_duration(&compact)
        .map(|duration| duration.as_secs_f64())
        .map_err(|_| SimulationError::InvalidTimespan(text.to_string()))
}
