//! Value parsing helpers for scraped text
//!
//! Shop pages render numbers with thousands separators, decimal commas and
//! unit suffixes ("24 990,-", "512 GB", "4,6 GHz"). These helpers strip the
//! junk and normalize to plain numeric values before records are persisted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Parses an integer out of noisy cell text
///
/// Keeps digits and decimal separators, treats a comma as a decimal point,
/// and truncates any fractional part. Returns None when nothing numeric
/// survives.
pub fn parse_int(value: &str) -> Option<i64> {
    parse_float(value).map(|f| f as i64)
}

/// Parses a float out of noisy cell text
pub fn parse_float(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

static CORES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:jader|jádra|jádrový|cores?)").unwrap());
static GHZ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*ghz").unwrap());
static MHZ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*mhz").unwrap());

const CPU_BRANDS: [&str; 7] = ["intel", "amd", "apple", "ryzen", "core", "xeon", "celeron"];

/// Extracted processor attributes from one spec cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessorInfo {
    /// Full model string, kept verbatim when a known CPU brand is present
    pub model: Option<String>,

    /// Core count when the cell states one
    pub cores: Option<i64>,

    /// Frequency normalized to GHz (MHz values are converted)
    pub frequency_ghz: Option<f64>,
}

/// Parses processor model, core count and frequency from a spec-table cell
///
/// Handles the mixed forms shops use, e.g.
/// "Intel Core i7-14700K (24 jader, max 5,6 GHz)" or "5800 MHz".
pub fn parse_processor_text(text: &str) -> ProcessorInfo {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    let model = if CPU_BRANDS.iter().any(|brand| lower.contains(brand)) {
        Some(trimmed.to_string())
    } else {
        None
    };

    let cores = CORES_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let frequency_ghz = if let Some(c) = GHZ_RE.captures(trimmed) {
        parse_float(&c[1])
    } else {
        MHZ_RE
            .captures(trimmed)
            .and_then(|c| parse_float(&c[1]))
            .map(|mhz| mhz / 1000.0)
    };

    ProcessorInfo {
        model,
        cores,
        frequency_ghz,
    }
}
