//! Scaled Values
//!
//! TigerStyle: Parse quantities like "30KB" or "25KiB" into plain integers.
//!
//! Format: `<digits><prefix><unit>`, where prefix is empty, a decimal SI
//! prefix (K M G T P E, powers of 1000) or a binary prefix (Ki Mi Gi Ti Pi Ei,
//! powers of 1024).

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Recognized prefixes and their multipliers
const PREFIX_SCALES: [(&str, u64); 13] = [
    ("", 1),
    ("K", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000),
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("Pi", 1 << 50),
    ("Ei", 1 << 60),
];

/// Unit for capacities and throughputs
pub const BYTES_UNIT: &str = "B";

// =============================================================================
// Parsing
// =============================================================================

/// Multiplier for a prefix, if recognized.
#[must_use]
pub fn prefix_scale(prefix: &str) -> Option<u64> {
    PREFIX_SCALES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, scale)| *scale)
}

/// Parse `input` as a scaled value in `unit`.
///
/// # Errors
/// Returns a `ScaleError` if the unit is missing, the magnitude is not a
/// plain non-negative integer, the prefix is unknown, or the result does not
/// fit in a `u64`.
pub fn parse_scaled_value(input: &str, unit: &str) -> Result<u64, ScaleError> {
    assert!(!unit.is_empty(), "unit must not be empty");

    let scaled = input.strip_suffix(unit).ok_or_else(|| ScaleError::MissingUnit {
        input: input.to_string(),
        unit: unit.to_string(),
    })?;

    let digits_end = scaled
        .rfind(|c: char| c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let (digits, prefix) = scaled.split_at(digits_end);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScaleError::InvalidNumber {
            input: input.to_string(),
        });
    }
    let magnitude: u64 = digits.parse().map_err(|_| ScaleError::Overflow {
        input: input.to_string(),
    })?;

    let scale = prefix_scale(prefix).ok_or_else(|| ScaleError::InvalidPrefix {
        input: input.to_string(),
        prefix: prefix.to_string(),
    })?;

    magnitude.checked_mul(scale).ok_or_else(|| ScaleError::Overflow {
        input: input.to_string(),
    })
}

/// Parse an optional byte quantity; absent means zero.
///
/// # Errors
/// See [`parse_scaled_value`].
pub fn parse_optional_bytes(input: Option<&str>) -> Result<u64, ScaleError> {
    input.map_or(Ok(0), |s| parse_scaled_value(s, BYTES_UNIT))
}

// =============================================================================
// Errors
// =============================================================================

/// Scaled value parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaleError {
    #[error("{input:?} doesn't end with unit {unit}")]
    MissingUnit { input: String, unit: String },

    #[error("invalid magnitude in {input:?}")]
    InvalidNumber { input: String },

    #[error("invalid prefix {prefix:?} in {input:?}")]
    InvalidPrefix { input: String, prefix: String },

    #[error("{input:?} is too large")]
    Overflow { input: String },
}

// =============================================================================
// Tests
// =============================================================================
