//! Canonicalization of free-form phone numbers.
//!
//! The normalized digit string, not the raw input, is what gets persisted
//! and compared everywhere else in the system.

use crate::error::PhoneError;

/// Strip formatting and make the country code explicit.
///
/// Removes every character that is not a digit or a plus sign, rewrites a
/// leading `+880` to `880`, drops a bare leading `+`, and strips any plus
/// signs that remain. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if let Some(rest) = cleaned.strip_prefix("+880") {
        cleaned = format!("880{rest}");
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        cleaned = rest.to_string();
    }

    cleaned.retain(|c| c != '+');
    cleaned
}

/// Normalize, then check the result is a plausible subscriber number.
///
/// Accepts 10 to 15 digits; numbers carrying the Bangladesh country code
/// must be exactly 13 digits (880 + 10 subscriber digits). On success
/// returns the canonical digit string.
pub fn validate(raw: &str) -> Result<String, PhoneError> {
    let normalized = normalize(raw);

    if normalized.is_empty() {
        return Err(PhoneError::Empty);
    }
    // normalize only emits digits, but re-check rather than trust the caller
    if !normalized.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneError::NonNumeric);
    }
    if normalized.len() < 10 {
        return Err(PhoneError::TooShort);
    }
    if normalized.len() > 15 {
        return Err(PhoneError::TooLong);
    }
    if normalized.starts_with("880") && normalized.len() != 13 {
        return Err(PhoneError::BadCountryLength);
    }

    Ok(normalized)
}
