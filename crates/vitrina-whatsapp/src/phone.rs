// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number normalization.

use vitrina_core::VitrinaError;

/// Normalize a destination phone to `+<digits>` E.164 form.
///
/// Accepts separators (spaces, dashes, dots, parentheses) and an optional
/// leading `+`. The digits must already include the country code: without a
/// `+`, a bare national number (10 digits or fewer, like a Colombian mobile)
/// is rejected rather than guessed at. Digit counts outside 10..=15 are
/// rejected either way.
pub fn normalize_phone(raw: &str) -> Result<String, VitrinaError> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(VitrinaError::Validation(format!(
            "phone number '{raw}' contains non-numeric characters"
        )));
    }
    let min_digits = if has_plus { 10 } else { 11 };
    if !(min_digits..=15).contains(&digits.len()) {
        return Err(VitrinaError::Validation(format!(
            "phone number '{raw}' has {} digits, expected a country code plus subscriber number",
            digits.len()
        )));
    }
    Ok(format!("+{digits}"))
}
