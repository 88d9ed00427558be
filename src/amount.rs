//! Exact conversion between display amounts and integer base units.
//!
//! Token amounts cross the service boundary as base-unit integer strings.
//! All conversions here are decimal string arithmetic on `u128`; nothing is
//! routed through floating point.

use rust_decimal::Decimal;

/// Amount parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    Invalid(String),

    #[error("amount does not fit in 128 bits")]
    Overflow,
}

/// Split a display amount into its integer and fractional digit strings.
fn split_display(display: &str) -> Result<(&str, &str), AmountError> {
    let trimmed = display.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !digits_only(int_part)
        || !digits_only(frac_part)
    {
        return Err(AmountError::Invalid(trimmed.to_string()));
    }

    Ok((int_part, frac_part))
}

fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

fn parse_digits(digits: &str) -> Result<u128, AmountError> {
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<u128>().map_err(|_| AmountError::Overflow)
}

/// Convert a display amount (e.g. `"10.5"`) into base units.
///
/// Fractional digits beyond `decimals` are truncated.
pub fn to_base_units(display: &str, decimals: u8) -> Result<u128, AmountError> {
    let (int_part, frac_part) = split_display(display)?;
    let decimals = usize::from(decimals);

    let kept = &frac_part[..frac_part.len().min(decimals)];
    let scale = pow10(decimals as u32).ok_or(AmountError::Overflow)?;
    let frac_scale = pow10((decimals - kept.len()) as u32).ok_or(AmountError::Overflow)?;

    let int_units = parse_digits(int_part)?
        .checked_mul(scale)
        .ok_or(AmountError::Overflow)?;
    let frac_units = parse_digits(kept)?
        .checked_mul(frac_scale)
        .ok_or(AmountError::Overflow)?;

    int_units
        .checked_add(frac_units)
        .ok_or(AmountError::Overflow)
}

/// Whether a display amount parses and is strictly positive.
pub fn is_positive(display: &str) -> bool {
    match split_display(display) {
        Ok((int_part, frac_part)) => int_part
            .bytes()
            .chain(frac_part.bytes())
            .any(|b| b != b'0'),
        Err(_) => false,
    }
}

/// Parse a base-unit integer string as returned by routing services.
pub fn parse_raw(raw: &str) -> Result<u128, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::Invalid(trimmed.to_string()));
    }
    trimmed.parse::<u128>().map_err(|_| AmountError::Overflow)
}

/// Render base units as an exact display amount without trailing zeros.
pub fn format_units(raw: u128, decimals: u8) -> String {
    let Some(scale) = pow10(u32::from(decimals)) else {
        // More than 38 decimals: every u128 is below one whole unit.
        let digits = raw.to_string();
        let padded = format!("{digits:0>width$}", width = usize::from(decimals));
        let frac = padded.trim_end_matches('0');
        return if frac.is_empty() {
            "0".to_string()
        } else {
            format!("0.{frac}")
        };
    };

    let whole = raw / scale;
    let frac = raw % scale;
    if frac == 0 {
        return whole.to_string();
    }

    let frac = format!("{frac:0>width$}", width = usize::from(decimals));
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Render base units rounded (half up) to a fixed number of places.
pub fn format_fixed(raw: u128, decimals: u8, places: u8) -> String {
    let decimals = u32::from(decimals);
    let places_u32 = u32::from(places);

    let scaled = if decimals <= places_u32 {
        pow10(places_u32 - decimals).and_then(|factor| raw.checked_mul(factor))
    } else {
        match pow10(decimals - places_u32) {
            Some(divisor) => {
                let quotient = raw / divisor;
                let remainder = raw % divisor;
                if remainder >= divisor - remainder {
                    quotient.checked_add(1)
                } else {
                    Some(quotient)
                }
            }
            None => Some(0),
        }
    };

    let Some(scaled) = scaled else {
        return format_units(raw, decimals as u8);
    };

    if places == 0 {
        return scaled.to_string();
    }
    match pow10(places_u32) {
        Some(scale) => format!(
            "{}.{:0>width$}",
            scaled / scale,
            scaled % scale,
            width = usize::from(places)
        ),
        None => format_units(raw, decimals as u8),
    }
}

/// Parse a base-unit string and render it with four decimal places.
///
/// Returns `None` when the raw string is not a base-unit integer.
pub fn display_amount(raw: &str, decimals: u8) -> Option<String> {
    parse_raw(raw).ok().map(|value| format_fixed(value, decimals, 4))
}

/// Parse a decimal string such as a USD cost into a `Decimal`.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    value.trim().parse::<Decimal>().ok()
}
