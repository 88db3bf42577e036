//! Kubernetes resource quantity parsing.
//!
//! Quantities such as `128M`, `2Gi` or `1e3` appear as strings in the JSON
//! view of a VM. Integer rules compare them as plain numbers, so this module
//! converts a quantity to the exact integer it denotes. Fractional amounts
//! (`500m`, `1.5`) have no exact integer form and are rejected.

use std::sync::LazyLock;

use regex::Regex;

/// `<sign><digits>[.<digits>]<suffix>` where the suffix is a binary SI unit,
/// a decimal SI unit or a decimal exponent.
static QUANTITY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)([0-9]*)(?:\.([0-9]*))?(Ki|Mi|Gi|Ti|Pi|Ei|[numkMGTPE]|[eE][+-]?[0-9]+)?$")
        .ok()
});

/// Parse a quantity string to its exact integer value.
///
/// Returns `None` if the string is not a quantity, the amount is not
/// integral, or it does not fit an `i64`.
pub fn parse_quantity_i64(input: &str) -> Option<i64> {
    let re = QUANTITY_RE.as_ref()?;
    let caps = re.captures(input.trim())?;

    let negative = caps.get(1).is_some_and(|m| m.as_str() == "-");
    let whole = caps.get(2).map_or("", |m| m.as_str());
    let fraction = caps.get(3).map_or("", |m| m.as_str());
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let digits = format!("{whole}{fraction}");
    let significant = digits.trim_start_matches('0');
    if significant.len() > 30 {
        return None;
    }
    let mut mantissa: i128 = if significant.is_empty() {
        0
    } else {
        significant.parse().ok()?
    };

    let (binary_power, decimal_exponent) = match caps.get(4).map(|m| m.as_str()) {
        None => (0, 0),
        Some(suffix) => suffix_multiplier(suffix)?,
    };

    mantissa = mantissa.checked_mul(1024_i128.checked_pow(binary_power)?)?;

    let fraction_len = i32::try_from(fraction.len()).ok()?;
    let exponent = decimal_exponent.checked_sub(fraction_len)?;
    let value = if exponent >= 0 {
        mantissa.checked_mul(10_i128.checked_pow(exponent.unsigned_abs())?)?
    } else {
        let divisor = 10_i128.checked_pow(exponent.unsigned_abs())?;
        if mantissa % divisor != 0 {
            return None;
        }
        mantissa / divisor
    };

    let value = if negative { -value } else { value };
    i64::try_from(value).ok()
}

/// Map a suffix to `(power of 1024, power of 10)`.
fn suffix_multiplier(suffix: &str) -> Option<(u32, i32)> {
    let multiplier = match suffix {
        "Ki" => (1, 0),
        "Mi" => (2, 0),
        "Gi" => (3, 0),
        "Ti" => (4, 0),
        "Pi" => (5, 0),
        "Ei" => (6, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        exp => {
            let exponent: i32 = exp.get(1..)?.parse().ok()?;
            if exponent.abs() > 38 {
                return None;
            }
            (0, exponent)
        }
    };
    Some(multiplier)
}
