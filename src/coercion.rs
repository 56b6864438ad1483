// src/coercion.rs - Permissive numeric coercion applied at the store boundary
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LEADING_INTEGER: Regex = Regex::new(r"^\s*([+-]?)(\d+)").unwrap();
}

/// Coerces user or file input into a quantity.
///
/// Reads the leading integer of the input, so `"12 units"` is 12 and `"3.7"` is 3.
/// Anything without a leading integer, and any negative value, becomes 0.
/// Values beyond `u32::MAX` saturate.
pub fn coerce_quantity(raw: &str) -> u32 {
    let Some(caps) = LEADING_INTEGER.captures(raw) else {
        return 0;
    };

    if &caps[1] == "-" {
        return 0;
    }

    match caps[2].parse::<u64>() {
        Ok(value) => value.min(u32::MAX as u64) as u32,
        // only digits matched, so the sole failure is overflow
        Err(_) => u32::MAX,
    }
}

/// Coerces a power or weight cell into a finite number, 0 when not numeric.
pub fn coerce_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
