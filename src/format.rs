//! Display formatting for exported Ramp values.

use rust_decimal::Decimal;

/// Placeholder for missing values in exports.
pub const NOT_AVAILABLE: &str = "n/a";

const DEFAULT_DECIMAL_PLACES: u32 = 2;

/// Minor-unit exponent for ISO 4217 codes Ramp reports. Unknown codes use 2.
pub fn currency_decimal_places(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" => 0,
        "INR" => 1,
        "AUD" | "BRL" | "CAD" | "CNY" | "DKK" | "EUR" | "GBP" | "USD" | "SEK" | "TRY" | "TWD"
        | "ZAR" => 2,
        _ => DEFAULT_DECIMAL_PLACES,
    }
}

/// Format an amount given in the currency's minor units.
///
/// `format_amount(Some(1234), Some("USD"))` is `"USD 12.34"`. A missing or zero
/// amount renders as `n/a`, still prefixed by the currency when known.
pub fn format_amount(minor_units: Option<i64>, currency: Option<&str>) -> String {
    let currency = currency.map(str::trim).filter(|c| !c.is_empty());
    let mut out = match currency {
        Some(code) => format!("{code} "),
        None => String::new(),
    };

    match minor_units.filter(|amt| *amt != 0) {
        Some(amt) => {
            let dp = currency.map_or(DEFAULT_DECIMAL_PLACES, currency_decimal_places);
            out.push_str(&Decimal::new(amt, dp).to_string());
        }
        None => out.push_str(NOT_AVAILABLE),
    }
    out
}

/// `"Last, First"`, or `n/a` unless both parts are present.
pub fn format_user_name(first: Option<&str>, last: Option<&str>) -> String {
    match (non_empty(first), non_empty(last)) {
        (Some(first), Some(last)) => format!("{last}, {first}"),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// The value, or `n/a` when missing or empty.
pub fn or_not_available(value: Option<&str>) -> String {
    non_empty(value).unwrap_or(NOT_AVAILABLE).to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
