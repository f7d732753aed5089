// src/utils/precision.rs
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Decimal places worth showing for a price: sub-dollar assets need 6.
pub fn price_scale(price: Decimal) -> u32 {
    if price < Decimal::ONE {
        6
    } else if price < Decimal::from(100) {
        4
    } else {
        2
    }
}

/// Rounds a generated float price to its display scale.
pub fn to_price(value: f64) -> Decimal {
    let raw = Decimal::from_f64(value).unwrap_or_default();
    raw.round_dp(price_scale(raw))
}

pub fn format_price(price: Decimal) -> String {
    let scale = price_scale(price);
    format!("{:.*}", scale as usize, price.round_dp(scale))
}
