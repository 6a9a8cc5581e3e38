use crate::models::ChangeType;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// Digit-only magnitude of a raw price string.
///
/// Every character except ASCII digits is dropped, including the decimal
/// point, so "₹1,234.56" and "123456" have the same magnitude. The result is
/// only good for ordering prices scraped from the same page layout.
pub fn price_magnitude(price: &str) -> Option<Decimal> {
    let digits: String = price.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Decimal::from_str(&digits).ok()
}

/// Classify a detected change between two raw price strings.
///
/// This never decides *whether* a change happened; callers compare the raw
/// strings for that.
pub fn classify_change(old_price: &str, new_price: &str) -> ChangeType {
    match (price_magnitude(old_price), price_magnitude(new_price)) {
        (Some(old), Some(new)) => match new.cmp(&old) {
            Ordering::Less => ChangeType::Decrease,
            Ordering::Greater => ChangeType::Increase,
            Ordering::Equal => ChangeType::Same,
        },
        _ => ChangeType::Unknown,
    }
}
