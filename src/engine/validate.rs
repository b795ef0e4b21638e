use chrono::NaiveDate;

use crate::limits::*;
use crate::model::{BookingStatus, DateRange, Ms};

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Strict `YYYY-MM-DD` parsing. chrono accepts unpadded month/day, so the
/// parsed date is rendered back and compared against the raw input; anything
/// that does not round-trip byte-for-byte is rejected.
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, EngineError> {
    let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        EngineError::Validation(format!("{field} must be a real YYYY-MM-DD date, got '{raw}'"))
    })?;
    if parsed.format("%Y-%m-%d").to_string() != raw {
        return Err(EngineError::Validation(format!(
            "{field} must use zero-padded YYYY-MM-DD, got '{raw}'"
        )));
    }
    Ok(parsed)
}

/// Parse both period endpoints and reject inverted ranges. Equal endpoints
/// are a valid one-day rental.
pub(crate) fn parse_period(rent_raw: &str, return_raw: &str) -> Result<DateRange, EngineError> {
    let rent = parse_date("rent_date", rent_raw)?;
    let ret = parse_date("return_date", return_raw)?;
    if ret < rent {
        return Err(EngineError::Validation(format!(
            "return_date '{return_raw}' is before rent_date '{rent_raw}'"
        )));
    }
    Ok(DateRange::new(rent, ret))
}

/// Decode a booking item list: a non-empty JSON array of equipment names.
/// Order and duplicates are preserved — each occurrence rents one unit.
pub(crate) fn parse_items(raw: &str) -> Result<Vec<String>, EngineError> {
    let items: Vec<String> = serde_json::from_str(raw).map_err(|_| {
        EngineError::Validation("items must be a JSON array of equipment names".into())
    })?;
    if items.is_empty() {
        return Err(EngineError::Validation("items must not be empty".into()));
    }
    if items.len() > MAX_ITEMS_PER_BOOKING {
        return Err(EngineError::LimitExceeded("too many items in one booking"));
    }
    for name in &items {
        if name.is_empty() {
            return Err(EngineError::Validation("item names must not be empty".into()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("item name too long"));
        }
    }
    Ok(items)
}

pub(crate) fn parse_status(raw: &str) -> Result<BookingStatus, EngineError> {
    BookingStatus::parse(raw).ok_or_else(|| {
        EngineError::Validation(format!(
            "unknown status '{raw}' (expected PendingPayment, PendingPickup, Completed or Cancelled)"
        ))
    })
}
