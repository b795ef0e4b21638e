use crate::limits::MAX_RENTAL_DAYS;

use super::EngineError;

/// Quote a booking: every item occurrence pays its per-day price for `days`
/// billable days.
///
/// The rental-length cap is enforced before any price is looked up, and a
/// single unknown item aborts the whole quote. `price_of` resolves an
/// equipment name to its per-day price.
pub(crate) fn price_booking(
    items: &[String],
    days: i64,
    price_of: impl Fn(&str) -> Option<i64>,
) -> Result<i64, EngineError> {
    if days > MAX_RENTAL_DAYS {
        return Err(EngineError::Validation(format!(
            "rental period is {days} days, the maximum is {MAX_RENTAL_DAYS}"
        )));
    }
    let mut total: i64 = 0;
    for name in items {
        let price = price_of(name).ok_or_else(|| EngineError::EquipmentNotFound(name.clone()))?;
        total += price * days;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_of(name: &str) -> Option<i64> {
        match name {
            "Tent" => Some(10_000),
            "Stove" => Some(5_000),
            "Freebie" => Some(0),
            _ => None,
        }
    }

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn price_is_linear_in_days_and_occurrences() {
        assert_eq!(price_booking(&items(&["Tent"]), 3, price_of).unwrap(), 30_000);
        // Two tents and a stove for two days.
        assert_eq!(
            price_booking(&items(&["Tent", "Tent", "Stove"]), 2, price_of).unwrap(),
            50_000
        );
    }

    #[test]
    fn single_day_rental_pays_one_day() {
        assert_eq!(price_booking(&items(&["Stove"]), 1, price_of).unwrap(), 5_000);
    }

    #[test]
    fn seven_days_pass_eight_fail() {
        assert_eq!(price_booking(&items(&["Tent"]), 7, price_of).unwrap(), 70_000);
        assert!(matches!(
            price_booking(&items(&["Tent"]), 8, price_of),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn cap_is_checked_before_any_lookup() {
        // Unknown item AND over-long period: the period wins.
        assert!(matches!(
            price_booking(&items(&["Ghost"]), 8, price_of),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn unknown_item_aborts_the_whole_quote() {
        let err = price_booking(&items(&["Tent", "Ghost"]), 2, price_of).unwrap_err();
        assert!(matches!(err, EngineError::EquipmentNotFound(ref n) if n == "Ghost"));
        // Position does not matter.
        assert!(price_booking(&items(&["Ghost", "Tent"]), 2, price_of).is_err());
    }

    #[test]
    fn zero_priced_item_contributes_zero() {
        assert_eq!(
            price_booking(&items(&["Freebie", "Tent"]), 2, price_of).unwrap(),
            20_000
        );
    }
}
