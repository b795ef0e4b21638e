use crate::model::*;

/// An active booking as the overlap computation sees it: the rental period
/// plus the decoded item list. Status filtering and item decoding happen
/// upstream; rows that fail to decode arrive with an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBooking {
    pub period: DateRange,
    pub items: Vec<String>,
}

/// Units of `item` tied up by active bookings whose period overlaps `query`.
///
/// Periods are closed day intervals, so a booking ending on the query's
/// first day still counts. Each occurrence of the name in a booking's item
/// list rents one physical unit: a booking listing "Tent" twice holds two
/// tents for its whole period.
pub fn booked_units(item: &str, query: &DateRange, active: &[ActiveBooking]) -> i64 {
    let mut booked: i64 = 0;
    for booking in active {
        if !booking.period.overlaps(query) {
            continue;
        }
        booked += booking.items.iter().filter(|n| n.as_str() == item).count() as i64;
    }
    booked
}
