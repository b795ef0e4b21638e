//! Compiled-in guard rails. Every externally supplied size or count is
//! checked against one of these before it can reach the WAL.

/// Longest rental period, in billable days (both endpoints counted).
pub const MAX_RENTAL_DAYS: i64 = 7;

/// Most item occurrences a single booking may carry.
pub const MAX_ITEMS_PER_BOOKING: usize = 64;

/// Equipment name length, bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Booking code length, bytes.
pub const MAX_CODE_LEN: usize = 64;

/// Free-text field length (user name, payment method), bytes.
pub const MAX_TEXT_LEN: usize = 256;

/// Inventory size cap.
pub const MAX_EQUIPMENT_ITEMS: usize = 10_000;

/// Booking ledger size cap.
pub const MAX_BOOKINGS: usize = 1_000_000;

/// Most item names accepted in one stock query's IN clause.
pub const MAX_IN_CLAUSE_ITEMS: usize = 100;

/// Per-day price ceiling, minor currency units. Together with
/// `MAX_ITEMS_PER_BOOKING` and `MAX_RENTAL_DAYS` this keeps any total
/// price far below i64 overflow.
pub const MAX_PRICE_PER_DAY: i64 = 100_000_000_000;

/// Stock units per equipment item.
pub const MAX_STOCK_UNITS: i64 = 1_000_000;
