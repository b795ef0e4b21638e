use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

/// Closed calendar-day interval `[start, end]`, both days rented.
///
/// Rentals are day-granular: gear checked out on `start` comes back on
/// `end`, and a return day cannot double as someone else's pickup day, so
/// ranges that merely touch still conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Number of billable days, counting both endpoints (`start == end` → 1).
    pub fn days_inclusive(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    #[allow(dead_code)]
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Booking lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    PendingPayment,
    PendingPickup,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Active bookings hold stock; completed and cancelled ones do not.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::PendingPickup)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "PendingPayment",
            BookingStatus::PendingPickup => "PendingPickup",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PendingPayment" => Some(BookingStatus::PendingPayment),
            "PendingPickup" => Some(BookingStatus::PendingPickup),
            "Completed" => Some(BookingStatus::Completed),
            "Cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// One rentable item in the inventory. `name` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub name: String,
    /// Price per rented day, in minor currency units.
    pub price_per_day: i64,
    /// Total units owned, regardless of current bookings.
    pub stock: i64,
}

/// A stored booking. `items_json` keeps the persisted encoding of the item
/// list (a JSON array of equipment names, duplicates meaningful); readers
/// decode it on demand via [`Booking::decode_items`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    /// Client-supplied unique code, the external handle for this booking.
    pub code: String,
    pub user_name: String,
    pub items_json: String,
    pub period: DateRange,
    pub payment_method: String,
    /// Always computed server-side at creation time.
    pub total_price: i64,
    pub status: BookingStatus,
    pub created_at: Ms,
}

impl Booking {
    /// Decode the stored item list. Callers decide what a failure means;
    /// the availability path degrades it to an empty list.
    pub fn decode_items(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.items_json)
    }
}

/// Per-item availability answer for a stock query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockStatus {
    pub item: String,
    pub is_available: bool,
    /// `stock − booked`; negative when the ledger oversells, surfaced as-is.
    pub available_stock: i64,
    pub message: Option<String>,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    EquipmentAdded {
        name: String,
        price_per_day: i64,
        stock: i64,
    },
    EquipmentUpdated {
        name: String,
        price_per_day: i64,
        stock: i64,
    },
    EquipmentRemoved {
        name: String,
    },
    BookingCreated {
        id: Ulid,
        code: String,
        user_name: String,
        items_json: String,
        period: DateRange,
        payment_method: String,
        total_price: i64,
        status: BookingStatus,
        created_at: Ms,
    },
    BookingStatusChanged {
        code: String,
        status: BookingStatus,
    },
}
