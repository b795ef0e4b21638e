use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::pricing::price_booking;
use super::validate::{self, now_ms};
use super::{Engine, EngineError, WalCommand};

/// A booking request exactly as the client sent it. Dates, items and status
/// arrive as raw strings; decoding them is this module's job, not the SQL
/// layer's.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub code: String,
    pub user_name: String,
    pub items_json: String,
    pub rent_date: String,
    pub return_date: String,
    pub payment_method: String,
    pub status: String,
}

fn check_text(
    field: &'static str,
    value: &str,
    max_len: usize,
    over: &'static str,
) -> Result<(), EngineError> {
    if value.is_empty() {
        return Err(EngineError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(EngineError::LimitExceeded(over));
    }
    Ok(())
}

fn check_equipment_fields(name: &str, price_per_day: i64, stock: i64) -> Result<(), EngineError> {
    check_text("name", name, MAX_NAME_LEN, "equipment name too long")?;
    if price_per_day < 0 {
        return Err(EngineError::Validation("price_per_day must not be negative".into()));
    }
    if price_per_day > MAX_PRICE_PER_DAY {
        return Err(EngineError::LimitExceeded("price_per_day too large"));
    }
    if stock < 0 {
        return Err(EngineError::Validation("stock must not be negative".into()));
    }
    if stock > MAX_STOCK_UNITS {
        return Err(EngineError::LimitExceeded("stock too large"));
    }
    Ok(())
}

impl Engine {
    pub async fn add_equipment(
        &self,
        name: String,
        price_per_day: i64,
        stock: i64,
    ) -> Result<(), EngineError> {
        if self.inventory.len() >= MAX_EQUIPMENT_ITEMS {
            return Err(EngineError::LimitExceeded("too many equipment items"));
        }
        check_equipment_fields(&name, price_per_day, stock)?;
        if self.inventory.contains_key(&name) {
            return Err(EngineError::DuplicateEquipment(name));
        }

        let event = Event::EquipmentAdded {
            name,
            price_per_day,
            stock,
        };
        self.persist_and_apply_inventory(&event).await
    }

    pub async fn update_equipment(
        &self,
        name: String,
        price_per_day: i64,
        stock: i64,
    ) -> Result<(), EngineError> {
        check_equipment_fields(&name, price_per_day, stock)?;
        if !self.inventory.contains_key(&name) {
            return Err(EngineError::EquipmentNotFound(name));
        }
        let event = Event::EquipmentUpdated {
            name,
            price_per_day,
            stock,
        };
        self.persist_and_apply_inventory(&event).await
    }

    /// Remove an inventory row. Existing bookings that reference the name
    /// are left alone; stock queries then answer "item not found" for it.
    pub async fn remove_equipment(&self, name: String) -> Result<(), EngineError> {
        if !self.inventory.contains_key(&name) {
            return Err(EngineError::EquipmentNotFound(name));
        }
        let event = Event::EquipmentRemoved { name };
        self.persist_and_apply_inventory(&event).await
    }

    /// Create a booking. Validation order is fixed (field presence, dates,
    /// item list, status, then pricing) and the first failure wins. The
    /// ledger write lock is taken before the duplicate-code check and held
    /// across the WAL append, so a code can never be claimed twice.
    ///
    /// No stock check happens here: overlapping bookings are accepted and
    /// surface later as negative availability.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, EngineError> {
        check_text("booking_code", &req.code, MAX_CODE_LEN, "booking code too long")?;
        check_text("user_name", &req.user_name, MAX_TEXT_LEN, "user name too long")?;
        check_text(
            "payment_method",
            &req.payment_method,
            MAX_TEXT_LEN,
            "payment method too long",
        )?;
        let period = validate::parse_period(&req.rent_date, &req.return_date)?;
        let items = validate::parse_items(&req.items_json)?;
        let status = validate::parse_status(&req.status)?;

        let total_price = price_booking(&items, period.days_inclusive(), |name| {
            self.inventory.get(name).map(|e| e.price_per_day)
        })?;

        let mut ledger = self.ledger.write().await;
        if ledger.bookings.len() >= MAX_BOOKINGS {
            return Err(EngineError::LimitExceeded("too many bookings"));
        }
        if ledger.bookings.contains_key(&req.code) {
            return Err(EngineError::DuplicateBookingCode(req.code));
        }

        let booking = Booking {
            id: Ulid::new(),
            code: req.code,
            user_name: req.user_name,
            items_json: req.items_json,
            period,
            payment_method: req.payment_method,
            total_price,
            status,
            created_at: now_ms(),
        };
        let event = Event::BookingCreated {
            id: booking.id,
            code: booking.code.clone(),
            user_name: booking.user_name.clone(),
            items_json: booking.items_json.clone(),
            period: booking.period,
            payment_method: booking.payment_method.clone(),
            total_price: booking.total_price,
            status: booking.status,
            created_at: booking.created_at,
        };
        self.persist_and_apply(&mut ledger, &event).await?;
        Ok(booking)
    }

    /// Store-level status transition. Never re-prices and never consults
    /// the availability core; moving out of the active set is what frees
    /// the booking's stock.
    pub async fn set_booking_status(&self, code: &str, status_raw: &str) -> Result<(), EngineError> {
        let status = validate::parse_status(status_raw)?;
        let mut ledger = self.ledger.write().await;
        if !ledger.bookings.contains_key(code) {
            return Err(EngineError::BookingNotFound(code.to_string()));
        }
        let event = Event::BookingStatusChanged {
            code: code.to_string(),
            status,
        };
        self.persist_and_apply(&mut ledger, &event).await
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state: one add per inventory row, one create per
    /// booking with its current status folded in.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for entry in self.inventory.iter() {
            let eq = entry.value();
            events.push(Event::EquipmentAdded {
                name: eq.name.clone(),
                price_per_day: eq.price_per_day,
                stock: eq.stock,
            });
        }

        {
            let ledger = self.ledger.read().await;
            let mut bookings: Vec<&Booking> = ledger.bookings.values().collect();
            // Deterministic replay order.
            bookings.sort_by_key(|b| (b.created_at, b.id));
            for b in bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    code: b.code.clone(),
                    user_name: b.user_name.clone(),
                    items_json: b.items_json.clone(),
                    period: b.period,
                    payment_method: b.payment_method.clone(),
                    total_price: b.total_price,
                    status: b.status,
                    created_at: b.created_at,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
