use crate::limits::*;
use crate::model::*;

use super::overlap::{booked_units, ActiveBooking};
use super::validate;
use super::{Engine, EngineError};

impl Engine {
    /// Snapshot the active (stock-holding) bookings, decoding each stored
    /// item list. A row whose items fail to decode degrades to an empty
    /// list: it stops counting against stock, gets logged and counted, and
    /// is never surfaced to the caller as an error.
    pub(super) async fn active_bookings(&self) -> Vec<ActiveBooking> {
        let ledger = self.ledger.read().await;
        ledger
            .bookings
            .values()
            .filter(|b| b.status.is_active())
            .map(|b| {
                let items = match b.decode_items() {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!(
                            code = %b.code,
                            error = %e,
                            "stored items failed to decode; booking excluded from stock counts"
                        );
                        metrics::counter!(crate::observability::ITEM_DECODE_FAILURES_TOTAL)
                            .increment(1);
                        Vec::new()
                    }
                };
                ActiveBooking {
                    period: b.period,
                    items,
                }
            })
            .collect()
    }

    /// Per-item availability over a rental period (the `stock` table).
    ///
    /// Unknown items produce their own "item not found" row instead of
    /// failing the query. `available_stock` can go negative when the ledger
    /// oversells; it is surfaced as-is so the operator can see the deficit.
    pub async fn check_stock(
        &self,
        items: &[String],
        rent_date: &str,
        return_date: &str,
    ) -> Result<Vec<StockStatus>, EngineError> {
        if items.len() > MAX_IN_CLAUSE_ITEMS {
            return Err(EngineError::LimitExceeded("too many items in stock query"));
        }
        let query = validate::parse_period(rent_date, return_date)?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        // One row per name: repeated names collapse, first-occurrence order kept.
        let mut requested: Vec<&str> = Vec::new();
        for name in items {
            if !requested.contains(&name.as_str()) {
                requested.push(name);
            }
        }

        let active = self.active_bookings().await;
        let mut result = Vec::with_capacity(requested.len());
        for name in requested {
            let Some(eq) = self.inventory.get(name) else {
                result.push(StockStatus {
                    item: name.to_string(),
                    is_available: false,
                    available_stock: 0,
                    message: Some("item not found".into()),
                });
                continue;
            };
            let booked = booked_units(name, &query, &active);
            let available_stock = eq.stock - booked;
            result.push(StockStatus {
                item: name.to_string(),
                is_available: available_stock > 0,
                available_stock,
                message: None,
            });
        }
        Ok(result)
    }

    pub fn list_equipment(&self) -> Vec<Equipment> {
        let mut all: Vec<Equipment> = self.inventory.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// All bookings regardless of status, newest first.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let ledger = self.ledger.read().await;
        let mut all: Vec<Booking> = ledger.bookings.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    pub async fn get_booking(&self, code: &str) -> Result<Booking, EngineError> {
        let ledger = self.ledger.read().await;
        ledger
            .bookings
            .get(code)
            .cloned()
            .ok_or_else(|| EngineError::BookingNotFound(code.to_string()))
    }
}
