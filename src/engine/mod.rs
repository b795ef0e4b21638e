mod error;
mod mutations;
mod overlap;
mod pricing;
mod queries;
mod validate;

pub use error::EngineError;
pub use mutations::NewBooking;
pub use overlap::{booked_units, ActiveBooking};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// Every booking, keyed by its client-supplied code. The code is the
/// uniqueness domain, so the ledger sits behind one lock instead of a
/// per-entry map.
#[derive(Default)]
pub struct Ledger {
    pub(super) bookings: HashMap<String, Booking>,
}

pub struct Engine {
    /// Inventory keyed by equipment name.
    pub(super) inventory: DashMap<String, Equipment>,
    pub(super) ledger: Arc<RwLock<Ledger>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply a booking event to the ledger (no locking — caller holds the lock).
fn apply_to_ledger(ledger: &mut Ledger, event: &Event) {
    match event {
        Event::BookingCreated {
            id,
            code,
            user_name,
            items_json,
            period,
            payment_method,
            total_price,
            status,
            created_at,
        } => {
            let booking = Booking {
                id: *id,
                code: code.clone(),
                user_name: user_name.clone(),
                items_json: items_json.clone(),
                period: *period,
                payment_method: payment_method.clone(),
                total_price: *total_price,
                status: *status,
                created_at: *created_at,
            };
            // First write wins: a repeated code can only come from a
            // hand-edited log, and replay must not clobber the original.
            ledger.bookings.entry(code.clone()).or_insert(booking);
        }
        Event::BookingStatusChanged { code, status } => {
            if let Some(b) = ledger.bookings.get_mut(code) {
                b.status = *status;
            }
        }
        // Equipment events live in the inventory map, not the ledger
        Event::EquipmentAdded { .. }
        | Event::EquipmentUpdated { .. }
        | Event::EquipmentRemoved { .. } => {}
    }
}

/// Apply an equipment event to the inventory map.
fn apply_to_inventory(inventory: &DashMap<String, Equipment>, event: &Event) {
    match event {
        Event::EquipmentAdded {
            name,
            price_per_day,
            stock,
        } => {
            inventory.insert(
                name.clone(),
                Equipment {
                    name: name.clone(),
                    price_per_day: *price_per_day,
                    stock: *stock,
                },
            );
        }
        Event::EquipmentUpdated {
            name,
            price_per_day,
            stock,
        } => {
            if let Some(mut eq) = inventory.get_mut(name) {
                eq.price_per_day = *price_per_day;
                eq.stock = *stock;
            }
        }
        Event::EquipmentRemoved { name } => {
            inventory.remove(name);
        }
        Event::BookingCreated { .. } | Event::BookingStatusChanged { .. } => {}
    }
}

impl Engine {
    /// Open the store: replay the WAL into memory and start the group-commit
    /// writer. Any I/O failure here is fatal to the caller.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            inventory: DashMap::new(),
            ledger: Arc::new(RwLock::new(Ledger::default())),
            wal_tx,
        };

        // Replay events — we're the sole owner of the ledger here, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // because this may run inside an async context.
        for event in &events {
            match event {
                Event::EquipmentAdded { .. }
                | Event::EquipmentUpdated { .. }
                | Event::EquipmentRemoved { .. } => {
                    apply_to_inventory(&engine.inventory, event);
                }
                other => {
                    let mut guard = engine
                        .ledger
                        .try_write()
                        .expect("replay: uncontended write");
                    apply_to_ledger(&mut guard, other);
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply, with the caller's ledger write guard held across
    /// the await. The ledger changes only after the WAL has acknowledged the
    /// event, and duplicate-code checks stay valid for the whole sequence.
    pub(super) async fn persist_and_apply(
        &self,
        ledger: &mut Ledger,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_ledger(ledger, event);
        Ok(())
    }

    /// WAL-append then apply for inventory events. DashMap guards are not
    /// held across the append await, so a lost race applies last-write-wins.
    pub(super) async fn persist_and_apply_inventory(
        &self,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_inventory(&self.inventory, event);
        Ok(())
    }
}
