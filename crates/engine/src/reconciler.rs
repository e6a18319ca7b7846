// In crates/engine/src/reconciler.rs

use crate::client::AssetClient;
use crate::lifecycle::finish_close;
use crate::{Result, SessionContext};
use chrono::{Duration, Utc};
use core_types::{OrderDetails, OrderSide, PositionRecord};
use database::{Ledger, StatsBook};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{info, warn};

/// Allowed difference between the exchange's and our clock when matching
/// an order to the moment its close was attempted.
const CLOCK_SKEW_MINS: i64 = 1;

/// What one reconciliation pass repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records already flagged closed, now removed.
    pub removed: usize,
    /// Interrupted closes found in the exchange's order history and booked.
    pub completed: usize,
    /// Interrupted closes with no matching order, returned to the sweep.
    pub reset: usize,
}

/// Repairs ledger records left behind by a session that stopped part way
/// through closing a position.
///
/// Runs once per asset before the first round. Sweeps skip records with a
/// close in flight, so nothing else touches them until this has run.
pub struct Reconciler {
    ctx: SessionContext,
    ledger: Ledger,
    stats: StatsBook,
}

impl Reconciler {
    pub fn new(ctx: SessionContext, ledger: Ledger, stats: StatsBook) -> Self {
        Self { ctx, ledger, stats }
    }

    pub async fn reconcile(&self, client: &AssetClient) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let in_flight = self.ledger.in_flight_records(&client.pair.base).await?;
        if in_flight.is_empty() {
            return Ok(report);
        }
        info!(pair = %client.pair, count = in_flight.len(), "Reconciling interrupted closes");

        // Orders that opened a ledger row, or already closed one, cannot close another.
        let mut claimed: HashSet<String> = self
            .ledger
            .all_records()
            .await?
            .into_iter()
            .flat_map(|r| std::iter::once(r.id).chain(r.close_order_id))
            .collect();
        let mut history: Option<Vec<OrderDetails>> = None;

        for record in in_flight {
            self.ctx.checkpoint()?;

            if record.closed {
                self.ledger.delete_record(&record.id).await?;
                info!(order_id = %record.id, close_id = ?record.close_order_id, "Removed closed record");
                report.removed += 1;
                continue;
            }

            if history.is_none() {
                history = Some(client.list_orders(&self.ctx).await?);
            }
            let orders = history.as_deref().unwrap_or_default();

            match find_close_order(&record, orders, &claimed) {
                Some(order) => {
                    let close_price = fill_price(order).unwrap_or(record.trigger_price);
                    let closed_at = order.completed_at.or(order.created_at).unwrap_or_else(Utc::now);
                    claimed.insert(order.order_id.clone());
                    finish_close(
                        &self.ctx,
                        &self.ledger,
                        &self.stats,
                        &record,
                        &order.order_id,
                        close_price,
                        closed_at,
                    )
                    .await?;
                    report.completed += 1;
                }
                None => {
                    warn!(order_id = %record.id, attempted_at = ?record.close_attempted_at, "No closing order found, returning record to the sweep");
                    self.ledger.clear_closing(&record.id).await?;
                    report.reset += 1;
                }
            }
        }

        info!(pair = %client.pair, ?report, "Reconciliation finished");
        Ok(report)
    }
}

/// The earliest unclaimed order on the closing side created after the close
/// was attempted. Sells must also match the record's volume to within 1%.
fn find_close_order<'a>(
    record: &PositionRecord,
    orders: &'a [OrderDetails],
    claimed: &HashSet<String>,
) -> Option<&'a OrderDetails> {
    let attempted = record.close_attempted_at? - Duration::minutes(CLOCK_SKEW_MINS);
    let side = record.order_type.closing_side();
    let tolerance = record.open_volume / Decimal::ONE_HUNDRED;

    orders
        .iter()
        .filter(|o| o.side == Some(side))
        .filter(|o| o.created_at.is_some_and(|at| at >= attempted))
        .filter(|o| !claimed.contains(&o.order_id))
        .filter(|o| side == OrderSide::Buy || (o.base - record.open_volume).abs() <= tolerance)
        .min_by_key(|o| o.created_at)
}

fn fill_price(order: &OrderDetails) -> Option<Decimal> {
    if order.base.is_zero() {
        None
    } else {
        Some(order.counter / order.base)
    }
}
