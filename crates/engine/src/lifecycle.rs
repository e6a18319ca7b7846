// In crates/engine/src/lifecycle.rs

use crate::client::AssetClient;
use crate::{Error, Result, SessionContext};
use api_client::{FeeInfo, OrderSize, Ticker};
use chrono::{DateTime, Utc};
use core_types::{OrderState, OrderType, PositionRecord, ProfitEntry, Signal};
use database::{Ledger, StatsBook};
use events::SessionEvent;
use risk::{MarketSnapshot, RiskManager};
use rust_decimal::Decimal;
use strategies::SignalSource;
use tracing::{debug, error, info, warn};

/// Market data fetched at the start of a round. Opening decisions in the
/// round are all made against these figures.
#[derive(Debug, Clone, Copy)]
pub struct RoundPrep {
    pub ticker: Ticker,
    pub fee: FeeInfo,
}

/// What a completed round did for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub signal: Signal,
    pub opened: Option<PositionRecord>,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Completed(RoundReport),
    /// The ticker could not be fetched. Nothing was opened or swept.
    PriceUnavailable,
    /// One purchase unit is below the exchange's minimum order for this asset.
    BelowMinimum,
    Skipped(String),
}

/// Runs the per-asset trading round: analyse, open at most one position, then
/// sweep the pending positions for any that can be closed at a profit.
pub struct LifecycleManager {
    ctx: SessionContext,
    ledger: Ledger,
    stats: StatsBook,
    risk: Box<dyn RiskManager>,
    source: Box<dyn SignalSource>,
}

impl LifecycleManager {
    pub fn new(
        ctx: SessionContext,
        ledger: Ledger,
        stats: StatsBook,
        risk: Box<dyn RiskManager>,
        source: Box<dyn SignalSource>,
    ) -> Self {
        info!(risk = risk.name(), source = source.name(), "Lifecycle manager ready");
        Self { ctx, ledger, stats, risk, source }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn stats(&self) -> &StatsBook {
        &self.stats
    }

    /// One full round for `client`.
    ///
    /// Only cancellation and fatal errors escape as `Err`, plus ledger
    /// failures, which the session counts. Everything else ends the round
    /// for this asset with a non-`Completed` outcome.
    pub async fn run_round(&mut self, client: &mut AssetClient) -> Result<RoundOutcome> {
        self.ctx.checkpoint()?;

        let fee = match client.fee_info(&self.ctx).await {
            Ok(fee) => fee,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                warn!(pair = %client.pair, error = %e, "Could not fetch fee info, skipping asset");
                return Ok(RoundOutcome::Skipped(format!("fee info unavailable: {e}")));
            }
        };

        let ticker = match client.current_price(&self.ctx).await {
            Ok(ticker) => ticker,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                warn!(pair = %client.pair, error = %e, "Could not fetch current price");
                return Ok(RoundOutcome::PriceUnavailable);
            }
        };

        match self.risk.check_minimum(&client.info, ticker.ask) {
            Ok(()) => {}
            Err(e @ risk::Error::BelowMinimumVolume { .. }) => {
                warn!(pair = %client.pair, error = %e, "Purchase unit too small for this asset");
                return Ok(RoundOutcome::BelowMinimum);
            }
            Err(e) => return Ok(RoundOutcome::Skipped(e.to_string())),
        }

        if let Err(e) = client.refresh_balances(&self.ctx).await {
            if e.is_terminal() {
                return Err(e);
            }
            warn!(pair = %client.pair, error = %e, "Balance refresh failed, using last known balances");
        }

        let signal = self.analyze(client, ticker.ask).await?;
        let report = self
            .execute_round(client, signal, &RoundPrep { ticker, fee })
            .await?;
        Ok(RoundOutcome::Completed(report))
    }

    /// Feeds the source the history it asks for plus the current price.
    /// A failed fetch or analysis reads as `Wait`.
    async fn analyze(&mut self, client: &AssetClient, current: Decimal) -> Result<Signal> {
        let (count, interval) = self.source.price_dimensions();
        let mut prices = match client.previous_prices(&self.ctx, count, interval).await {
            Ok(prices) => prices,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                warn!(pair = %client.pair, error = %e, "Could not fetch price history, waiting this round");
                return Ok(Signal::Wait);
            }
        };
        prices.push(current);

        match self.source.analyze(&prices) {
            Ok(()) => {
                let signal = self.source.emit();
                info!(pair = %client.pair, %signal, source = self.source.name(), "Analysis complete");
                Ok(signal)
            }
            Err(e) => {
                warn!(pair = %client.pair, error = %e, "Analysis failed, waiting this round");
                Ok(Signal::Wait)
            }
        }
    }

    /// Opens at most one position for `signal`, then sweeps longs and shorts.
    pub async fn execute_round(
        &self,
        client: &AssetClient,
        signal: Signal,
        prep: &RoundPrep,
    ) -> Result<RoundReport> {
        let opened = match signal {
            Signal::Wait => None,
            Signal::GoLong | Signal::ShortSell => self.open_position(client, signal, prep).await?,
        };

        let mut closed = self.sweep(client, OrderType::Long).await?;
        closed += self.sweep(client, OrderType::Short).await?;

        Ok(RoundReport { signal, opened, closed })
    }

    async fn open_position(
        &self,
        client: &AssetClient,
        signal: Signal,
        prep: &RoundPrep,
    ) -> Result<Option<PositionRecord>> {
        let market = MarketSnapshot {
            price: prep.ticker.ask,
            taker_fee: prep.fee.taker_fee,
            fiat_balance: client.fiat_balance(),
        };
        let plan = match self.risk.evaluate(signal, &client.info, &market) {
            Ok(Some(plan)) => plan,
            Ok(None) => return Ok(None),
            Err(risk::Error::Vetoed { reason }) => {
                info!(pair = %client.pair, %signal, %reason, "Opening skipped");
                return Ok(None);
            }
            Err(e) => {
                warn!(pair = %client.pair, %signal, error = %e, "Could not size the order");
                return Ok(None);
            }
        };

        let size = match plan.order_type {
            OrderType::Long => OrderSize::Counter(plan.cost),
            OrderType::Short => OrderSize::Base(plan.volume),
        };
        let order_id = match client.place_order(&self.ctx, plan.side, size).await {
            Ok(id) => id,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                warn!(pair = %client.pair, side = plan.side.as_str(), error = %e, "Opening order failed");
                return Ok(None);
            }
        };

        // The order exists from here on. Bookkeeping runs to completion even
        // if the session is cancelled meanwhile.
        let mut record = PositionRecord::open(
            &client.pair,
            &order_id,
            plan.order_type,
            plan.price,
            plan.volume,
            Utc::now(),
            self.ctx.trade.profit_margin,
        );
        match client.gateway().check_order(&order_id).await {
            Ok(details) => record.apply_settlement(&details),
            Err(e) => debug!(order_id = %order_id, error = %e, "Settlement not available yet"),
        }

        if let Err(e) = self.ledger.add_record(&record).await {
            error!(order_id = %order_id, pair = %client.pair, error = %e, "Opening order placed but not recorded");
            if record.status != OrderState::Complete {
                cancel_unrecorded(client, &order_id).await;
            }
            return Err(e.into());
        }

        info!(
            order_id = %record.id,
            pair = %client.pair,
            order_type = %record.order_type,
            price = %record.open_price,
            volume = %record.open_volume,
            trigger = %record.trigger_price,
            "Position opened"
        );
        self.ctx.emit(SessionEvent::PositionOpened(record.clone()));
        Ok(Some(record))
    }

    /// Closes every pending `order_type` record of the client's asset whose
    /// trigger price has been reached. Returns how many were closed.
    ///
    /// Longs are sold into the bid, shorts bought back at the ask.
    pub async fn sweep(&self, client: &AssetClient, order_type: OrderType) -> Result<usize> {
        self.ctx.checkpoint()?;
        let pending = self
            .ledger
            .records_by_type(&client.pair.base, order_type)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let ticker = match client.current_price(&self.ctx).await {
            Ok(ticker) => ticker,
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                warn!(pair = %client.pair, %order_type, error = %e, "No price for the sweep, trying next round");
                return Ok(0);
            }
        };
        let price = match order_type {
            OrderType::Long => ticker.bid,
            OrderType::Short => ticker.ask,
        };

        let mut closed = 0;
        for mut record in pending {
            self.ctx.checkpoint()?;
            if record.status != OrderState::Complete {
                self.refresh_settlement(client, &mut record).await?;
            }
            if !record.is_viable(price) {
                continue;
            }
            if self.close_position(client, &record, price).await? {
                closed += 1;
            }
        }
        debug!(pair = %client.pair, %order_type, %price, closed, "Sweep finished");
        Ok(closed)
    }

    async fn refresh_settlement(&self, client: &AssetClient, record: &mut PositionRecord) -> Result<()> {
        match client.check_order(&self.ctx, &record.id).await {
            Ok(details) => {
                let before = record.clone();
                record.apply_settlement(&details);
                if *record != before {
                    self.ledger.update_settlement(record).await?;
                }
                Ok(())
            }
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => {
                debug!(order_id = %record.id, error = %e, "Could not refresh settlement");
                Ok(())
            }
        }
    }

    /// Places the closing leg for `record`.
    ///
    /// The record is marked before the order goes out, so a crash in between
    /// is found by the reconciler. `Ok(false)` means the exchange refused and
    /// the record is pending again.
    async fn close_position(
        &self,
        client: &AssetClient,
        record: &PositionRecord,
        price: Decimal,
    ) -> Result<bool> {
        self.ledger.mark_closing(&record.id, Utc::now()).await?;

        let size = match record.order_type {
            OrderType::Long => OrderSize::Base(record.open_volume),
            OrderType::Short => OrderSize::Counter(record.open_volume * price),
        };
        let side = record.order_type.closing_side();
        let close_id = match client.place_order(&self.ctx, side, size).await {
            Ok(id) => id,
            Err(e) => {
                let cleared = self.ledger.clear_closing(&record.id).await;
                if e.is_terminal() {
                    if let Err(ledger_err) = cleared {
                        error!(order_id = %record.id, error = %ledger_err, "Could not clear close marker");
                    }
                    return Err(e);
                }
                cleared?;
                warn!(order_id = %record.id, side = side.as_str(), error = %e, "Closing order failed, will retry next round");
                return Ok(false);
            }
        };

        finish_close(&self.ctx, &self.ledger, &self.stats, record, &close_id, price, Utc::now()).await?;
        Ok(true)
    }
}

/// Withdraws an opening order the ledger could not take, so no position
/// exists that nothing tracks. A single attempt; a filled order stays put.
async fn cancel_unrecorded(client: &AssetClient, order_id: &str) {
    match client.gateway().cancel_order(order_id).await {
        Ok(true) => warn!(order_id = %order_id, "Cancelled unrecorded opening order"),
        Ok(false) => warn!(order_id = %order_id, "Exchange did not cancel unrecorded opening order"),
        Err(e) => error!(order_id = %order_id, error = %e, "Could not cancel unrecorded opening order"),
    }
}

/// Books a close the exchange has accepted: flags the record closed, adds the
/// profit to the stats book, then removes the record.
///
/// A stats failure is logged and does not stop the record from being removed.
pub(crate) async fn finish_close(
    ctx: &SessionContext,
    ledger: &Ledger,
    stats: &StatsBook,
    record: &PositionRecord,
    close_id: &str,
    close_price: Decimal,
    closed_at: DateTime<Utc>,
) -> Result<()> {
    ledger.record_close_order(&record.id, close_id, closed_at).await?;

    let entry = ProfitEntry::for_close(record, close_id, close_price, closed_at);
    match stats.record_close(&entry, record.order_type) {
        Ok(totals) => debug!(asset = %record.asset, total_profit = %totals.profit, "Stats book updated"),
        Err(e) => error!(order_id = %record.id, close_id, error = %e, "Position closed but stats were not updated"),
    }

    info!(
        order_id = %record.id,
        close_id,
        asset = %record.asset,
        order_type = %record.order_type,
        price = %close_price,
        profit = %entry.profit,
        "Position closed"
    );
    ctx.emit(SessionEvent::PositionClosed {
        record: record.clone(),
        close_order_id: close_id.to_string(),
        close_price,
    });

    ledger.delete_record(&record.id).await.map_err(Error::from)
}
