// In crates/engine/src/session.rs

use crate::client::AssetClient;
use crate::lifecycle::{LifecycleManager, RoundOutcome};
use crate::reconciler::Reconciler;
use crate::{Error, Result, SessionContext};
use api_client::ExchangeGateway;
use app_config::{Settings, TradeSettings};
use core_types::AssetInfo;
use database::{Ledger, StatsBook};
use events::{SessionEvent, SessionState};
use rand::seq::SliceRandom;
use risk::{RiskManager, SimpleRiskManager, SizingSettings};
use std::sync::Arc;
use std::time::Duration;
use strategies::SignalSource;
use tracing::{error, info, warn};

struct Slot {
    client: AssetClient,
    reconciled: bool,
}

/// Drives the trading loop: connect every configured asset, then run a round
/// per asset and snooze, until cancelled or a fatal error.
///
/// `Initializing -> Connected -> (RoundRunning <-> Snoozing) -> Stopped`
pub struct Session {
    ctx: SessionContext,
    gateway: Arc<dyn ExchangeGateway>,
    assets: Vec<AssetInfo>,
    lifecycle: LifecycleManager,
    reconciler: Reconciler,
}

impl Session {
    pub fn new(
        ctx: SessionContext,
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Ledger,
        stats: StatsBook,
        risk: Box<dyn RiskManager>,
        source: Box<dyn SignalSource>,
    ) -> Result<Self> {
        if ctx.trade.assets.is_empty() {
            return Err(Error::Fatal("no assets to trade were configured".into()));
        }
        let assets = ctx
            .trade
            .assets
            .iter()
            .map(|code| AssetInfo::lookup(code).map_err(|e| Error::Fatal(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let reconciler = Reconciler::new(ctx.clone(), ledger.clone(), stats.clone());
        let lifecycle = LifecycleManager::new(ctx.clone(), ledger, stats, risk, source);
        Ok(Self { ctx, gateway, assets, lifecycle, reconciler })
    }

    /// Builds a session from the application settings, with the default
    /// position sizing and the configured signal source.
    pub fn from_settings(
        settings: &Settings,
        gateway: Arc<dyn ExchangeGateway>,
        ctx: SessionContext,
    ) -> Result<Self> {
        let (ledger, stats) = database::stores(&settings.ledger);
        let risk = SimpleRiskManager::new(SizingSettings { purchase_unit: settings.trade.purchase_unit })
            .map_err(|e| Error::Fatal(e.to_string()))?;
        let source = strategies::default_registry(
            settings.strategies.hermes.clone(),
            settings.trade.trading_mode,
        )?
        .select(settings.trade.analysis_plugin.as_deref())?;

        Self::new(ctx, gateway, ledger, stats, Box::new(risk), source)
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Runs until cancelled (`Ok`) or until a fatal error (`Err`).
    ///
    /// `SessionEvent::Stopped` is the last event sent, whichever way the
    /// session ends.
    pub async fn run(mut self) -> Result<()> {
        let result = match self.run_inner().await {
            Err(Error::Cancelled) => {
                info!("Trading session cancelled");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Trading session stopped");
                self.ctx.emit(SessionEvent::Error(e.to_string()));
                Err(e)
            }
            Ok(()) => Ok(()),
        };
        self.ctx.emit(SessionEvent::StateChanged(SessionState::Stopped));
        self.ctx.emit(SessionEvent::Stopped);
        result
    }

    async fn run_inner(&mut self) -> Result<()> {
        self.ctx.emit(SessionEvent::StateChanged(SessionState::Initializing));
        let clients = self.connect().await?;
        let mut slots: Vec<Slot> = clients
            .into_iter()
            .map(|client| Slot { client, reconciled: false })
            .collect();
        self.ctx.emit(SessionEvent::StateChanged(SessionState::Connected));

        let mut ledger_failures = 0u32;
        let mut round = 0u64;
        loop {
            self.ctx.checkpoint()?;
            round += 1;
            self.ctx.emit(SessionEvent::StateChanged(SessionState::RoundRunning));
            info!(round, "Round started");

            let single_asset = slots.len() == 1;
            let mut below_minimum = 0;
            let mut price_missing = false;

            for slot in slots.iter_mut() {
                self.ctx.checkpoint()?;

                // A failed reconciliation skips the asset and counts like a failed round.
                let result = match self.reconcile_once(slot).await {
                    Ok(()) => self.lifecycle.run_round(&mut slot.client).await,
                    Err(e) => Err(e),
                };

                match result {
                    Ok(RoundOutcome::Completed(report)) => {
                        ledger_failures = 0;
                        info!(
                            pair = %slot.client.pair,
                            signal = %report.signal,
                            opened = report.opened.is_some(),
                            closed = report.closed,
                            "Asset round complete"
                        );
                    }
                    Ok(RoundOutcome::PriceUnavailable) => price_missing = true,
                    Ok(RoundOutcome::BelowMinimum) => below_minimum += 1,
                    Ok(RoundOutcome::Skipped(reason)) => {
                        info!(pair = %slot.client.pair, %reason, "Asset skipped this round");
                    }
                    Err(e) if e.is_terminal() => return Err(e),
                    Err(Error::Ledger(e)) => {
                        ledger_failures += 1;
                        error!(pair = %slot.client.pair, error = %e, failures = ledger_failures, "Ledger failure");
                        self.ctx.emit(SessionEvent::Error(e.to_string()));
                        if ledger_failures >= self.ctx.trade.max_ledger_failures {
                            return Err(Error::Fatal(format!(
                                "ledger failed {ledger_failures} times in a row: {e}"
                            )));
                        }
                    }
                    Err(e) => {
                        warn!(pair = %slot.client.pair, error = %e, "Asset round failed");
                        self.ctx.emit(SessionEvent::Error(e.to_string()));
                    }
                }
            }

            if below_minimum == slots.len() {
                return Err(Error::Fatal(format!(
                    "purchase unit {} is below the minimum order of every configured asset",
                    self.ctx.trade.purchase_unit
                )));
            }

            if single_asset && price_missing {
                warn!(wait_secs = self.ctx.price_failure_wait.as_secs(), "No price for the only asset, retrying shortly");
                self.ctx.sleep(self.ctx.price_failure_wait).await?;
                continue;
            }

            let pause = snooze_duration(&self.ctx.trade);
            self.ctx.emit(SessionEvent::StateChanged(SessionState::Snoozing));
            info!(round, minutes = pause.as_secs() / 60, "Snoozing");
            self.ctx.sleep(pause).await?;
        }
    }

    async fn reconcile_once(&self, slot: &mut Slot) -> Result<()> {
        if !slot.reconciled {
            self.reconciler.reconcile(&slot.client).await?;
            slot.reconciled = true;
        }
        Ok(())
    }

    /// Connects every asset, following the startup policy when the exchange
    /// cannot be reached.
    async fn connect(&self) -> Result<Vec<AssetClient>> {
        let policy = self.ctx.connect;
        let mut retries_left = policy.retries;
        loop {
            self.ctx.checkpoint()?;
            match self.connect_all().await {
                Ok(clients) => return Ok(clients),
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) if policy.exit_on_failure => {
                    return Err(Error::Fatal(format!("initialization failed: {e}")));
                }
                Err(e) => {
                    let wait = if retries_left > 0 {
                        retries_left -= 1;
                        policy.short_wait
                    } else {
                        policy.long_wait
                    };
                    warn!(error = %e, retries_left, wait_secs = wait.as_secs(), "Could not connect to the exchange");
                    self.ctx.emit(SessionEvent::Error(e.to_string()));
                    self.ctx.sleep(wait).await?;
                }
            }
        }
    }

    async fn connect_all(&self) -> Result<Vec<AssetClient>> {
        let mut clients = Vec::with_capacity(self.assets.len());
        for info in &self.assets {
            let client = AssetClient::connect(
                self.gateway.clone(),
                info.clone(),
                &self.ctx.trade.currency,
                &self.ctx,
            )
            .await?;
            clients.push(client);
        }
        Ok(clients)
    }
}

/// The pause between rounds: a random pick from `snooze_times_mins` when
/// `random_snooze` is set, `snooze_period_mins` otherwise.
pub fn snooze_duration(trade: &TradeSettings) -> Duration {
    let minutes = if trade.random_snooze {
        trade
            .snooze_times_mins
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(trade.snooze_period_mins)
    } else {
        trade.snooze_period_mins
    };
    Duration::from_secs(minutes * 60)
}
