// Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use api_client::{AccountIds, Balance, ExchangeGateway, FeeInfo, OrderSize, Ticker};
use app_config::TradeSettings;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{OrderDetails, OrderSide, OrderState, Pair, Signal, TradingMode};
use database::{Ledger, StatsBook};
use engine::SessionContext;
use events::SessionEvent;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// An order the scripted exchange accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub id: String,
    pub side: OrderSide,
    pub size: OrderSize,
}

#[derive(Default)]
struct Script {
    ticker: Option<Ticker>,
    fee: Option<FeeInfo>,
    history: Vec<Decimal>,
    balances: Vec<Balance>,
    details: HashMap<String, OrderDetails>,
    listed: Vec<OrderDetails>,
    placed: Vec<PlacedOrder>,
    next_id: u64,
    ticker_errors: VecDeque<api_client::Error>,
    fee_errors: VecDeque<api_client::Error>,
    balance_errors: VecDeque<api_client::Error>,
    order_errors: VecDeque<api_client::Error>,
    ticker_calls: usize,
    cancelled: Vec<String>,
    order_hooks: VecDeque<Box<dyn FnOnce() + Send>>,
}

/// An in-memory exchange. Prices, fees and balances are set by the test;
/// failures are queued per call and consumed one at a time.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.set_ticker(dec!(5_000_000), dec!(4_990_000));
        gateway.set_fee(dec!(0.01));
        gateway.set_balances(dec!(1), dec!(1_000_000));
        gateway
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn set_ticker(&self, ask: Decimal, bid: Decimal) {
        self.with(|s| s.ticker = Some(Ticker { ask, bid }));
    }

    pub fn set_fee(&self, taker_fee: Decimal) {
        self.with(|s| {
            s.fee = Some(FeeInfo { maker_fee: Decimal::ZERO, taker_fee, thirty_day_volume: Decimal::ZERO })
        });
    }

    pub fn set_balances(&self, asset: Decimal, fiat: Decimal) {
        self.with(|s| {
            s.balances = vec![
                Balance { account_id: "1001".into(), asset: "XBT".into(), balance: asset, reserved: Decimal::ZERO },
                Balance { account_id: "2002".into(), asset: "NGN".into(), balance: fiat, reserved: Decimal::ZERO },
            ]
        });
    }

    pub fn set_history(&self, prices: Vec<Decimal>) {
        self.with(|s| s.history = prices);
    }

    pub fn set_order_details(&self, details: OrderDetails) {
        self.with(|s| {
            s.details.insert(details.order_id.clone(), details);
        });
    }

    pub fn set_listed_orders(&self, orders: Vec<OrderDetails>) {
        self.with(|s| s.listed = orders);
    }

    pub fn fail_ticker(&self, error: api_client::Error) {
        self.with(|s| s.ticker_errors.push_back(error));
    }

    pub fn fail_fee(&self, error: api_client::Error) {
        self.with(|s| s.fee_errors.push_back(error));
    }

    pub fn fail_balances(&self, error: api_client::Error) {
        self.with(|s| s.balance_errors.push_back(error));
    }

    pub fn fail_next_order(&self, error: api_client::Error) {
        self.with(|s| s.order_errors.push_back(error));
    }

    /// Queues `hook` to run when an order reaches the exchange, one hook per order.
    pub fn on_next_order(&self, hook: impl FnOnce() + Send + 'static) {
        self.with(|s| s.order_hooks.push_back(Box::new(hook)));
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.with(|s| s.cancelled.clone())
    }

    pub fn placed(&self) -> Vec<PlacedOrder> {
        self.with(|s| s.placed.clone())
    }

    pub fn ticker_calls(&self) -> usize {
        self.with(|s| s.ticker_calls)
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn current_price(&self, _pair: &Pair) -> api_client::Result<Ticker> {
        self.with(|s| {
            s.ticker_calls += 1;
            if let Some(e) = s.ticker_errors.pop_front() {
                return Err(e);
            }
            s.ticker.ok_or_else(|| api_client::Error::InvalidResponse("no ticker".into()))
        })
    }

    async fn previous_prices(
        &self,
        _pair: &Pair,
        count: usize,
        _interval: Duration,
    ) -> api_client::Result<Vec<Decimal>> {
        self.with(|s| Ok(s.history.iter().take(count).copied().collect()))
    }

    async fn fee_info(&self, _pair: &Pair) -> api_client::Result<FeeInfo> {
        self.with(|s| {
            if let Some(e) = s.fee_errors.pop_front() {
                return Err(e);
            }
            s.fee.ok_or_else(|| api_client::Error::InvalidResponse("no fee info".into()))
        })
    }

    async fn place_market_order(
        &self,
        _pair: &Pair,
        side: OrderSide,
        size: OrderSize,
        _accounts: &AccountIds,
    ) -> api_client::Result<String> {
        if let Some(hook) = self.with(|s| s.order_hooks.pop_front()) {
            hook();
        }
        self.with(|s| {
            if let Some(e) = s.order_errors.pop_front() {
                return Err(e);
            }
            s.next_id += 1;
            let id = format!("BX{}", s.next_id);
            s.placed.push(PlacedOrder { id: id.clone(), side, size });
            Ok(id)
        })
    }

    async fn check_order(&self, order_id: &str) -> api_client::Result<OrderDetails> {
        self.with(|s| {
            Ok(s.details.get(order_id).cloned().unwrap_or_else(|| pending_order(order_id)))
        })
    }

    async fn balances(&self, _assets: &[String]) -> api_client::Result<Vec<Balance>> {
        self.with(|s| {
            if let Some(e) = s.balance_errors.pop_front() {
                return Err(e);
            }
            Ok(s.balances.clone())
        })
    }

    async fn list_orders(&self, _pair: &Pair) -> api_client::Result<Vec<OrderDetails>> {
        self.with(|s| Ok(s.listed.clone()))
    }

    async fn cancel_order(&self, order_id: &str) -> api_client::Result<bool> {
        self.with(|s| s.cancelled.push(order_id.to_string()));
        Ok(true)
    }
}

pub fn pending_order(order_id: &str) -> OrderDetails {
    OrderDetails {
        order_id: order_id.to_string(),
        side: None,
        state: OrderState::Pending,
        base: Decimal::ZERO,
        counter: Decimal::ZERO,
        fee_base: Decimal::ZERO,
        fee_counter: Decimal::ZERO,
        created_at: Some(Utc::now()),
        completed_at: None,
    }
}

pub fn api_error(status: u16, code: &str) -> api_client::Error {
    api_client::Error::ApiError { status, code: code.to_string(), msg: "scripted".into() }
}

/// A signal source that always says the same thing.
pub struct FixedSignal(pub Signal);

impl strategies::SignalSource for FixedSignal {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn price_dimensions(&self) -> (usize, Duration) {
        (3, Duration::from_secs(60))
    }

    fn analyze(&mut self, _prices: &[Decimal]) -> strategies::Result<()> {
        Ok(())
    }

    fn emit(&self) -> Signal {
        self.0
    }
}

pub fn trade_settings() -> TradeSettings {
    TradeSettings {
        assets: vec!["XBT".into()],
        currency: "NGN".into(),
        purchase_unit: dec!(100_000),
        profit_margin: dec!(0.03),
        snooze_period_mins: 10,
        random_snooze: false,
        snooze_times_mins: Vec::new(),
        trading_mode: TradingMode::Contrarian,
        exit_on_init_failure: false,
        connect_retries: 3,
        retry_attempts: 3,
        retry_backoff_secs: 0,
        rate_limit_backoff_secs: 0,
        max_ledger_failures: 3,
        analysis_plugin: None,
    }
}

/// Temporary ledger and stats book, removed when the returned dir drops.
pub fn stores() -> (TempDir, Ledger, StatsBook) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("ledger.db"));
    let stats = StatsBook::new(dir.path().join("stats"), 100);
    (dir, ledger, stats)
}

/// A ledger every operation on fails: its path is a directory.
pub fn broken_ledger(dir: &TempDir) -> Ledger {
    let path = dir.path().join("not-a-database");
    std::fs::create_dir_all(&path).unwrap();
    Ledger::new(path)
}

pub fn context(trade: TradeSettings) -> (SessionContext, broadcast::Receiver<SessionEvent>) {
    let (tx, rx) = broadcast::channel(engine::EVENT_CHANNEL_CAPACITY);
    let mut ctx = SessionContext::new(trade, CancellationToken::new(), tx);
    ctx.connect.short_wait = Duration::ZERO;
    ctx.connect.long_wait = Duration::ZERO;
    ctx.price_failure_wait = Duration::ZERO;
    (ctx, rx)
}

/// Everything sent on `rx` so far.
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
