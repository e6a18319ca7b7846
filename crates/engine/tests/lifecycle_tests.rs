mod common;

use api_client::{ExchangeGateway, OrderSize};
use chrono::Utc;
use common::*;
use core_types::{AssetInfo, OrderSide, OrderState, OrderType, Pair, PositionRecord, Signal};
use database::{Ledger, StatsBook};
use engine::{AssetClient, Error, LifecycleManager, RoundOutcome, SessionContext};
use events::SessionEvent;
use risk::{SimpleRiskManager, SizingSettings};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn manager(ctx: &SessionContext, ledger: &Ledger, stats: &StatsBook, signal: Signal) -> LifecycleManager {
    let risk = SimpleRiskManager::new(SizingSettings { purchase_unit: ctx.trade.purchase_unit }).unwrap();
    LifecycleManager::new(
        ctx.clone(),
        ledger.clone(),
        stats.clone(),
        Box::new(risk),
        Box::new(FixedSignal(signal)),
    )
}

async fn client(gateway: &ScriptedGateway, ctx: &SessionContext) -> AssetClient {
    let gateway: Arc<dyn ExchangeGateway> = Arc::new(gateway.clone());
    AssetClient::connect(gateway, AssetInfo::lookup("XBT").unwrap(), "NGN", ctx)
        .await
        .unwrap()
}

fn settled(id: &str, order_type: OrderType, price: Decimal) -> PositionRecord {
    let mut record = PositionRecord::open(
        &Pair::new("XBT", "NGN"),
        id,
        order_type,
        price,
        dec!(0.5),
        Utc::now(),
        dec!(0.03),
    );
    record.status = OrderState::Complete;
    record
}

#[tokio::test]
async fn go_long_opens_fee_adjusted_position() {
    let (_dir, ledger, stats) = stores();
    let (ctx, mut rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    let outcome = lifecycle.run_round(&mut client).await.unwrap();

    let RoundOutcome::Completed(report) = outcome else {
        panic!("expected a completed round, got {outcome:?}");
    };
    let record = report.opened.expect("a position should have been opened");
    assert_eq!(record.order_type, OrderType::Long);
    assert_eq!(record.open_volume, dec!(0.0202));
    assert_eq!(record.trigger_price, dec!(5_150_000));
    assert_eq!(report.closed, 0);

    let placed = gateway.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].size, OrderSize::Counter(dec!(101_000)));

    let stored = ledger.record_by_id(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.trigger_price, dec!(5_150_000));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, SessionEvent::PositionOpened(r) if r.id == record.id)));
}

#[tokio::test]
async fn short_sell_opens_by_base_volume() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::ShortSell);

    lifecycle.run_round(&mut client).await.unwrap();

    let placed = gateway.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].side, OrderSide::Sell);
    assert_eq!(placed[0].size, OrderSize::Base(dec!(0.0202)));

    let shorts = ledger.records_by_type("XBT", OrderType::Short).await.unwrap();
    assert_eq!(shorts.len(), 1);
    assert_eq!(shorts[0].trigger_price, dec!(4_850_000));
}

#[tokio::test]
async fn at_most_one_position_per_round() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    for _ in 0..3 {
        lifecycle.run_round(&mut client).await.unwrap();
    }
    // The exchange refuses the fourth opening order.
    gateway.fail_next_order(api_error(400, "ErrInsufficientBalance"));
    lifecycle.run_round(&mut client).await.unwrap();

    assert_eq!(gateway.placed().len(), 3);
    assert_eq!(ledger.records_by_type("XBT", OrderType::Long).await.unwrap().len(), 3);
}

#[tokio::test]
async fn short_fiat_balance_skips_opening_only() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    gateway.set_balances(dec!(1), dec!(50_000));
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    let outcome = lifecycle.run_round(&mut client).await.unwrap();

    assert!(matches!(outcome, RoundOutcome::Completed(ref r) if r.opened.is_none()));
    assert!(gateway.placed().is_empty());
    assert!(ledger.all_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_closes_each_viable_record_once() {
    let (_dir, ledger, stats) = stores();
    let (ctx, mut rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    gateway.set_ticker(dec!(105_000), dec!(104_000));
    let client = client(&gateway, &ctx).await;
    let lifecycle = manager(&ctx, &ledger, &stats, Signal::Wait);

    ledger.add_record(&settled("L1", OrderType::Long, dec!(100_000))).await.unwrap();
    ledger.add_record(&settled("L2", OrderType::Long, dec!(102_000))).await.unwrap();

    assert_eq!(lifecycle.sweep(&client, OrderType::Long).await.unwrap(), 1);
    assert_eq!(lifecycle.sweep(&client, OrderType::Long).await.unwrap(), 0);

    let placed = gateway.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].side, OrderSide::Sell);
    assert_eq!(placed[0].size, OrderSize::Base(dec!(0.5)));

    assert!(ledger.record_by_id("L1").await.unwrap().is_none());
    assert!(ledger.record_by_id("L2").await.unwrap().is_some());

    let totals = stats.stats("XBT").unwrap().unwrap();
    assert_eq!(totals.profit, dec!(2_000));
    assert_eq!(stats.sales().unwrap().len(), 1);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::PositionClosed { record, close_price, .. }
            if record.id == "L1" && *close_price == dec!(104_000)
    )));
}

#[tokio::test]
async fn refused_close_keeps_record_pending() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    gateway.set_ticker(dec!(105_000), dec!(104_000));
    let client = client(&gateway, &ctx).await;
    let lifecycle = manager(&ctx, &ledger, &stats, Signal::Wait);

    ledger.add_record(&settled("L1", OrderType::Long, dec!(100_000))).await.unwrap();
    gateway.fail_next_order(api_error(400, "ErrInsufficientBalance"));

    assert_eq!(lifecycle.sweep(&client, OrderType::Long).await.unwrap(), 0);

    let record = ledger.record_by_id("L1").await.unwrap().unwrap();
    assert!(record.is_pending());
    assert!(stats.stats("XBT").unwrap().is_none());

    // Next round tries again.
    assert_eq!(lifecycle.sweep(&client, OrderType::Long).await.unwrap(), 1);
    assert!(ledger.record_by_id("L1").await.unwrap().is_none());
}

#[tokio::test]
async fn fatal_close_error_survives_a_ledger_failure() {
    let (dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    gateway.set_ticker(dec!(105_000), dec!(104_000));
    let client = client(&gateway, &ctx).await;
    let lifecycle = manager(&ctx, &ledger, &stats, Signal::Wait);

    ledger.add_record(&settled("L1", OrderType::Long, dec!(100_000))).await.unwrap();
    gateway.fail_next_order(api_error(401, "ErrAPIKeyRevoked"));
    // The ledger disappears while the order is in flight.
    let db = dir.path().join("ledger.db");
    gateway.on_next_order(move || {
        std::fs::remove_file(&db).unwrap();
        std::fs::create_dir(&db).unwrap();
    });

    let result = lifecycle.sweep(&client, OrderType::Long).await;

    assert!(matches!(result, Err(Error::Fatal(_))), "got {result:?}");
}

#[tokio::test]
async fn unrecorded_opening_order_is_cancelled() {
    let (dir, _ledger, stats) = stores();
    let ledger = broken_ledger(&dir);
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    let result = lifecycle.run_round(&mut client).await;

    assert!(matches!(result, Err(Error::Ledger(_))), "got {result:?}");
    assert_eq!(gateway.placed().len(), 1);
    assert_eq!(gateway.cancelled(), vec!["BX1".to_string()]);
}

#[tokio::test]
async fn short_sweep_buys_back_below_trigger() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let client = client(&gateway, &ctx).await;
    let lifecycle = manager(&ctx, &ledger, &stats, Signal::Wait);

    ledger.add_record(&settled("S1", OrderType::Short, dec!(100_000))).await.unwrap();

    gateway.set_ticker(dec!(98_000), dec!(97_500));
    assert_eq!(lifecycle.sweep(&client, OrderType::Short).await.unwrap(), 0);

    gateway.set_ticker(dec!(96_500), dec!(96_000));
    assert_eq!(lifecycle.sweep(&client, OrderType::Short).await.unwrap(), 1);

    let placed = gateway.placed();
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].size, OrderSize::Counter(dec!(48_250)));

    let totals = stats.stats("XBT").unwrap().unwrap();
    assert_eq!(totals.profit, dec!(1_750));
    assert_eq!(stats.purchases().unwrap().len(), 1);
}

#[tokio::test]
async fn sweep_refreshes_unsettled_records() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let client = client(&gateway, &ctx).await;
    let lifecycle = manager(&ctx, &ledger, &stats, Signal::Wait);

    let mut record = settled("L1", OrderType::Long, dec!(5_000_000));
    record.status = OrderState::Pending;
    ledger.add_record(&record).await.unwrap();

    let mut details = pending_order("L1");
    details.state = OrderState::Complete;
    details.base = dec!(0.4995);
    details.counter = dec!(2_497_500);
    details.fee_base = dec!(0.0005);
    gateway.set_order_details(details);

    lifecycle.sweep(&client, OrderType::Long).await.unwrap();

    let stored = ledger.record_by_id("L1").await.unwrap().unwrap();
    assert_eq!(stored.status, OrderState::Complete);
    assert_eq!(stored.open_volume, dec!(0.4995));
    assert_eq!(stored.asset_fee, dec!(0.0005));
    assert_eq!(stored.trigger_price, dec!(5_150_000));
}

#[tokio::test]
async fn price_outage_is_reported_not_raised() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    for _ in 0..3 {
        gateway.fail_ticker(api_error(503, ""));
    }
    let outcome = lifecycle.run_round(&mut client).await.unwrap();

    assert_eq!(outcome, RoundOutcome::PriceUnavailable);
    assert_eq!(gateway.ticker_calls(), 3);
    assert!(gateway.placed().is_empty());
}

#[tokio::test]
async fn empty_order_book_skips_the_round() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    for _ in 0..3 {
        gateway.fail_ticker(api_client::Error::NoMarket("no ask".into()));
    }
    let outcome = lifecycle.run_round(&mut client).await.unwrap();

    assert_eq!(outcome, RoundOutcome::PriceUnavailable);
    assert!(gateway.placed().is_empty());
}

#[tokio::test]
async fn transient_fee_failure_is_retried() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    gateway.fail_fee(api_error(500, ""));
    gateway.fail_fee(api_error(429, "ErrTooManyRequests"));
    let outcome = lifecycle.run_round(&mut client).await.unwrap();

    assert!(matches!(outcome, RoundOutcome::Completed(ref r) if r.opened.is_some()));
}

#[tokio::test]
async fn tiny_purchase_unit_is_below_minimum() {
    let (_dir, ledger, stats) = stores();
    let mut trade = trade_settings();
    trade.purchase_unit = dec!(1_000);
    let (ctx, _rx) = context(trade);
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    let outcome = lifecycle.run_round(&mut client).await.unwrap();

    assert_eq!(outcome, RoundOutcome::BelowMinimum);
    assert!(gateway.placed().is_empty());
}

#[tokio::test]
async fn revoked_key_is_fatal() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    gateway.fail_next_order(api_error(401, "ErrAPIKeyRevoked"));
    let err = lifecycle.run_round(&mut client).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(ledger.all_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_session_stops_the_round() {
    let (_dir, ledger, stats) = stores();
    let (ctx, _rx) = context(trade_settings());
    let gateway = ScriptedGateway::new();
    let mut client = client(&gateway, &ctx).await;
    let mut lifecycle = manager(&ctx, &ledger, &stats, Signal::GoLong);

    ctx.cancel_token().cancel();
    let err = lifecycle.run_round(&mut client).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(gateway.placed().is_empty());
}
