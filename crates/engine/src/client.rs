// In crates/engine/src/client.rs

use crate::{Result, SessionContext};
use api_client::{AccountIds, ExchangeGateway, FeeInfo, OrderSize, Ticker};
use core_types::{AssetInfo, OrderDetails, OrderSide, Pair};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One traded asset bound to the exchange gateway.
///
/// Holds the account ids orders are booked against and the last balances seen.
pub struct AssetClient {
    pub pair: Pair,
    pub info: AssetInfo,
    gateway: Arc<dyn ExchangeGateway>,
    accounts: AccountIds,
    asset_balance: Decimal,
    fiat_balance: Decimal,
}

impl AssetClient {
    /// Binds `info` to the gateway and loads its balances.
    pub async fn connect(
        gateway: Arc<dyn ExchangeGateway>,
        info: AssetInfo,
        currency: &str,
        ctx: &SessionContext,
    ) -> Result<Self> {
        let mut client = Self {
            pair: Pair::new(info.code, currency),
            info,
            gateway,
            accounts: AccountIds::default(),
            asset_balance: Decimal::ZERO,
            fiat_balance: Decimal::ZERO,
        };
        client.refresh_balances(ctx).await?;
        if client.accounts.base.is_none() || client.accounts.counter.is_none() {
            warn!(pair = %client.pair, "No account found for one side of the pair, the exchange default will be used");
        }
        info!(
            pair = %client.pair,
            asset_balance = %client.asset_balance,
            fiat_balance = %client.fiat_balance,
            "Asset client connected"
        );
        Ok(client)
    }

    pub fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    pub fn accounts(&self) -> &AccountIds {
        &self.accounts
    }

    pub fn asset_balance(&self) -> Decimal {
        self.asset_balance
    }

    pub fn fiat_balance(&self) -> Decimal {
        self.fiat_balance
    }

    pub async fn refresh_balances(&mut self, ctx: &SessionContext) -> Result<()> {
        let codes = vec![self.pair.base.clone(), self.pair.counter.clone()];
        let gateway = &self.gateway;
        let balances = ctx.retry("balances", || gateway.balances(&codes)).await?;

        for balance in balances {
            if balance.asset.eq_ignore_ascii_case(&self.pair.base) {
                self.asset_balance = balance.available();
                self.accounts.base = Some(balance.account_id);
            } else if balance.asset.eq_ignore_ascii_case(&self.pair.counter) {
                self.fiat_balance = balance.available();
                self.accounts.counter = Some(balance.account_id);
            }
        }
        debug!(pair = %self.pair, asset = %self.asset_balance, fiat = %self.fiat_balance, "Balances refreshed");
        Ok(())
    }

    pub async fn current_price(&self, ctx: &SessionContext) -> Result<Ticker> {
        let (gateway, pair) = (&self.gateway, &self.pair);
        ctx.retry("ticker", || gateway.current_price(pair)).await
    }

    pub async fn fee_info(&self, ctx: &SessionContext) -> Result<FeeInfo> {
        let (gateway, pair) = (&self.gateway, &self.pair);
        ctx.retry("fee_info", || gateway.fee_info(pair)).await
    }

    pub async fn previous_prices(
        &self,
        ctx: &SessionContext,
        count: usize,
        interval: Duration,
    ) -> Result<Vec<Decimal>> {
        let (gateway, pair) = (&self.gateway, &self.pair);
        ctx.retry("trades", || gateway.previous_prices(pair, count, interval))
            .await
    }

    pub async fn check_order(&self, ctx: &SessionContext, order_id: &str) -> Result<OrderDetails> {
        let gateway = &self.gateway;
        ctx.retry("check_order", || gateway.check_order(order_id)).await
    }

    pub async fn list_orders(&self, ctx: &SessionContext) -> Result<Vec<OrderDetails>> {
        let (gateway, pair) = (&self.gateway, &self.pair);
        ctx.retry("list_orders", || gateway.list_orders(pair)).await
    }

    /// Places a market order. Never repeated: a timed-out order may still have
    /// gone through, and a second one would double the position.
    pub async fn place_order(
        &self,
        ctx: &SessionContext,
        side: OrderSide,
        size: OrderSize,
    ) -> Result<String> {
        ctx.checkpoint()?;
        let order_id = self
            .gateway
            .place_market_order(&self.pair, side, size, &self.accounts)
            .await?;
        Ok(order_id)
    }
}
