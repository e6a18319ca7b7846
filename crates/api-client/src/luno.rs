// In crates/api-client/src/luno.rs

use crate::gateway::ExchangeGateway;
use crate::rate_limit::RateLimiter;
use crate::types::{
    AccountIds, Balance, BalancesResponse, FeeInfo, ListOrdersResponse, OrderSize,
    PostOrderResponse, RawOrder, StopOrderResponse, Ticker, TickerResponse, TradesResponse,
    check_body, window_prices,
};
use crate::{Error, Result};
use app_config::ExchangeSettings;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{OrderDetails, OrderSide, Pair};
use reqwest::{Client, RequestBuilder};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// REST client for a Luno-style exchange API.
///
/// Authenticates with HTTP basic auth (key id and secret) and waits on a
/// [`RateLimiter`] before every request.
#[derive(Debug, Clone)]
pub struct LunoClient {
    http_client: Client,
    api_key_id: String,
    api_key_secret: String,
    base_url: String,
    limiter: RateLimiter,
}

impl LunoClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        Ok(Self {
            http_client,
            api_key_id: settings.api_key_id.clone(),
            api_key_secret: settings.api_key_secret.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(settings.request_delay(), settings.history_delay()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.limiter.wait().await;
        self.send(self.http_client.get(self.url(path)).query(query)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T> {
        self.limiter.wait().await;
        self.send(self.http_client.post(self.url(path)).form(form)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .basic_auth(&self.api_key_id, Some(&self.api_key_secret))
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let value = check_body(status, &text)?;
        Ok(serde_json::from_value(value)?)
    }
}

fn base_amount(volume: Decimal) -> String {
    volume
        .round_dp_with_strategy(6, RoundingStrategy::ToZero)
        .normalize()
        .to_string()
}

fn counter_amount(amount: Decimal) -> String {
    amount
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        .normalize()
        .to_string()
}

#[async_trait]
impl ExchangeGateway for LunoClient {
    async fn current_price(&self, pair: &Pair) -> Result<Ticker> {
        let res: TickerResponse = self.get("/api/1/ticker", &[("pair", pair.code())]).await?;
        if res.ask <= Decimal::ZERO {
            return Err(Error::NoMarket(format!("ticker for {pair} has no ask price")));
        }
        Ok(Ticker { ask: res.ask, bid: res.bid })
    }

    #[instrument(skip(self, pair), fields(pair = %pair))]
    async fn previous_prices(
        &self,
        pair: &Pair,
        count: usize,
        interval: Duration,
    ) -> Result<Vec<Decimal>> {
        let now = Utc::now();
        let mut windows = Vec::with_capacity(count);
        for i in (1..=count).rev() {
            let offset = chrono::Duration::from_std(interval * i as u32)
                .map_err(|e| Error::InvalidResponse(e.to_string()))?;
            let since = (now - offset).timestamp_millis();

            self.limiter.wait_history().await;
            let res: TradesResponse = self
                .send(
                    self.http_client
                        .get(self.url("/api/1/trades"))
                        .query(&[("pair", pair.code()), ("since", since.to_string())]),
                )
                .await?;
            windows.push(res.trades.unwrap_or_default());
        }
        let prices = window_prices(windows);
        debug!(count = prices.len(), "Historical prices retrieved");
        Ok(prices)
    }

    async fn fee_info(&self, pair: &Pair) -> Result<FeeInfo> {
        self.get("/api/1/fee_info", &[("pair", pair.code())]).await
    }

    #[instrument(skip(self, pair, side, accounts), fields(pair = %pair, side = side.as_str()))]
    async fn place_market_order(
        &self,
        pair: &Pair,
        side: OrderSide,
        size: OrderSize,
        accounts: &AccountIds,
    ) -> Result<String> {
        let mut form = vec![("pair", pair.code()), ("type", side.as_str().to_string())];
        match size {
            OrderSize::Base(volume) => form.push(("base_volume", base_amount(volume))),
            OrderSize::Counter(amount) => form.push(("counter_volume", counter_amount(amount))),
        }
        if let Some(id) = &accounts.base {
            form.push(("base_account_id", id.clone()));
        }
        if let Some(id) = &accounts.counter {
            form.push(("counter_account_id", id.clone()));
        }
        let res: PostOrderResponse = self.post("/api/1/marketorder", &form).await?;
        debug!(order_id = %res.order_id, "Market order accepted");
        Ok(res.order_id)
    }

    async fn check_order(&self, order_id: &str) -> Result<OrderDetails> {
        let raw: RawOrder = self.get(&format!("/api/1/orders/{order_id}"), &[]).await?;
        Ok(raw.into())
    }

    async fn balances(&self, assets: &[String]) -> Result<Vec<Balance>> {
        let query: Vec<(&str, String)> = assets.iter().map(|a| ("assets", a.clone())).collect();
        let res: BalancesResponse = self.get("/api/1/balance", &query).await?;
        Ok(res.balance.unwrap_or_default())
    }

    async fn list_orders(&self, pair: &Pair) -> Result<Vec<OrderDetails>> {
        let res: ListOrdersResponse = self.get("/api/1/listorders", &[("pair", pair.code())]).await?;
        Ok(res.orders.unwrap_or_default().into_iter().map(OrderDetails::from).collect())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool> {
        let res: StopOrderResponse = self
            .post("/api/1/stoporder", &[("order_id", order_id.to_string())])
            .await?;
        Ok(res.success)
    }
}
