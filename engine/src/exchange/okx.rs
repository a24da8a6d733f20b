//! Signed REST client for the OKX v5 spot API

use crate::data::Bar;
use crate::error::EngineError;
use crate::exchange::client::SpotExchangeApi;
use crate::exchange::types::*;
use crate::Result;
use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://www.okx.com";

/// API credentials for a signed session
#[derive(Debug, Clone)]
pub struct OkxCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
    /// Demo-trading flag (`x-simulated-trading: 1`)
    pub simulated: bool,
}

pub struct OkxRest {
    http: reqwest::Client,
    base_url: String,
    credentials: OkxCredentials,
}

impl OkxRest {
    pub fn new(credentials: OkxCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Canonical timeframe name to the venue's bar parameter
    /// (sub-hour intervals stay lowercase, the rest are upper-cased).
    fn venue_bar(bar: &str) -> String {
        if bar.ends_with('m') {
            bar.to_string()
        } else {
            bar.to_uppercase()
        }
    }

    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        let payload = format!("{}{}{}{}", timestamp, method, path, body);
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse<T>> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let body_str = body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        let signature = self.sign(&timestamp, method.as_str(), path, &body_str);

        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("OK-ACCESS-KEY", &self.credentials.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.credentials.passphrase)
            .header("Content-Type", "application/json");
        if self.credentials.simulated {
            builder = builder.header("x-simulated-trading", "1");
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::ExchangeTransient(e.to_string()))?;
        if response.status().is_server_error() {
            return Err(EngineError::ExchangeTransient(format!(
                "venue returned {}",
                response.status()
            )));
        }
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| EngineError::ExchangeTransient(format!("malformed response: {}", e)))?;
        Ok(envelope)
    }

    fn check<T>(envelope: &ApiResponse<T>) -> Result<()> {
        if envelope.is_ok() {
            return Ok(());
        }
        if envelope.code == CODE_IP_NOT_WHITELISTED {
            return Err(EngineError::ExchangePermanent(format!(
                "request IP is not whitelisted for this API key: {}",
                envelope.msg
            )));
        }
        Err(EngineError::ExchangeTransient(format!(
            "venue error {}: {}",
            envelope.code, envelope.msg
        )))
    }

    /// OKX candle rows are `[ts_ms, o, h, l, c, vol, ...]`, newest first.
    fn parse_candles(rows: Vec<Vec<String>>) -> Vec<Bar> {
        let mut bars: Vec<Bar> = rows
            .into_iter()
            .filter_map(|row| {
                let ts_ms: i64 = row.first()?.parse().ok()?;
                let field = |i: usize| row.get(i)?.parse::<f64>().ok();
                Some(Bar::new(
                    Utc.timestamp_millis_opt(ts_ms).single()?,
                    field(1)?,
                    field(2)?,
                    field(3)?,
                    field(4)?,
                    field(5)?,
                ))
            })
            .collect();
        bars.sort_by_key(|b| b.timestamp);
        bars
    }
}

#[async_trait]
impl SpotExchangeApi for OkxRest {
    async fn get_candlesticks(&self, inst_id: &str, bar: &str, limit: usize) -> Result<Vec<Bar>> {
        let path = format!(
            "/api/v5/market/candles?instId={}&bar={}&limit={}",
            inst_id,
            Self::venue_bar(bar),
            limit
        );
        let envelope: ApiResponse<Vec<String>> =
            self.request(reqwest::Method::GET, &path, None).await?;
        Self::check(&envelope)?;
        Ok(Self::parse_candles(envelope.data))
    }

    async fn get_history_candlesticks(
        &self,
        inst_id: &str,
        bar: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        // `before`/`after` are exclusive millisecond bounds on this endpoint
        let path = format!(
            "/api/v5/market/history-candles?instId={}&bar={}&before={}&after={}&limit=300",
            inst_id,
            Self::venue_bar(bar),
            start.timestamp_millis() - 1,
            end.timestamp_millis() + 1,
        );
        let envelope: ApiResponse<Vec<String>> =
            self.request(reqwest::Method::GET, &path, None).await?;
        Self::check(&envelope)?;
        let mut bars = Self::parse_candles(envelope.data);
        bars.retain(|b| b.timestamp >= start && b.timestamp <= end);
        Ok(bars)
    }

    async fn place_order(&self, req: OrderRequest) -> Result<OrderAck> {
        let mut body = json!({
            "instId": req.inst_id,
            "tdMode": req.td_mode,
            "side": req.side.as_str(),
            "ordType": req.ord_type.as_str(),
            "sz": req.sz.to_string(),
            "clOrdId": req.cl_ord_id,
        });
        if let Some(px) = req.px {
            body["px"] = json!(px.to_string());
        }
        if let Some(attach) = &req.attach_algo {
            body["attachAlgoOrds"] = json!([{
                "tpTriggerPx": attach.tp_trigger_px.to_string(),
                "tpOrdPx": attach.tp_ord_px.to_string(),
                "slTriggerPx": attach.sl_trigger_px.to_string(),
                "slOrdPx": attach.sl_ord_px.to_string(),
            }]);
        }
        let envelope: ApiResponse<serde_json::Value> = self
            .request(reqwest::Method::POST, "/api/v5/trade/order", Some(body))
            .await?;
        Self::check(&envelope)?;
        let data = envelope
            .data
            .first()
            .ok_or_else(|| EngineError::ExchangeTransient("empty order response".into()))?;
        // Per-order status code inside the envelope
        if data.get("sCode").and_then(|v| v.as_str()).unwrap_or(CODE_OK) != CODE_OK {
            let msg = data.get("sMsg").and_then(|v| v.as_str()).unwrap_or("rejected");
            return Err(EngineError::ExchangeTransient(format!("order rejected: {}", msg)));
        }
        Ok(OrderAck {
            ord_id: data
                .get("ordId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            cl_ord_id: req.cl_ord_id,
        })
    }

    async fn place_algo_order(&self, req: AlgoOrderRequest) -> Result<AlgoOrderAck> {
        let mut body = json!({
            "instId": req.inst_id,
            "tdMode": req.td_mode,
            "side": req.side.as_str(),
            "ordType": req.ord_type,
            "sz": req.sz.to_string(),
            "algoClOrdId": req.cl_ord_id,
        });
        for (key, value) in [
            ("tpTriggerPx", req.tp_trigger_px),
            ("tpOrdPx", req.tp_ord_px),
            ("slTriggerPx", req.sl_trigger_px),
            ("slOrdPx", req.sl_ord_px),
        ] {
            if let Some(px) = value {
                body[key] = json!(px.to_string());
            }
        }
        let envelope: ApiResponse<serde_json::Value> = self
            .request(reqwest::Method::POST, "/api/v5/trade/order-algo", Some(body))
            .await?;
        Self::check(&envelope)?;
        let data = envelope
            .data
            .first()
            .ok_or_else(|| EngineError::ExchangeTransient("empty algo order response".into()))?;
        Ok(AlgoOrderAck {
            algo_id: data
                .get("algoId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            cl_ord_id: req.cl_ord_id,
        })
    }

    async fn amend_order(
        &self,
        inst_id: &str,
        ord_id: &str,
        new_sz: Option<f64>,
        new_px: Option<f64>,
    ) -> Result<OrderAck> {
        let mut body = json!({ "instId": inst_id, "ordId": ord_id });
        if let Some(sz) = new_sz {
            body["newSz"] = json!(sz.to_string());
        }
        if let Some(px) = new_px {
            body["newPx"] = json!(px.to_string());
        }
        let envelope: ApiResponse<serde_json::Value> = self
            .request(reqwest::Method::POST, "/api/v5/trade/amend-order", Some(body))
            .await?;
        Self::check(&envelope)?;
        Ok(OrderAck {
            ord_id: ord_id.to_string(),
            cl_ord_id: String::new(),
        })
    }

    async fn amend_algo_order(
        &self,
        inst_id: &str,
        algo_id: &str,
        new_sl_trigger_px: Option<f64>,
        new_tp_trigger_px: Option<f64>,
    ) -> Result<AlgoOrderAck> {
        let mut body = json!({ "instId": inst_id, "algoId": algo_id });
        if let Some(px) = new_sl_trigger_px {
            body["newSlTriggerPx"] = json!(px.to_string());
        }
        if let Some(px) = new_tp_trigger_px {
            body["newTpTriggerPx"] = json!(px.to_string());
        }
        let envelope: ApiResponse<serde_json::Value> = self
            .request(
                reqwest::Method::POST,
                "/api/v5/trade/amend-algos",
                Some(body),
            )
            .await?;
        Self::check(&envelope)?;
        Ok(AlgoOrderAck {
            algo_id: algo_id.to_string(),
            cl_ord_id: String::new(),
        })
    }

    async fn get_order(&self, inst_id: &str, ord_id: &str) -> Result<OrderStatus> {
        let path = format!("/api/v5/trade/order?instId={}&ordId={}", inst_id, ord_id);
        let envelope: ApiResponse<serde_json::Value> =
            self.request(reqwest::Method::GET, &path, None).await?;
        if envelope.code == CODE_ORDER_NOT_FOUND {
            // Already terminal on the venue
            return Ok(OrderStatus {
                ord_id: ord_id.to_string(),
                inst_id: inst_id.to_string(),
                state: OrderState::Canceled,
                sz: 0.0,
                exec_price: None,
            });
        }
        Self::check(&envelope)?;
        let data = envelope
            .data
            .first()
            .ok_or_else(|| EngineError::ExchangeTransient("empty order status".into()))?;
        Ok(OrderStatus {
            ord_id: ord_id.to_string(),
            inst_id: inst_id.to_string(),
            state: OrderState::parse(data.get("state").and_then(|v| v.as_str()).unwrap_or("")),
            sz: json_f64(data, "sz").unwrap_or(0.0),
            exec_price: json_f64(data, "avgPx"),
        })
    }

    async fn get_algo_order(&self, algo_id: &str) -> Result<AlgoOrderStatus> {
        let path = format!("/api/v5/trade/order-algo?algoId={}", algo_id);
        let envelope: ApiResponse<serde_json::Value> =
            self.request(reqwest::Method::GET, &path, None).await?;
        if envelope.code == CODE_ORDER_NOT_FOUND {
            return Ok(AlgoOrderStatus {
                algo_id: algo_id.to_string(),
                inst_id: String::new(),
                state: OrderState::Canceled,
                sz: 0.0,
                sl_trigger_px: None,
                tp_trigger_px: None,
                exec_price: None,
            });
        }
        Self::check(&envelope)?;
        let data = envelope
            .data
            .first()
            .ok_or_else(|| EngineError::ExchangeTransient("empty algo order status".into()))?;
        Ok(AlgoOrderStatus {
            algo_id: algo_id.to_string(),
            inst_id: data
                .get("instId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            state: OrderState::parse(data.get("state").and_then(|v| v.as_str()).unwrap_or("")),
            sz: json_f64(data, "sz").unwrap_or(0.0),
            sl_trigger_px: json_f64(data, "slTriggerPx"),
            tp_trigger_px: json_f64(data, "tpTriggerPx"),
            exec_price: json_f64(data, "actualPx"),
        })
    }

    async fn cancel_order(&self, inst_id: &str, ord_id: &str) -> Result<()> {
        let body = json!({ "instId": inst_id, "ordId": ord_id });
        let envelope: ApiResponse<serde_json::Value> = self
            .request(reqwest::Method::POST, "/api/v5/trade/cancel-order", Some(body))
            .await?;
        if envelope.code == CODE_ORDER_NOT_FOUND {
            warn!("cancel_order: {} already terminal", ord_id);
            return Ok(());
        }
        Self::check(&envelope)
    }

    async fn cancel_algo_order(&self, inst_id: &str, algo_id: &str) -> Result<()> {
        let body = json!([{ "instId": inst_id, "algoId": algo_id }]);
        let envelope: ApiResponse<serde_json::Value> = self
            .request(
                reqwest::Method::POST,
                "/api/v5/trade/cancel-algos",
                Some(body),
            )
            .await?;
        if envelope.code == CODE_ORDER_NOT_FOUND {
            warn!("cancel_algo_order: {} already terminal", algo_id);
            return Ok(());
        }
        Self::check(&envelope)
    }
}

/// Venue numbers arrive as strings; empty string means absent.
fn json_f64(value: &serde_json::Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_bar_casing() {
        assert_eq!(OkxRest::venue_bar("5m"), "5m");
        assert_eq!(OkxRest::venue_bar("4h"), "4H");
        assert_eq!(OkxRest::venue_bar("1d"), "1D");
        assert_eq!(OkxRest::venue_bar("1w"), "1W");
    }

    #[test]
    fn parse_candles_orders_oldest_first() {
        let rows = vec![
            vec![
                "1704153600000".to_string(),
                "105".to_string(),
                "112".to_string(),
                "101".to_string(),
                "108".to_string(),
                "900".to_string(),
            ],
            vec![
                "1704067200000".to_string(),
                "100".to_string(),
                "110".to_string(),
                "95".to_string(),
                "105".to_string(),
                "1000".to_string(),
            ],
        ];
        let bars = OkxRest::parse_candles(rows);
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, 105.0);
    }

    #[test]
    fn parse_candles_skips_malformed_rows() {
        let rows = vec![
            vec!["not-a-ts".to_string(), "1".to_string()],
            vec![
                "1704067200000".to_string(),
                "100".to_string(),
                "110".to_string(),
                "95".to_string(),
                "105".to_string(),
                "1000".to_string(),
            ],
        ];
        assert_eq!(OkxRest::parse_candles(rows).len(), 1);
    }
}
