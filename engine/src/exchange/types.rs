//! Wire types shared by the exchange implementations

use serde::{Deserialize, Serialize};

/// Venue response code for success
pub const CODE_OK: &str = "0";
/// Order does not exist; the order is treated as already terminal
pub const CODE_ORDER_NOT_FOUND: &str = "51603";
/// Request IP is not on the API key whitelist; fatal configuration error
pub const CODE_IP_NOT_WHITELISTED: &str = "50110";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrdType {
    Market,
    Limit,
}

impl OrdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrdType::Market => "market",
            OrdType::Limit => "limit",
        }
    }
}

/// Lifecycle state of a venue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Live,
    Filled,
    Canceled,
    Failed,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Live => "live",
            OrderState::Filled => "filled",
            OrderState::Canceled => "canceled",
            OrderState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderState::Live)
    }

    pub fn parse(raw: &str) -> OrderState {
        match raw {
            "live" | "partially_filled" | "effective" => OrderState::Live,
            "filled" => OrderState::Filled,
            "canceled" | "cancelled" => OrderState::Canceled,
            _ => OrderState::Failed,
        }
    }
}

/// Take-profit / stop-loss legs attached to an entry order (OCO)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedAlgo {
    pub tp_trigger_px: f64,
    pub tp_ord_px: f64,
    pub sl_trigger_px: f64,
    pub sl_ord_px: f64,
}

/// Immediate order request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: OrderSide,
    pub ord_type: OrdType,
    pub sz: f64,
    pub px: Option<f64>,
    pub cl_ord_id: String,
    pub attach_algo: Option<AttachedAlgo>,
}

/// Stop-triggered order placed ahead of time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoOrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: OrderSide,
    /// "oco" for paired take-profit + stop-loss, "conditional" for a single trigger
    pub ord_type: String,
    pub sz: f64,
    pub tp_trigger_px: Option<f64>,
    pub tp_ord_px: Option<f64>,
    pub sl_trigger_px: Option<f64>,
    pub sl_ord_px: Option<f64>,
    pub cl_ord_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub ord_id: String,
    pub cl_ord_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoOrderAck {
    pub algo_id: String,
    pub cl_ord_id: String,
}

/// Current view of an algorithmic order on the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoOrderStatus {
    pub algo_id: String,
    pub inst_id: String,
    pub state: OrderState,
    pub sz: f64,
    pub sl_trigger_px: Option<f64>,
    pub tp_trigger_px: Option<f64>,
    pub exec_price: Option<f64>,
}

/// Current view of an immediate order on the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub ord_id: String,
    pub inst_id: String,
    pub state: OrderState,
    pub sz: f64,
    pub exec_price: Option<f64>,
}

/// Envelope every venue endpoint responds with; `code == "0"` is success.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}
