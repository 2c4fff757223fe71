use std::fmt::Display;

use laundry_payment_engine::db_types::{Fils, PaymentMethod, PaymentStatus, WalletTxType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of the targeted-sync trigger: either explicit record ids, or a filter over open records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub record_id: Option<i64>,
    #[serde(default)]
    pub record_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransactionParams {
    pub tx_type: WalletTxType,
    pub amount: Fils,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpParams {
    pub customer_id: String,
    pub amount: Fils,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundParams {
    pub record_id: i64,
    #[serde(default)]
    pub amount: Option<Fils>,
    pub reason: String,
    /// "gateway" (default) or "wallet".
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendParams {
    /// Channels to redeliver over: "sms" and/or "email". Defaults to email.
    #[serde(default)]
    pub channels: Vec<String>,
}
