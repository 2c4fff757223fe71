use chrono::{DateTime, Utc};
use lps_common::Fils;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Upper bound on the size of a raw gateway payload that gets persisted for audit purposes.
/// Anything larger is truncated; the interesting fields (`id`, `status` and the nested object
/// ids) always appear near the front of the gateway's payloads.
pub const MAX_RAW_SNAPSHOT_BYTES: usize = 16 * 1024;

//--------------------------------------    Requests     ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Fils,
    pub currency: String,
    pub customer_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Fils,
    pub line_total: Fils,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub amount: Fils,
    pub currency: String,
    pub customer: CustomerInfo,
    /// The merchant-side order id, echoed back by the gateway in webhook payloads.
    pub order_ref: String,
    pub items: Vec<InvoiceLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------    Responses    ---------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteCharge {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<Fils>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub authorize_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// The verbatim payload this object was decoded from. `Null` when synthesised from an
    /// unrecognized response shape.
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteInvoice {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<Fils>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub order_ref: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteRefund {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<Fils>,
    #[serde(default)]
    pub charge_id: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

/// A gateway response, classified into one of the known shapes.
///
/// The gateway guarantees `id` and `status` on every object it returns, and nothing else. Any
/// payload that does not carry a recognized `object` discriminator, or that fails to decode as
/// its declared shape, degrades to [`RemoteResponse::Unrecognized`], which deliberately exposes
/// only those two fields. Control flow must never reach deeper into an unrecognized payload.
#[derive(Debug, Clone)]
pub enum RemoteResponse {
    Charge(RemoteCharge),
    Invoice(RemoteInvoice),
    Refund(RemoteRefund),
    Unrecognized { id: Option<String>, status: Option<String> },
}

impl RemoteResponse {
    pub fn classify(value: &Value) -> Self {
        let unrecognized = || RemoteResponse::Unrecognized {
            id: value["id"].as_str().map(String::from),
            status: value["status"].as_str().map(String::from),
        };
        match value["object"].as_str() {
            Some("charge") => match serde_json::from_value::<RemoteCharge>(value.clone()) {
                Ok(mut c) => {
                    c.raw = value.clone();
                    RemoteResponse::Charge(c)
                },
                Err(_) => unrecognized(),
            },
            Some("invoice") => match serde_json::from_value::<RemoteInvoice>(value.clone()) {
                Ok(mut i) => {
                    i.raw = value.clone();
                    RemoteResponse::Invoice(i)
                },
                Err(_) => unrecognized(),
            },
            Some("refund") => match serde_json::from_value::<RemoteRefund>(value.clone()) {
                Ok(mut r) => {
                    r.raw = value.clone();
                    RemoteResponse::Refund(r)
                },
                Err(_) => unrecognized(),
            },
            _ => unrecognized(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            RemoteResponse::Charge(c) => Some(c.id.as_str()),
            RemoteResponse::Invoice(i) => Some(i.id.as_str()),
            RemoteResponse::Refund(r) => Some(r.id.as_str()),
            RemoteResponse::Unrecognized { id, .. } => id.as_deref(),
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            RemoteResponse::Charge(c) => Some(c.status.as_str()),
            RemoteResponse::Invoice(i) => Some(i.status.as_str()),
            RemoteResponse::Refund(r) => Some(r.status.as_str()),
            RemoteResponse::Unrecognized { status, .. } => status.as_deref(),
        }
    }
}

/// Serializes a payload for persistence, truncating it to [`MAX_RAW_SNAPSHOT_BYTES`].
pub fn cap_snapshot(value: &Value) -> String {
    let mut s = value.to_string();
    if s.len() > MAX_RAW_SNAPSHOT_BYTES {
        let mut cut = MAX_RAW_SNAPSHOT_BYTES;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

impl RemoteCharge {
    /// Size-capped snapshot of the raw payload, suitable for storing on a payment record.
    pub fn snapshot(&self) -> String {
        if self.raw.is_null() {
            json!({ "id": self.id, "status": self.status }).to_string()
        } else {
            cap_snapshot(&self.raw)
        }
    }
}

impl RemoteInvoice {
    pub fn snapshot(&self) -> String {
        if self.raw.is_null() {
            json!({ "id": self.id, "status": self.status }).to_string()
        } else {
            cap_snapshot(&self.raw)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_known_shapes() {
        let v = json!({ "object": "charge", "id": "chg_1", "status": "CAPTURED", "amount": 7000 });
        match RemoteResponse::classify(&v) {
            RemoteResponse::Charge(c) => {
                assert_eq!(c.id, "chg_1");
                assert_eq!(c.status, "CAPTURED");
                assert_eq!(c.amount, Some(Fils::from(7000)));
            },
            other => panic!("expected charge, got {other:?}"),
        }
        let v = json!({ "object": "invoice", "id": "inv_9", "status": "SENT" });
        assert!(matches!(RemoteResponse::classify(&v), RemoteResponse::Invoice(_)));
    }

    #[test]
    fn unknown_shapes_expose_only_id_and_status() {
        let v = json!({ "object": "subscription", "id": "sub_3", "status": "ACTIVE", "plan": { "id": "x" } });
        match RemoteResponse::classify(&v) {
            RemoteResponse::Unrecognized { id, status } => {
                assert_eq!(id.as_deref(), Some("sub_3"));
                assert_eq!(status.as_deref(), Some("ACTIVE"));
            },
            other => panic!("expected unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn snapshots_are_capped() {
        let big = "x".repeat(2 * MAX_RAW_SNAPSHOT_BYTES);
        let v = json!({ "id": "inv_1", "status": "PENDING", "blob": big });
        let s = cap_snapshot(&v);
        assert!(s.len() <= MAX_RAW_SNAPSHOT_BYTES);
    }
}
