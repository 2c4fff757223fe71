use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use lps_common::Fils;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     WalletTxType      -------------------------------------------------------
/// The kind of a ledger entry. The amount on an entry is always a non-negative magnitude; the
/// direction of the balance movement is implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletTxType {
    /// Money entering the wallet (top-up, transfer in).
    Deposit,
    /// Money leaving the wallet at the customer's request.
    Withdrawal,
    /// Wallet funds applied to an order.
    Payment,
    /// Money returned to the wallet after a refund.
    Refund,
    /// A manual correction. Sets the balance to the entry's amount directly.
    Adjustment,
    /// Money moved out to another wallet.
    Transfer,
}

impl WalletTxType {
    /// Whether entries of this type credit (+) or debit (-) the wallet. `Adjustment` has no fixed
    /// direction and is handled separately by the ledger engine.
    pub fn is_credit(&self) -> bool {
        matches!(self, WalletTxType::Deposit | WalletTxType::Refund)
    }
}

impl Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxType::Deposit => write!(f, "Deposit"),
            WalletTxType::Withdrawal => write!(f, "Withdrawal"),
            WalletTxType::Payment => write!(f, "Payment"),
            WalletTxType::Refund => write!(f, "Refund"),
            WalletTxType::Adjustment => write!(f, "Adjustment"),
            WalletTxType::Transfer => write!(f, "Transfer"),
        }
    }
}

impl FromStr for WalletTxType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Withdrawal" => Ok(Self::Withdrawal),
            "Payment" => Ok(Self::Payment),
            "Refund" => Ok(Self::Refund),
            "Adjustment" => Ok(Self::Adjustment),
            "Transfer" => Ok(Self::Transfer),
            s => Err(ConversionError(format!("Invalid wallet transaction type: {s}"))),
        }
    }
}

//--------------------------------------    WalletTxStatus     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletTxStatus {
    /// Intent has been recorded but no money has moved. The entry's delta is not reflected in
    /// the wallet balance.
    Pending,
    /// The entry's delta has been applied to the wallet balance. Final.
    Completed,
    /// The entry was abandoned without moving money. Final.
    Failed,
}

impl WalletTxStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, WalletTxStatus::Pending)
    }
}

impl Display for WalletTxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxStatus::Pending => write!(f, "Pending"),
            WalletTxStatus::Completed => write!(f, "Completed"),
            WalletTxStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for WalletTxStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid wallet transaction status: {s}"))),
        }
    }
}

//--------------------------------------        Wallet         -------------------------------------------------------
/// A customer's stored-value balance. The balance is never mutated outside a ledger-engine call;
/// it always equals the running sum of the wallet's COMPLETED transactions.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Wallet {
    pub id: i64,
    pub customer_id: String,
    pub balance: Fils,
    pub currency: String,
    pub is_active: bool,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   WalletTransaction   -------------------------------------------------------
/// An append-only ledger entry. For Pending entries, `balance_before` and `balance_after` both
/// hold the balance at reservation time; both are rewritten from the live balance when the entry
/// is finalized, so the adjacency invariant holds over Completed entries.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub wallet_id: i64,
    pub tx_type: WalletTxType,
    pub amount: Fils,
    pub balance_before: Fils,
    pub balance_after: Fils,
    pub status: WalletTxStatus,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub wallet_id: i64,
    pub tx_type: WalletTxType,
    /// Non-negative magnitude. For `Adjustment`, the target balance.
    pub amount: Fils,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// Structured linkage (gateway ids, payment record id) as a JSON document.
    pub metadata: Option<String>,
}

impl NewWalletTransaction {
    pub fn new(wallet_id: i64, tx_type: WalletTxType, amount: Fils) -> Self {
        Self { wallet_id, tx_type, amount, description: None, reference: None, metadata: None }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_metadata<S: Into<String>>(mut self, metadata: S) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    Wallet,
    Card,
    Cash,
    BankTransfer,
    GatewayCharge,
    GatewayInvoice,
}

impl PaymentMethod {
    /// Methods whose truth lives on the remote gateway and is subject to reconciliation.
    pub fn is_gateway_backed(&self) -> bool {
        matches!(self, PaymentMethod::GatewayCharge | PaymentMethod::GatewayInvoice)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Wallet => write!(f, "Wallet"),
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::BankTransfer => write!(f, "BankTransfer"),
            PaymentMethod::GatewayCharge => write!(f, "GatewayCharge"),
            PaymentMethod::GatewayInvoice => write!(f, "GatewayInvoice"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Wallet" => Ok(Self::Wallet),
            "Card" => Ok(Self::Card),
            "Cash" => Ok(Self::Cash),
            "BankTransfer" => Ok(Self::BankTransfer),
            "GatewayCharge" => Ok(Self::GatewayCharge),
            "GatewayInvoice" => Ok(Self::GatewayInvoice),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
/// Local status of a payment record. Transitions are monotonic: open states may settle, settled
/// states may only move along the refund path, and nothing ever reverts to an open state. A
/// failed record is superseded by creating a new record, never by resurrecting the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    InProgress,
    Paid,
    Failed,
    Refunded,
    PartialRefund,
}

impl PaymentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::InProgress)
    }

    pub fn can_transition_to(&self, new: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, new) {
            // The two open states are interchangeable and may settle either way
            (Pending | InProgress, Pending | InProgress | Paid | Failed) => true,
            // A settled payment can only move along the refund path
            (Paid, Refunded | PartialRefund) => true,
            (PartialRefund, Refunded | PartialRefund) => true,
            (_, _) => false,
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::InProgress => write!(f, "InProgress"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
            PaymentStatus::PartialRefund => write!(f, "PartialRefund"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "InProgress" => Ok(Self::InProgress),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            "PartialRefund" => Ok(Self::PartialRefund),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------  OrderPaymentStatus   -------------------------------------------------------
/// Derived order-level payment status. Never hand-set; always recomputed from the order's payment
/// records by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for OrderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderPaymentStatus::Pending => write!(f, "Pending"),
            OrderPaymentStatus::Paid => write!(f, "Paid"),
            OrderPaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl From<String> for OrderPaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderPaymentStatus::Pending
        })
    }
}

impl FromStr for OrderPaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order payment status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentRecord      -------------------------------------------------------
/// One attempt to move money between a customer and the business via a given method. Records are
/// never deleted; failed attempts are retained for audit and superseded by new records.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub customer_id: String,
    pub order_id: Option<OrderId>,
    pub amount: Fils,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub charge_id: Option<String>,
    pub authorize_id: Option<String>,
    pub gateway_tx_id: Option<String>,
    pub invoice_id: Option<String>,
    pub wallet_transaction_id: Option<i64>,
    /// Size-capped snapshot of the last gateway payload seen for this record.
    pub raw_response: Option<String>,
    pub failure_reason: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// The gateway id used to fetch remote truth for this record. Which correlation field applies
    /// depends on the method.
    pub fn correlation_id(&self) -> Option<&str> {
        match self.method {
            PaymentMethod::GatewayInvoice => self.invoice_id.as_deref(),
            PaymentMethod::GatewayCharge => self.charge_id.as_deref(),
            _ => None,
        }
    }

    pub fn metadata_json(&self) -> Option<serde_json::Value> {
        self.metadata.as_deref().and_then(|m| serde_json::from_str(m).ok())
    }

    /// A record is a refund iff its metadata marks it so.
    pub fn is_refund(&self) -> bool {
        self.metadata_json().map(|m| m["is_refund"] == serde_json::Value::Bool(true)).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub customer_id: String,
    pub order_id: Option<OrderId>,
    pub amount: Fils,
    pub currency: String,
    pub method: PaymentMethod,
    pub charge_id: Option<String>,
    pub authorize_id: Option<String>,
    pub gateway_tx_id: Option<String>,
    pub invoice_id: Option<String>,
    pub wallet_transaction_id: Option<i64>,
    pub raw_response: Option<String>,
    pub metadata: Option<String>,
}

impl NewPaymentRecord {
    pub fn new<S: Into<String>>(customer_id: S, amount: Fils, method: PaymentMethod) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_id: None,
            amount,
            currency: lps_common::KWD_CURRENCY_CODE.to_string(),
            method,
            charge_id: None,
            authorize_id: None,
            gateway_tx_id: None,
            invoice_id: None,
            wallet_transaction_id: None,
            raw_response: None,
            metadata: None,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_invoice_id<S: Into<String>>(mut self, invoice_id: S) -> Self {
        self.invoice_id = Some(invoice_id.into());
        self
    }

    pub fn with_charge_id<S: Into<String>>(mut self, charge_id: S) -> Self {
        self.charge_id = Some(charge_id.into());
        self
    }

    pub fn with_wallet_transaction(mut self, tx_id: i64) -> Self {
        self.wallet_transaction_id = Some(tx_id);
        self
    }

    pub fn with_raw_response<S: Into<String>>(mut self, raw: S) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    pub fn with_metadata<S: Into<String>>(mut self, metadata: S) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

//--------------------------------------        Order          -------------------------------------------------------
/// The payment-relevant slice of an order. Everything else about orders (items CRUD, processing
/// details, delivery) is managed elsewhere; this engine only ever touches the payment fields.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub payment_status: OrderPaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub invoice_total: Fils,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Fils,
    pub line_total: Fils,
}
