use std::fmt::Debug;

use gateway_tools::{ChargeRequest, GatewayClient};
use log::*;
use serde::Serialize;
use serde_json::json;

use crate::{
    db_types::{
        Fils,
        NewPaymentRecord,
        PaymentMethod,
        PaymentStatus,
        WalletTxType,
    },
    helpers::map_charge_status,
    lpe_api::errors::PaymentFlowError,
    traits::{PaymentLedgerDatabase, PaymentLedgerError},
};

#[derive(Debug, Clone, Serialize)]
pub struct TopUpResult {
    pub record_id: i64,
    pub wallet_transaction_id: i64,
    pub charge_id: String,
    pub remote_status: String,
    pub status: PaymentStatus,
    pub amount: Fils,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundResult {
    pub refund_record_id: i64,
    pub original_record_id: i64,
    pub original_status: PaymentStatus,
    pub amount: Fils,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_transaction_id: Option<i64>,
}

/// Where refunded money goes: back through the gateway to the original instrument, or into the
/// customer's wallet as store credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundDestination {
    Gateway,
    Wallet,
}

/// `PaymentFlowApi` initiates money movement: wallet top-ups through gateway charges, and
/// refunds against settled records. Settlement of what it starts is the reconciler's job.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway }
    }

    /// Starts a wallet top-up: creates the gateway charge, reserves a Pending deposit on the
    /// ledger (intent, no balance movement), and records the attempt as a payment record linking
    /// the two. The deposit is finalized exactly once, when the gateway reports the charge
    /// settled, via webhook or reconciliation.
    pub async fn initiate_top_up(&self, customer_id: &str, amount: Fils) -> Result<TopUpResult, PaymentFlowError> {
        if !amount.is_positive() {
            return Err(PaymentFlowError::Validation(format!("Top-up amount must be positive (got {amount})")));
        }
        let wallet = self.db.fetch_or_create_wallet(customer_id).await?;
        let request = ChargeRequest {
            amount,
            currency: wallet.currency.clone(),
            customer_id: customer_id.to_string(),
            description: format!("Wallet top-up of {amount}"),
            reference: None,
        };
        let charge = self.gateway.create_charge(&request).await?;
        let reservation = self
            .db
            .reserve_wallet_transaction(
                crate::db_types::NewWalletTransaction::new(wallet.id, WalletTxType::Deposit, amount)
                    .with_description(format!("Wallet top-up via charge {}", charge.id))
                    .with_reference(charge.id.clone())
                    .with_metadata(json!({ "charge_id": charge.id }).to_string()),
            )
            .await?;
        let mut new_record = NewPaymentRecord::new(customer_id, amount, PaymentMethod::GatewayCharge)
            .with_charge_id(charge.id.clone())
            .with_wallet_transaction(reservation.id)
            .with_raw_response(charge.snapshot())
            .with_metadata(json!({ "top_up": true, "wallet_id": wallet.id }).to_string());
        new_record.authorize_id = charge.authorize_id.clone();
        new_record.gateway_tx_id = charge.transaction_id.clone();
        let record = self.db.insert_payment_record(new_record).await?;
        info!(
            "💳️ Top-up of {amount} for customer {customer_id} initiated: charge {} / record #{} / reservation #{}",
            charge.id, record.id, reservation.id
        );
        // Some charges settle synchronously (3DS-exempt cards, test mode). Apply remote truth
        // right away so the customer sees the credit without waiting for the sweep.
        let mapped = map_charge_status(&charge.status);
        let (status, record_id) = if mapped != record.status {
            let outcome = self.db.apply_remote_status(record.id, mapped, Some(&charge.snapshot()), None).await?;
            (outcome.record.status, outcome.record.id)
        } else {
            (record.status, record.id)
        };
        Ok(TopUpResult {
            record_id,
            wallet_transaction_id: reservation.id,
            charge_id: charge.id,
            remote_status: charge.status,
            status,
            amount,
        })
    }

    /// Issues a refund against a settled payment record. The original record moves to Refunded
    /// (full) or PartialRefund, a metadata-marked refund record is appended for the aggregator's
    /// refund partition, and the money goes back through the gateway or into the wallet.
    pub async fn issue_refund(
        &self,
        record_id: i64,
        amount: Option<Fils>,
        reason: &str,
        destination: RefundDestination,
    ) -> Result<RefundResult, PaymentFlowError> {
        let original = self
            .db
            .fetch_payment_record(record_id)
            .await?
            .ok_or(PaymentLedgerError::RecordNotFound(record_id))?;
        if !matches!(original.status, PaymentStatus::Paid | PaymentStatus::PartialRefund) {
            return Err(PaymentFlowError::Validation(format!(
                "Record #{record_id} is {} and cannot be refunded",
                original.status
            )));
        }
        // Previous partial refunds shrink what is still refundable; defaulting the amount refunds
        // the remainder.
        let prior_refunds: Fils = self
            .db
            .search_payment_records(
                crate::traits::RecordQueryFilter::default().with_customer_id(original.customer_id.clone()),
            )
            .await?
            .iter()
            .filter(|r| {
                r.is_refund()
                    && r.status == PaymentStatus::Paid
                    && r.metadata_json().map(|m| m["refunds_record"].as_i64() == Some(record_id)).unwrap_or(false)
            })
            .map(|r| r.amount)
            .sum();
        let remaining = original.amount - prior_refunds;
        let amount = amount.unwrap_or(remaining);
        if !amount.is_positive() || amount > remaining {
            return Err(PaymentFlowError::Validation(format!(
                "Refund amount {amount} is outside (0, {remaining}]"
            )));
        }

        let mut gateway_refund_id = None;
        let mut wallet_transaction_id = None;
        let refund_record = match destination {
            RefundDestination::Gateway => {
                let charge_id = original.charge_id.as_deref().ok_or_else(|| {
                    PaymentFlowError::Validation(format!(
                        "Record #{record_id} has no gateway charge to refund against"
                    ))
                })?;
                let refund = self.gateway.create_refund(charge_id, amount, reason).await?;
                gateway_refund_id = Some(refund.id.clone());
                let mut new_record =
                    NewPaymentRecord::new(original.customer_id.clone(), amount, original.method)
                        .with_metadata(
                            json!({ "is_refund": true, "refunds_record": record_id, "reason": reason }).to_string(),
                        )
                        .with_raw_response(json!({ "id": refund.id, "status": refund.status }).to_string());
                if let Some(order_id) = original.order_id.clone() {
                    new_record = new_record.for_order(order_id);
                }
                let record = self.db.insert_payment_record(new_record).await?;
                // Refunds usually settle synchronously; map what the gateway said.
                let mapped = map_charge_status(&refund.status);
                if mapped != record.status {
                    self.db.apply_remote_status(record.id, mapped, None, None).await?;
                }
                record
            },
            RefundDestination::Wallet => {
                let wallet = self.db.fetch_or_create_wallet(&original.customer_id).await?;
                let credit = self
                    .db
                    .apply_wallet_transaction(
                        crate::db_types::NewWalletTransaction::new(wallet.id, WalletTxType::Refund, amount)
                            .with_description(format!("Refund of payment record #{record_id}: {reason}"))
                            .with_reference(format!("refund:{record_id}")),
                    )
                    .await?;
                wallet_transaction_id = Some(credit.id);
                let mut new_record =
                    NewPaymentRecord::new(original.customer_id.clone(), amount, PaymentMethod::Wallet)
                        .with_wallet_transaction(credit.id)
                        .with_metadata(
                            json!({ "is_refund": true, "refunds_record": record_id, "reason": reason }).to_string(),
                        );
                if let Some(order_id) = original.order_id.clone() {
                    new_record = new_record.for_order(order_id);
                }
                let record = self.db.insert_payment_record(new_record).await?;
                // The wallet credit has already completed, so the refund record settles with it.
                self.db.apply_remote_status(record.id, PaymentStatus::Paid, None, None).await?;
                record
            },
        };

        let new_status = if prior_refunds + amount == original.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartialRefund
        };
        let outcome = self.db.apply_remote_status(record_id, new_status, None, None).await?;
        if let Some(order_id) = original.order_id.clone() {
            self.db.recompute_order_payment(&order_id).await?;
        }
        info!(
            "💳️ Refund of {amount} issued against record #{record_id} ({}). Refund record #{}",
            outcome.record.status, refund_record.id
        );
        Ok(RefundResult {
            refund_record_id: refund_record.id,
            original_record_id: record_id,
            original_status: outcome.record.status,
            amount,
            gateway_refund_id,
            wallet_transaction_id,
        })
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
