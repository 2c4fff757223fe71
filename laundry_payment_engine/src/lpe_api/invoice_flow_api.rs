use std::fmt::Debug;

use gateway_tools::{CustomerInfo, GatewayClient, InvoiceLine, InvoiceRequest, NotifyChannel, RemoteInvoice};
use log::*;
use serde::Serialize;
use serde_json::json;

use crate::{
    db_types::{
        Fils,
        NewPaymentRecord,
        NewWalletTransaction,
        Order,
        OrderId,
        PaymentMethod,
        PaymentRecord,
        PaymentStatus,
        WalletTxType,
    },
    events::{EventProducers, OrderPaidEvent},
    helpers::{invoice_still_open, map_invoice_status, recover_correlation_id},
    lpe_api::errors::PaymentFlowError,
    traits::{PaymentLedgerDatabase, PaymentLedgerError},
};

#[derive(Debug, Clone, Serialize)]
pub struct EnsureInvoiceResult {
    pub requires_payment: bool,
    pub wallet_balance: Fils,
    pub invoice_total: Fils,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_to_charge: Option<Fils>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
}

impl EnsureInvoiceResult {
    fn settled(wallet_balance: Fils, invoice_total: Fils) -> Self {
        Self {
            requires_payment: false,
            wallet_balance,
            invoice_total,
            amount_to_charge: None,
            invoice_id: None,
            invoice_url: None,
            record_id: None,
        }
    }
}

/// `InvoiceFlowApi` decides whether an order needs gateway payment, deduplicates in-flight
/// invoices and creates new ones when needed.
pub struct InvoiceFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for InvoiceFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceFlowApi")
    }
}

impl<B, G> InvoiceFlowApi<B, G>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    /// Ensures the order has exactly one live invoice if (and only if) the customer's wallet
    /// cannot cover the invoice total.
    ///
    /// Without the deduplication step every retried page load or cron tick would spawn another
    /// live invoice, double-notifying the customer and stacking up outstanding obligations for a
    /// single order, so an existing open invoice is always returned unchanged.
    pub async fn ensure_invoice(&self, order_id: &OrderId) -> Result<EnsureInvoiceResult, PaymentFlowError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| PaymentLedgerError::OrderNotFound(order_id.clone()))?;
        // An invoice cannot legally be created without the customer identity and the order lines,
        // so these failures are final, not retryable.
        let customer_name = non_empty(order.customer_name.as_deref()).ok_or_else(|| {
            PaymentFlowError::Validation(format!("Order {order_id} has no customer name on file"))
        })?;
        let customer_email = non_empty(order.customer_email.as_deref()).ok_or_else(|| {
            PaymentFlowError::Validation(format!("Order {order_id} has no customer email on file"))
        })?;
        let items = self.db.fetch_order_items(order_id).await?;
        if items.is_empty() {
            return Err(PaymentFlowError::Validation(format!("Order {order_id} has no line items")));
        }
        let invoice_total = if order.invoice_total.is_positive() {
            order.invoice_total
        } else {
            debug!("🧾️ Order {order_id} has no stored total. Deriving it from {} line items.", items.len());
            items.iter().map(|i| i.line_total).sum()
        };
        if !invoice_total.is_positive() {
            return Err(PaymentFlowError::Validation(format!(
                "Order {order_id} has a non-positive invoice total ({invoice_total})"
            )));
        }
        let wallet_balance =
            self.db.fetch_wallet(&order.customer_id).await?.map(|w| w.balance).unwrap_or_default();
        if wallet_balance >= invoice_total {
            debug!("🧾️ Order {order_id} is covered by the wallet balance ({wallet_balance}). No invoice needed.");
            return Ok(EnsureInvoiceResult::settled(wallet_balance, invoice_total));
        }
        let amount_to_charge = invoice_total - wallet_balance;

        // Deduplication ladder over the most recent gateway invoice for this order.
        if let Some(existing) = self.db.latest_record_for_order(order_id, PaymentMethod::GatewayInvoice).await? {
            if existing.status.is_open() {
                match self.check_existing_invoice(&order, &existing).await? {
                    ExistingInvoice::StillOpen(invoice) => {
                        info!("🧾️ Order {order_id} already has live invoice {}. Returning it unchanged.", invoice.id);
                        return Ok(EnsureInvoiceResult {
                            requires_payment: true,
                            wallet_balance,
                            invoice_total,
                            amount_to_charge: Some(existing.amount),
                            invoice_id: Some(invoice.id),
                            invoice_url: invoice.url,
                            record_id: Some(existing.id),
                        });
                    },
                    ExistingInvoice::AlreadyPaid => {
                        info!("🧾️ Order {order_id}'s outstanding invoice settled remotely. No new invoice needed.");
                        return Ok(EnsureInvoiceResult::settled(wallet_balance, invoice_total));
                    },
                    ExistingInvoice::Retired => {
                        debug!("🧾️ Stale invoice for order {order_id} retired. Creating a replacement.");
                    },
                }
            }
        }

        // Create the replacement (or first) invoice.
        let request = InvoiceRequest {
            amount: amount_to_charge,
            currency: order.currency.clone(),
            customer: CustomerInfo {
                name: customer_name.to_string(),
                email: Some(customer_email.to_string()),
                phone: None,
            },
            order_ref: order_id.as_str().to_string(),
            items: items
                .iter()
                .map(|i| InvoiceLine {
                    description: i.description.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    line_total: i.line_total,
                })
                .collect(),
            expires_at: None,
        };
        let invoice = self.gateway.create_invoice(&request).await?;
        let metadata = json!({
            "wallet_balance": wallet_balance,
            "invoice_total": invoice_total,
            "amount_to_charge": amount_to_charge,
        });
        let record = self
            .db
            .insert_payment_record(
                NewPaymentRecord::new(order.customer_id.clone(), amount_to_charge, PaymentMethod::GatewayInvoice)
                    .for_order(order_id.clone())
                    .with_invoice_id(invoice.id.clone())
                    .with_raw_response(invoice.snapshot())
                    .with_metadata(metadata.to_string()),
            )
            .await?;
        self.reserve_wallet_contribution(&order, wallet_balance, &invoice.id).await?;
        self.db.set_order_payment_method(order_id, PaymentMethod::GatewayInvoice).await?;
        self.db.recompute_order_payment(order_id).await?;
        info!(
            "🧾️ Invoice {} ({amount_to_charge}) created for order {order_id} as payment record #{}",
            invoice.id, record.id
        );
        Ok(EnsureInvoiceResult {
            requires_payment: true,
            wallet_balance,
            invoice_total,
            amount_to_charge: Some(amount_to_charge),
            invoice_id: Some(invoice.id),
            invoice_url: invoice.url,
            record_id: Some(record.id),
        })
    }

    /// Records the wallet's share of a split payment as its own Pending payment attempt. The
    /// reservation only records intent; the reserved funds move when the gateway invoice settles
    /// and the reconciler collects the contribution. A reservation tied to a superseded invoice
    /// is retired first, so the order never carries two live wallet contributions.
    async fn reserve_wallet_contribution(
        &self,
        order: &Order,
        wallet_balance: Fils,
        invoice_id: &str,
    ) -> Result<(), PaymentFlowError> {
        let order_id = &order.order_id;
        if let Some(stale) = self
            .db
            .latest_record_for_order(order_id, PaymentMethod::Wallet)
            .await?
            .filter(|r| r.status.is_open() && !r.is_refund())
        {
            debug!("🧾️ Retiring wallet contribution record #{} for order {order_id}", stale.id);
            self.db
                .apply_remote_status(stale.id, PaymentStatus::Failed, None, Some("superseded by a new invoice"))
                .await?;
        }
        if !wallet_balance.is_positive() {
            return Ok(());
        }
        let wallet = self.db.fetch_or_create_wallet(&order.customer_id).await?;
        let reservation = self
            .db
            .reserve_wallet_transaction(
                NewWalletTransaction::new(wallet.id, WalletTxType::Payment, wallet_balance)
                    .with_description(format!("Wallet contribution to order {order_id}"))
                    .with_reference(order_id.as_str().to_string()),
            )
            .await?;
        self.db
            .insert_payment_record(
                NewPaymentRecord::new(order.customer_id.clone(), wallet_balance, PaymentMethod::Wallet)
                    .for_order(order_id.clone())
                    .with_wallet_transaction(reservation.id)
                    .with_metadata(json!({ "invoice_id": invoice_id }).to_string()),
            )
            .await?;
        debug!("🧾️ Reserved wallet contribution of {wallet_balance} for order {order_id}");
        Ok(())
    }

    /// Checks remote truth for an open local invoice record and settles the record accordingly.
    /// A remote-check network failure retires the invoice from consideration: the customer must
    /// not be blocked indefinitely on an invoice we cannot see.
    async fn check_existing_invoice(
        &self,
        order: &Order,
        existing: &PaymentRecord,
    ) -> Result<ExistingInvoice, PaymentFlowError> {
        let invoice_id = match existing.correlation_id() {
            Some(id) => id.to_string(),
            None => match recover_correlation_id(existing) {
                Some(id) => {
                    self.db.set_correlation_id(existing.id, &id).await?;
                    id
                },
                None => {
                    // An invoice we cannot reference remotely cannot be deduplicated or
                    // cancelled. Retire the record and issue a replacement.
                    warn!(
                        "🧾️ Invoice record #{} for order {} has no recoverable gateway id. Retiring it.",
                        existing.id, order.order_id
                    );
                    self.db
                        .apply_remote_status(
                            existing.id,
                            PaymentStatus::Failed,
                            None,
                            Some("gateway invoice id was never recorded"),
                        )
                        .await?;
                    self.db.recompute_order_payment(&order.order_id).await?;
                    return Ok(ExistingInvoice::Retired);
                },
            },
        };
        let remote = match self.gateway.get_invoice(&invoice_id).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(
                    "🧾️ Could not check invoice {invoice_id} for order {}: {e}. Assuming it is unusable and \
                     creating a replacement.",
                    order.order_id
                );
                return Ok(ExistingInvoice::Retired);
            },
        };
        if invoice_still_open(&remote.status) {
            return Ok(ExistingInvoice::StillOpen(remote));
        }
        let mapped = map_invoice_status(&remote.status);
        if mapped == PaymentStatus::Paid {
            let outcome = self
                .db
                .apply_remote_status(existing.id, PaymentStatus::Paid, Some(&remote.snapshot()), None)
                .await?;
            self.db.collect_wallet_contributions(&order.order_id).await?;
            let update = self.db.recompute_order_payment(&order.order_id).await?;
            if update.newly_paid() {
                self.call_order_paid_hook(&update.order).await;
            }
            debug!(
                "🧾️ Invoice {invoice_id} was already paid remotely (record #{} updated: {})",
                existing.id, outcome.changed
            );
            return Ok(ExistingInvoice::AlreadyPaid);
        }
        // Failed, expired or cancelled remotely. Best-effort cancel so the customer cannot pay a
        // dead invoice out from under us, then retire the record.
        if let Err(e) = self.gateway.cancel_invoice(&invoice_id).await {
            debug!("🧾️ Best-effort cancel of stale invoice {invoice_id} failed: {e}");
        }
        self.db
            .apply_remote_status(existing.id, PaymentStatus::Failed, Some(&remote.snapshot()), Some(&remote.status))
            .await?;
        self.db.recompute_order_payment(&order.order_id).await?;
        Ok(ExistingInvoice::Retired)
    }

    /// Re-delivers the order's live invoice to the customer over the given channels.
    pub async fn resend_invoice(
        &self,
        order_id: &OrderId,
        channels: &[NotifyChannel],
    ) -> Result<String, PaymentFlowError> {
        let record = self
            .db
            .latest_record_for_order(order_id, PaymentMethod::GatewayInvoice)
            .await?
            .filter(|r| r.status.is_open())
            .ok_or_else(|| {
                PaymentFlowError::Validation(format!("Order {order_id} has no open invoice to resend"))
            })?;
        let invoice_id = record
            .correlation_id()
            .map(String::from)
            .or_else(|| recover_correlation_id(&record))
            .ok_or_else(|| {
                PaymentFlowError::Validation(format!("Invoice record #{} has no gateway id", record.id))
            })?;
        self.gateway.resend_invoice(&invoice_id, channels).await?;
        Ok(invoice_id)
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for producer in &self.producers.order_paid_producer {
            debug!("🧾️ Notifying order paid hook subscribers for {}", order.order_id);
            producer.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

enum ExistingInvoice {
    StillOpen(RemoteInvoice),
    AlreadyPaid,
    Retired,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
