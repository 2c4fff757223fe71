//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into
//! a separate function. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage backend and the gateway client; the concrete types are
//! fixed at registration time in [`crate::server`]. Since each worker thread processes its
//! requests sequentially, nothing in here may block: every I/O step is awaited.
use actix_web::{get, web, HttpResponse, Responder};
use gateway_tools::{GatewayClient, NotifyChannel};
use laundry_payment_engine::{
    db_types::OrderId,
    traits::{PaymentLedgerDatabase, RecordQueryFilter},
    InvoiceFlowApi,
    PaymentFlowApi,
    ReconcileApi,
    RefundDestination,
    WalletApi,
    WebhookEvent,
};
use log::*;
use serde_json::json;

use crate::{
    config::SweepConfig,
    data_objects::{JsonResponse, RefundParams, ResendParams, SyncParams, TopUpParams, WalletTransactionParams},
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Webhook  ----------------------------------------------------
/// The gateway push channel. Authenticity is established by the HMAC middleware before this
/// handler runs. Responses are always 200 once authenticated, so the gateway does not endlessly
/// retry notifications that can never succeed; transient backend errors get a failure body and
/// the record is picked up by the next sweep anyway.
pub async fn gateway_webhook<B, G>(
    body: web::Json<WebhookEvent>,
    api: web::Data<ReconcileApi<B, G>>,
) -> HttpResponse
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    let event = body.into_inner();
    trace!("💻️ Received gateway webhook: {} -> {}", event.correlation_id.as_deref().unwrap_or("?"), event.status);
    match api.process_webhook(event).await {
        Ok(result) => HttpResponse::Ok().json(json!({ "success": true, "result": result })),
        Err(e) => {
            warn!("💻️ Webhook could not be applied: {e}");
            HttpResponse::Ok().json(JsonResponse::failure(e))
        },
    }
}

//----------------------------------------------  Reconciliation  ----------------------------------------------
/// The parameterless batch-sweep trigger exposed to the scheduler.
pub async fn trigger_sweep<B, G>(
    api: web::Data<ReconcileApi<B, G>>,
    sweep: web::Data<SweepConfig>,
) -> HttpResponse
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    debug!("💻️ Manual sweep trigger received");
    let summary = api.sweep(sweep.window).await;
    HttpResponse::Ok().json(summary)
}

/// The targeted-sync trigger: explicit record ids, or a filter over records.
pub async fn targeted_sync<B, G>(
    body: web::Json<SyncParams>,
    api: web::Data<ReconcileApi<B, G>>,
) -> HttpResponse
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    let params = body.into_inner();
    let report = if let Some(id) = params.record_id {
        api.sync_by_ids(&[id]).await
    } else if let Some(ids) = params.record_ids.as_deref() {
        api.sync_by_ids(ids).await
    } else {
        let mut filter = RecordQueryFilter::default();
        filter.method = params.method;
        filter.status = params.status;
        filter.limit = params.limit;
        filter.offset = params.offset;
        api.sync_by_filter(filter).await
    };
    HttpResponse::Ok().json(report)
}

//----------------------------------------------  Invoices  ----------------------------------------------------
pub async fn ensure_invoice<B, G>(
    path: web::Path<String>,
    api: web::Data<InvoiceFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    let order_id = OrderId(path.into_inner());
    debug!("💻️ Invoice requested for order {order_id}");
    let result = api.ensure_invoice(&order_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn resend_invoice<B, G>(
    path: web::Path<String>,
    body: web::Json<ResendParams>,
    api: web::Data<InvoiceFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    let order_id = OrderId(path.into_inner());
    let channels = parse_channels(&body.into_inner().channels)?;
    let invoice_id = api.resend_invoice(&order_id, &channels).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Invoice {invoice_id} resent"))))
}

fn parse_channels(names: &[String]) -> Result<Vec<NotifyChannel>, ServerError> {
    if names.is_empty() {
        return Ok(vec![NotifyChannel::Email]);
    }
    names
        .iter()
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "sms" => Ok(NotifyChannel::Sms),
            "email" => Ok(NotifyChannel::Email),
            other => Err(ServerError::InvalidRequestBody(format!("Unknown notification channel: {other}"))),
        })
        .collect()
}

//----------------------------------------------  Wallets  ----------------------------------------------------
pub async fn get_wallet<B>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
{
    let customer_id = path.into_inner();
    let wallet = api
        .wallet(&customer_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No wallet for customer {customer_id}")))?;
    Ok(HttpResponse::Ok().json(wallet))
}

pub async fn wallet_history<B>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
{
    let customer_id = path.into_inner();
    let history = api.history(&customer_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

/// Operator ledger entry: top-up credit, correction, manual refund credit. The full ledger rules
/// apply: wallet must be active, balances may not go negative, and the write is atomic.
pub async fn apply_wallet_transaction<B>(
    path: web::Path<String>,
    body: web::Json<WalletTransactionParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
{
    let customer_id = path.into_inner();
    let params = body.into_inner();
    info!("💻️ Operator ledger entry for {customer_id}: {} of {}", params.tx_type, params.amount);
    let transaction = api
        .apply_transaction(
            &customer_id,
            params.tx_type,
            params.amount,
            params.description,
            params.reference,
            None,
        )
        .await?;
    Ok(HttpResponse::Ok().json(transaction))
}

pub async fn verify_wallet<B>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
{
    let customer_id = path.into_inner();
    let report = api.verify_integrity(&customer_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------  Payments  ----------------------------------------------------
pub async fn initiate_top_up<B, G>(
    body: web::Json<TopUpParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    let params = body.into_inner();
    let result = api.initiate_top_up(&params.customer_id, params.amount).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn issue_refund<B, G>(
    body: web::Json<RefundParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedgerDatabase,
    G: GatewayClient,
{
    let params = body.into_inner();
    let destination = match params.destination.as_deref() {
        None | Some("gateway") => RefundDestination::Gateway,
        Some("wallet") => RefundDestination::Wallet,
        Some(other) => {
            return Err(ServerError::InvalidRequestBody(format!("Unknown refund destination: {other}")))
        },
    };
    let result = api.issue_refund(params.record_id, params.amount, &params.reason, destination).await?;
    Ok(HttpResponse::Ok().json(result))
}
