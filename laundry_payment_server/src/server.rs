use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use gateway_tools::PaymentGatewayApi;
use laundry_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers, OrderPaidEvent},
    InvoiceFlowApi,
    PaymentFlowApi,
    ReconcileApi,
    SqliteDatabase,
    WalletApi,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::HmacMiddlewareFactory,
    routes::{
        apply_wallet_transaction,
        ensure_invoice,
        gateway_webhook,
        get_wallet,
        health,
        initiate_top_up,
        issue_refund,
        resend_invoice,
        targeted_sync,
        trigger_sweep,
        verify_wallet,
        wallet_history,
    },
    sweep_worker::start_sweep_worker,
};

/// The header carrying the webhook body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Gateway-Signature";
/// The header carrying the operator shared secret for /api routes.
pub const API_KEY_HEADER: &str = "lps-api-key";

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway =
        PaymentGatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let handlers = EventHandlers::new(16, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let _sweeper = start_sweep_worker(db.clone(), gateway.clone(), producers.clone(), config.sweep);
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The default event wiring: order-paid events are logged. Fulfilment systems subscribe here.
fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|event: OrderPaidEvent| {
        Box::pin(async move {
            info!("📦️ Order {} is fully paid ({})", event.order.order_id, event.order.invoice_total);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: PaymentGatewayApi,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let wallet_api = WalletApi::new(db.clone());
        let invoice_api = InvoiceFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let payment_api = PaymentFlowApi::new(db.clone(), gateway.clone());
        let reconcile_api = ReconcileApi::new(db.clone(), gateway.clone(), producers.clone())
            .with_poll_delay(config.sweep.poll_delay);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("lps::access_log"))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(invoice_api))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(reconcile_api))
            .app_data(web::Data::new(config.sweep));

        // The gateway's push channel. Authenticity first, parsing second.
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                WEBHOOK_SIGNATURE_HEADER,
                config.webhook.hmac_secret.clone(),
                config.webhook.hmac_checks,
            ))
            .route("/gateway", web::post().to(gateway_webhook::<SqliteDatabase, PaymentGatewayApi>));

        // Operator endpoints, guarded by the shared-secret header.
        let api_key = config.api_key.clone();
        let api_scope = web::scope("/api")
            .wrap_fn(move |req, srv| {
                let authorised = !api_key.reveal().is_empty()
                    && req
                        .headers()
                        .get(API_KEY_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(|v| v == api_key.reveal())
                        .unwrap_or(false);
                if authorised {
                    srv.call(req).boxed_local()
                } else {
                    warn!("💻️ Rejected /api call without a valid {API_KEY_HEADER} header");
                    ok(req.error_response(ServerError::InsufficientPermissions(
                        "Missing or invalid API key".to_string(),
                    )))
                    .boxed_local()
                }
            })
            .route("/reconcile/sweep", web::post().to(trigger_sweep::<SqliteDatabase, PaymentGatewayApi>))
            .route("/reconcile/sync", web::post().to(targeted_sync::<SqliteDatabase, PaymentGatewayApi>))
            .route("/orders/{order_id}/invoice", web::post().to(ensure_invoice::<SqliteDatabase, PaymentGatewayApi>))
            .route(
                "/orders/{order_id}/invoice/resend",
                web::post().to(resend_invoice::<SqliteDatabase, PaymentGatewayApi>),
            )
            .route("/wallets/{customer_id}", web::get().to(get_wallet::<SqliteDatabase>))
            .route("/wallets/{customer_id}/history", web::get().to(wallet_history::<SqliteDatabase>))
            .route(
                "/wallets/{customer_id}/transactions",
                web::post().to(apply_wallet_transaction::<SqliteDatabase>),
            )
            .route("/wallets/{customer_id}/verify", web::get().to(verify_wallet::<SqliteDatabase>))
            .route("/payments/top-up", web::post().to(initiate_top_up::<SqliteDatabase, PaymentGatewayApi>))
            .route("/payments/refund", web::post().to(issue_refund::<SqliteDatabase, PaymentGatewayApi>));

        app.service(health).service(webhook_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
