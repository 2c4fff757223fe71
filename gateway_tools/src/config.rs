use log::*;
use lps_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API, e.g. "https://api.gateway.example.com/v2"
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Secret used to verify webhook signatures. Not used by the client itself, but it belongs to
    /// the gateway configuration and is loaded alongside the other credentials.
    pub webhook_secret: Secret<String>,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("LPS_GATEWAY_BASE_URL").unwrap_or_else(|_| {
            warn!("LPS_GATEWAY_BASE_URL not set, using (probably useless) default");
            "https://api.gateway.example.com/v2".to_string()
        });
        let api_key = Secret::new(std::env::var("LPS_GATEWAY_API_KEY").unwrap_or_else(|_| {
            warn!("LPS_GATEWAY_API_KEY not set, using (probably useless) default");
            "sk_test_0000000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("LPS_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("LPS_GATEWAY_WEBHOOK_SECRET not set, using (probably useless) default");
            "whsec_0000000000000000".to_string()
        }));
        Self { base_url, api_key, webhook_secret }
    }
}
