use std::env;

use gateway_tools::GatewayConfig;
use log::*;
use lps_common::{parse_boolean_flag, Secret};

const DEFAULT_LPS_HOST: &str = "127.0.0.1";
const DEFAULT_LPS_PORT: u16 = 8480;
/// How often the background sweep runs.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
/// How far back the sweep looks for open gateway records. Bounds the scan.
const DEFAULT_SWEEP_WINDOW_HOURS: i64 = 48;
/// Pause between consecutive gateway reads in a batch, to stay clear of rate limits.
const DEFAULT_GATEWAY_RATE_DELAY_MS: u64 = 250;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the operator endpoints under /api, supplied in the `lps-api-key` header.
    pub api_key: Secret<String>,
    pub webhook: WebhookConfig,
    pub sweep: SweepConfig,
    pub gateway: GatewayConfig,
}

#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    /// Secret for the `X-Gateway-Signature` HMAC on incoming webhook calls.
    pub hmac_secret: Secret<String>,
    /// When false, webhook signatures are not checked. Development only.
    pub hmac_checks: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct SweepConfig {
    pub interval: std::time::Duration,
    pub window: chrono::Duration,
    pub poll_delay: std::time::Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            window: chrono::Duration::hours(DEFAULT_SWEEP_WINDOW_HOURS),
            poll_delay: std::time::Duration::from_millis(DEFAULT_GATEWAY_RATE_DELAY_MS),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LPS_HOST.to_string(),
            port: DEFAULT_LPS_PORT,
            database_url: String::default(),
            api_key: Secret::default(),
            webhook: WebhookConfig::default(),
            sweep: SweepConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("LPS_HOST").ok().unwrap_or_else(|| DEFAULT_LPS_HOST.into());
        let port = env::var("LPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for LPS_PORT. {e} Using the default, {DEFAULT_LPS_PORT}, instead."
                    );
                    DEFAULT_LPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_LPS_PORT);
        let database_url = env::var("LPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ LPS_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let api_key = Secret::new(env::var("LPS_API_KEY").unwrap_or_else(|_| {
            warn!(
                "🪛️ LPS_API_KEY is not set. The operator endpoints will not authorise any callers until it is \
                 configured."
            );
            String::default()
        }));
        let webhook = WebhookConfig::from_env_or_default();
        let sweep = SweepConfig::from_env_or_default();
        let gateway = GatewayConfig::new_from_env_or_default();
        Self { host, port, database_url, api_key, webhook, sweep, gateway }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = Secret::new(env::var("LPS_WEBHOOK_HMAC_SECRET").unwrap_or_else(|_| {
            error!(
                "🪛️ LPS_WEBHOOK_HMAC_SECRET is not set. Please set it to the signing key configured on the gateway's \
                 webhook."
            );
            String::default()
        }));
        let hmac_checks = parse_boolean_flag(env::var("LPS_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Anyone can forge payment notifications. Never run like this \
                   in production.");
        }
        Self { hmac_secret, hmac_checks }
    }
}

impl SweepConfig {
    pub fn from_env_or_default() -> Self {
        let interval = env::var("LPS_SWEEP_INTERVAL_SECS")
            .map_err(|_| {
                info!(
                    "🪛️ LPS_SWEEP_INTERVAL_SECS is not set. Using the default of {DEFAULT_SWEEP_INTERVAL_SECS} \
                     seconds."
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for LPS_SWEEP_INTERVAL_SECS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        let window = env::var("LPS_SWEEP_WINDOW_HOURS")
            .map_err(|_| {
                info!("🪛️ LPS_SWEEP_WINDOW_HOURS is not set. Using the default of {DEFAULT_SWEEP_WINDOW_HOURS} hours.")
            })
            .and_then(|s| {
                s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for LPS_SWEEP_WINDOW_HOURS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_SWEEP_WINDOW_HOURS);
        let poll_delay = env::var("LPS_GATEWAY_RATE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_GATEWAY_RATE_DELAY_MS);
        Self {
            interval: std::time::Duration::from_secs(interval),
            window: chrono::Duration::hours(window),
            poll_delay: std::time::Duration::from_millis(poll_delay),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8480);
        assert_eq!(config.sweep.window, chrono::Duration::hours(48));
    }
}
