use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub business_rules: BusinessRules,
    pub payment: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// How long a claim holds its seats before the sweeper reclaims them.
    #[serde(default = "default_seat_hold_seconds")]
    pub seat_hold_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_seat_hold_seconds() -> u64 {
    3600
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub provider: String,
    /// Shared secret used in the notification signature hash.
    pub server_key: String,
    #[serde(default)]
    pub sandbox: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment file is optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables, e.g. RAILBOOK__PAYMENT__SERVER_KEY
            .add_source(config::Environment::with_prefix("RAILBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            seat_hold_seconds: default_seat_hold_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}
