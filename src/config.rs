use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Fallback order description when no template is configured.
/// `$orderId` is replaced with the host's display order id.
pub const DEFAULT_DESCRIPTION_TEMPLATE: &str = "Payment order #$orderId";

const DEFAULT_PAYMENT_URL: &str = "https://www.platron.ru/payment.php";
const DEFAULT_STATUS_URL: &str = "https://www.platron.ru/get_status.php";

/// Merchant account settings, owned and persisted by the host.
/// Loaded fresh per operation; never cached by the adapter.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MerchantSettings {
    /// Merchant identifier issued by the gateway
    #[validate(length(min = 1))]
    pub merchant_id: String,

    /// Shared secret used for request/callback signatures
    #[validate(length(min = 1))]
    pub secret_key: String,

    /// When set, initiation requests carry pg_testing_mode=1
    #[serde(default)]
    pub testing_mode: bool,

    /// Order description template; `$orderId` is substituted
    #[serde(default = "default_description_template")]
    pub description_template: String,

    /// Additional handling fee, flat amount or percentage
    #[serde(default)]
    pub additional_fee: Decimal,

    /// Interpret `additional_fee` as a percentage of the cart total
    #[serde(default)]
    pub additional_fee_percentage: bool,
}

impl MerchantSettings {
    /// The effective description template, falling back to the default when
    /// the configured one is empty.
    pub fn template(&self) -> &str {
        if self.description_template.is_empty() {
            DEFAULT_DESCRIPTION_TEMPLATE
        } else {
            &self.description_template
        }
    }
}

/// Gateway endpoint URLs. Overridable so tests can point at a local server.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayEndpoints {
    #[serde(default = "default_payment_url")]
    #[validate(url)]
    pub payment_url: String,

    #[serde(default = "default_status_url")]
    #[validate(url)]
    pub status_url: String,
}

impl Default for GatewayEndpoints {
    fn default() -> Self {
        Self {
            payment_url: default_payment_url(),
            status_url: default_status_url(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Public base URL of the host storefront; gateway return URLs
    /// (success/failure/result) are built from it
    #[validate(url)]
    pub site_url: String,

    /// Merchant account settings
    #[validate]
    pub merchant: MerchantSettings,

    /// Gateway endpoints
    #[serde(default)]
    #[validate]
    pub gateway: GatewayEndpoints,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Whether logs go out as JSON: explicitly requested via `log_json`, and
    /// the default everywhere except development.
    pub fn json_logs(&self) -> bool {
        self.log_json || !self.is_development()
    }

    /// Site URL without a trailing slash, ready for path joining.
    pub fn site_base(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_description_template() -> String {
    DEFAULT_DESCRIPTION_TEMPLATE.to_string()
}

fn default_payment_url() -> String {
    DEFAULT_PAYMENT_URL.to_string()
}

fn default_status_url() -> String {
    DEFAULT_STATUS_URL.to_string()
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Load layered configuration: built-in defaults, then optional files under
/// `config/`, then `APP__`-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: merchant.merchant_id and merchant.secret_key have no defaults -
    // they MUST come from a config file or environment variables. Validation
    // rejects empty values before any network call is attempted.
    let builder = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("site_url", "http://localhost:8080")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("merchant.merchant_id").is_err()
        || config.get_string("merchant.secret_key").is_err()
    {
        error!("Merchant credentials are not configured. Set APP__MERCHANT__MERCHANT_ID and APP__MERCHANT__SECRET_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "merchant.merchant_id and merchant.secret_key are required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initialize the tracing subscriber from config. RUST_LOG wins when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("platron_gateway={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}
