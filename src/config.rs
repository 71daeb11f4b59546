use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_MRP_HORIZON_DAYS: u32 = 90;
const DEFAULT_UOM_ROUNDING_SCALE: u32 = 4;

/// Application configuration. Carries the planning/inventory policy knobs that gate MRP,
/// ledger, and production-order behavior, plus the ambient keys a deployment needs for
/// persistence and logging. There is no HTTP, auth, or cache layer in this crate, so none of
/// their configuration surfaces here.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[validate(length(min = 1))]
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Whether the MRP engine cascades planned orders down into make-items' own component
    /// requirements, or stops at the first level and reports a blocking issue instead.
    #[serde(default = "default_true")]
    pub mrp_enable_sub_assembly_cascading: bool,

    /// Planning horizon, in days, used when a run is triggered without an explicit horizon.
    #[serde(default = "default_mrp_horizon_days")]
    #[validate(range(min = 1))]
    pub mrp_default_horizon_days: u32,

    /// Whether `post` may take an on-hand balance negative instead of rejecting the ledger
    /// entry with `InsufficientStock`.
    #[serde(default)]
    pub inventory_allow_negative_on_hand: bool,

    /// Whether a shipment may be posted against a sales order line with insufficient
    /// reservation, instead of returning `InsufficientReservation`.
    #[serde(default)]
    pub inventory_allow_oversell: bool,

    /// Whether completing a production order automatically advances it to ready-to-ship, or
    /// leaves that transition to a separate explicit call.
    #[serde(default)]
    pub production_auto_ready_to_ship_on_completion: bool,

    /// Decimal scale used when rounding the result of a UOM conversion.
    #[serde(default = "default_uom_rounding_scale")]
    pub uom_rounding_scale: u32,
}

impl AppConfig {
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            auto_migrate: true,
            log_level: default_log_level(),
            log_json: false,
            environment,
            mrp_enable_sub_assembly_cascading: true,
            mrp_default_horizon_days: DEFAULT_MRP_HORIZON_DAYS,
            inventory_allow_negative_on_hand: false,
            inventory_allow_oversell: false,
            production_auto_ready_to_ship_on_completion: false,
            uom_rounding_scale: DEFAULT_UOM_ROUNDING_SCALE,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == DEFAULT_ENV
    }
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_true() -> bool {
    true
}

fn default_mrp_horizon_days() -> u32 {
    DEFAULT_MRP_HORIZON_DAYS
}

fn default_uom_rounding_scale() -> u32 {
    DEFAULT_UOM_ROUNDING_SCALE
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some(format!("unsupported log level: {level}").into());
            Err(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Initializes the global `tracing` subscriber. No OpenTelemetry exporter is wired up here —
/// the collector that would receive spans lives in the excluded HTTP transport.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("stateset_planner={level}");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    let subscriber = fmt().with_env_filter(filter);
    let result = if json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(err) = result {
        error!("failed to install tracing subscriber: {}", err);
    }
}

/// Loads configuration, layering `config/default.toml`, `config/{environment}.toml`, and
/// `APP__`-prefixed environment variables, in that order.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://stateset-planner.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .set_default("mrp_enable_sub_assembly_cascading", true)?
        .set_default("mrp_default_horizon_days", DEFAULT_MRP_HORIZON_DAYS as i64)?
        .set_default("inventory_allow_negative_on_hand", false)?
        .set_default("inventory_allow_oversell", false)?
        .set_default("production_auto_ready_to_ship_on_completion", false)?
        .set_default("uom_rounding_scale", DEFAULT_UOM_ROUNDING_SCALE as i64)?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let config = builder.build()?;
    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new("sqlite://test.db?mode=memory".into(), "development".into())
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = base_config();
        assert!(cfg.is_development());
        assert!(!cfg.is_production());
        assert_eq!(cfg.uom_rounding_scale, DEFAULT_UOM_ROUNDING_SCALE);
        assert!(cfg.mrp_enable_sub_assembly_cascading);
    }

    #[test]
    fn rejects_unsupported_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".to_string();
        assert!(cfg.validate().is_err());
    }

    /// `load_config` layers `config/default.toml` under `config/{RUN_ENV}.toml`; writes a real
    /// config directory to a temp dir and points the process at it for the duration of the test.
    /// Gated behind `mock-tests` since it mutates the process-wide current directory.
    #[cfg(feature = "mock-tests")]
    #[test]
    fn layers_default_and_environment_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("default.toml"),
            "database_url = \"sqlite://default.db?mode=rwc\"\nmrp_default_horizon_days = 30\n",
        )
        .unwrap();
        std::fs::write(
            config_dir.join("staging.toml"),
            "database_url = \"sqlite://staging.db?mode=rwc\"\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let original_dir = env::current_dir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        env::set_var("RUN_ENV", "staging");
        let result = load_config();
        env::set_current_dir(&original_dir).unwrap();
        env::remove_var("RUN_ENV");

        let cfg = result.unwrap();
        assert_eq!(cfg.database_url, "sqlite://staging.db?mode=rwc");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.mrp_default_horizon_days, 30);
    }
}
