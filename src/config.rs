use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub filter: FilterSettings,
    #[serde(default)]
    pub questions: QuestionSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_endpoint() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 12 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_cache_ttl() -> u64 { 300 }
fn default_sweep_interval() -> u64 { 300 }
fn default_max_entries() -> u64 { 10_000 }

/// How the filter measures venue distance to a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceReference {
    /// Distance from the unweighted centroid of located participants
    #[default]
    Centroid,
    /// Distance from the closest located participant
    Nearest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterSettings {
    #[serde(default = "default_max_distance")]
    pub max_distance_m: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_tie_band")]
    pub tie_band: f64,
    #[serde(default)]
    pub reference: DistanceReference,
    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            max_distance_m: default_max_distance(),
            max_results: default_max_results(),
            tie_band: default_tie_band(),
            reference: DistanceReference::default(),
            weights: WeightsConfig::default(),
        }
    }
}

fn default_max_distance() -> f64 { 10_000.0 }
fn default_max_results() -> usize { 50 }
fn default_tie_band() -> f64 { 0.05 }

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_base_weight")]
    pub base: f64,
    #[serde(default = "default_activity_type_weight")]
    pub activity_type: f64,
    #[serde(default = "default_cuisine_weight")]
    pub cuisine: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_partner_weight")]
    pub partner: f64,
    #[serde(default = "default_proximity_weight")]
    pub proximity: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            base: default_base_weight(),
            activity_type: default_activity_type_weight(),
            cuisine: default_cuisine_weight(),
            location: default_location_weight(),
            partner: default_partner_weight(),
            proximity: default_proximity_weight(),
        }
    }
}

fn default_base_weight() -> f64 { 0.5 }
fn default_activity_type_weight() -> f64 { 0.20 }
fn default_cuisine_weight() -> f64 { 0.15 }
fn default_location_weight() -> f64 { 0.10 }
fn default_partner_weight() -> f64 { 0.10 }
fn default_proximity_weight() -> f64 { 0.10 }

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSettings {
    #[serde(default = "default_venue_sample_size")]
    pub venue_sample_size: usize,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            venue_sample_size: default_venue_sample_size(),
            max_questions: default_max_questions(),
        }
    }
}

fn default_venue_sample_size() -> usize { 12 }
fn default_max_questions() -> usize { 3 }

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// PostgreSQL URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// JSON file with `venues`, `preferences` and `profiles` for the in-memory store
    pub seed_file: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
            seed_file: None,
        }
    }
}

fn default_max_connections() -> u32 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with OUTING__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., OUTING__LLM__API_KEY -> llm.api_key
            .add_source(
                Environment::with_prefix("OUTING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("OUTING")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of the layered config
///
/// DATABASE_URL and OPENAI_API_KEY are honoured when the prefixed forms are unset.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let database_url = env::var("OUTING__STORE__DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok();
    let api_key = env::var("OUTING__LLM__API_KEY")
        .or_else(|_| env::var("OPENAI_API_KEY"))
        .ok();

    let mut builder = Config::builder().add_source(settings);

    if let Some(url) = database_url {
        builder = builder.set_override("store.database_url", url)?;
    }
    if let Some(key) = api_key {
        builder = builder.set_override("llm.api_key", key)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.base, 0.5);
        assert_eq!(weights.activity_type, 0.20);
        assert_eq!(weights.cuisine, 0.15);
        assert_eq!(weights.location, 0.10);
        assert_eq!(weights.partner, 0.10);
        assert_eq!(weights.proximity, 0.10);
    }

    #[test]
    fn test_default_filter_settings() {
        let filter = FilterSettings::default();
        assert_eq!(filter.max_results, 50);
        assert_eq!(filter.tie_band, 0.05);
        assert_eq!(filter.reference, DistanceReference::Centroid);
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_empty_config_deserializes_with_defaults() {
        let settings: Settings = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.cache.ttl_secs, 300);
        assert_eq!(settings.questions.venue_sample_size, 12);
        assert!(settings.store.database_url.is_none());
    }

    #[test]
    fn test_load_sample_config_file() {
        let settings = Settings::load_from("config/default.toml").unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.filter.max_results, 50);
        assert_eq!(settings.filter.weights.activity_type, 0.20);
        assert_eq!(settings.questions.max_questions, 3);
    }
}
