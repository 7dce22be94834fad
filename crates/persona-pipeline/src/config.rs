//! Pipeline configuration loaded from `PERSONA_*` environment variables.

use config::{Config, Environment};
use persona_cache::CacheTtls;
use persona_core::{Error, Result};
use persona_store::StoreConfig;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "PERSONA";

pub const DEFAULT_PRIMARY_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SECONDARY_BASE_URL: &str = "https://api.xiaomimimo.com/v1";
pub const DEFAULT_SECONDARY_MODEL: &str = "mimo-v2-flash";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Raw settings as read from the environment. Every value is an optional
/// string; [`Settings::into_config`] validates and applies defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub primary_api_key: Option<String>,
    pub primary_base_url: Option<String>,
    pub primary_model: Option<String>,
    pub secondary_api_key: Option<String>,
    pub secondary_base_url: Option<String>,
    pub secondary_model: Option<String>,
    pub provider_timeout_secs: Option<String>,
    pub store_url: Option<String>,
    pub store_connect_timeout_ms: Option<String>,
    pub store_connect_attempts: Option<String>,
    pub store_cooldown_ms: Option<String>,
    pub profile_ttl_secs: Option<String>,
    pub auction_ttl_secs: Option<String>,
    pub rate_limit_window_secs: Option<String>,
    pub rate_limit_max: Option<String>,
    pub rate_limit_sweep_secs: Option<String>,
    pub bind: Option<String>,
}

impl Settings {
    /// Read settings from the process environment, after loading `.env` if
    /// one exists.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Read settings from an explicit map of `PERSONA_*` variables.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(vars.into_iter().collect())))
    }

    fn load(source: Environment) -> Result<Self> {
        Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(format!("Failed to read configuration: {}", e)))
    }

    /// Validate values and fill in defaults.
    pub fn into_config(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let primary = ProviderSettings {
            api_key: text(self.primary_api_key),
            base_url: text(self.primary_base_url).unwrap_or(defaults.primary.base_url),
            model: text(self.primary_model).unwrap_or(defaults.primary.model),
        };
        let secondary = ProviderSettings {
            api_key: text(self.secondary_api_key),
            base_url: text(self.secondary_base_url).unwrap_or(defaults.secondary.base_url),
            model: text(self.secondary_model).unwrap_or(defaults.secondary.model),
        };

        let provider_timeout = Duration::from_secs(positive(
            "provider_timeout_secs",
            self.provider_timeout_secs,
            defaults.provider_timeout.as_secs(),
        )?);

        let store = StoreConfig::default()
            .with_connect_timeout(Duration::from_millis(positive(
                "store_connect_timeout_ms",
                self.store_connect_timeout_ms,
                defaults.store.connect_timeout.as_millis() as u64,
            )?))
            .with_connect_attempts(positive(
                "store_connect_attempts",
                self.store_connect_attempts,
                defaults.store.connect_attempts,
            )?)
            .with_cooldown(Duration::from_millis(number(
                "store_cooldown_ms",
                self.store_cooldown_ms,
                defaults.store.cooldown.as_millis() as u64,
            )?));

        let ttls = CacheTtls {
            profile: Duration::from_secs(positive(
                "profile_ttl_secs",
                self.profile_ttl_secs,
                defaults.ttls.profile.as_secs(),
            )?),
            auction: Duration::from_secs(positive(
                "auction_ttl_secs",
                self.auction_ttl_secs,
                defaults.ttls.auction.as_secs(),
            )?),
        };

        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(positive(
                "rate_limit_window_secs",
                self.rate_limit_window_secs,
                defaults.rate_limit.window.as_secs(),
            )?),
            max: positive("rate_limit_max", self.rate_limit_max, defaults.rate_limit.max)?,
            sweep_interval: Duration::from_secs(positive(
                "rate_limit_sweep_secs",
                self.rate_limit_sweep_secs,
                defaults.rate_limit.sweep_interval.as_secs(),
            )?),
        };

        Ok(PipelineConfig {
            primary,
            secondary,
            provider_timeout,
            store_url: text(self.store_url),
            store,
            ttls,
            rate_limit,
            bind: text(self.bind).unwrap_or(defaults.bind),
        })
    }
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn number<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T> {
    match text(value) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            Error::Config(format!(
                "Invalid value for {}_{}: {:?}",
                ENV_PREFIX,
                key.to_uppercase(),
                raw
            ))
        }),
    }
}

fn positive<T: FromStr + PartialOrd + Default>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T> {
    let parsed = number(key, value, default)?;
    if parsed <= T::default() {
        return Err(Error::Config(format!(
            "{}_{} must be greater than zero",
            ENV_PREFIX,
            key.to_uppercase()
        )));
    }
    Ok(parsed)
}

/// One OpenAI-compatible provider. Disabled while no credential is set.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl ProviderSettings {
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// The credential with all but its last four characters hidden.
    pub fn masked_key(&self) -> Option<String> {
        self.api_key.as_deref().map(mask)
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.masked_key())
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Fixed-window rate limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max: u32,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max: 2,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Validated pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub primary: ProviderSettings,
    pub secondary: ProviderSettings,
    pub provider_timeout: Duration,
    /// Absent: caching and visitor tracking are disabled.
    pub store_url: Option<String>,
    pub store: StoreConfig,
    pub ttls: CacheTtls,
    pub rate_limit: RateLimitConfig,
    pub bind: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary: ProviderSettings {
                api_key: None,
                base_url: DEFAULT_PRIMARY_BASE_URL.to_string(),
                model: DEFAULT_PRIMARY_MODEL.to_string(),
            },
            secondary: ProviderSettings {
                api_key: None,
                base_url: DEFAULT_SECONDARY_BASE_URL.to_string(),
                model: DEFAULT_SECONDARY_MODEL.to_string(),
            },
            provider_timeout: Duration::from_secs(30),
            store_url: None,
            store: StoreConfig::default(),
            ttls: CacheTtls::default(),
            rate_limit: RateLimitConfig::default(),
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Settings::from_env()?.into_config()
    }

    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Settings::from_map(vars)?.into_config()
    }

    /// Effective configuration with credentials masked, for display.
    pub fn masked(&self) -> serde_json::Value {
        json!({
            "primary": {
                "enabled": self.primary.is_enabled(),
                "apiKey": self.primary.masked_key(),
                "baseUrl": self.primary.base_url,
                "model": self.primary.model,
            },
            "secondary": {
                "enabled": self.secondary.is_enabled(),
                "apiKey": self.secondary.masked_key(),
                "baseUrl": self.secondary.base_url,
                "model": self.secondary.model,
            },
            "providerTimeoutSecs": self.provider_timeout.as_secs(),
            "store": {
                "url": self.store_url.as_deref().map(persona_store::redis::redact),
                "connectTimeoutMs": self.store.connect_timeout.as_millis() as u64,
                "connectAttempts": self.store.connect_attempts,
                "cooldownMs": self.store.cooldown.as_millis() as u64,
            },
            "ttls": {
                "profileSecs": self.ttls.profile.as_secs(),
                "auctionSecs": self.ttls.auction.as_secs(),
            },
            "rateLimit": {
                "windowSecs": self.rate_limit.window.as_secs(),
                "max": self.rate_limit.max,
                "sweepSecs": self.rate_limit.sweep_interval.as_secs(),
            },
            "bind": self.bind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = PipelineConfig::from_map(HashMap::new()).unwrap();
        assert!(!config.primary.is_enabled());
        assert!(!config.secondary.is_enabled());
        assert_eq!(config.primary.model, DEFAULT_PRIMARY_MODEL);
        assert_eq!(config.secondary.base_url, DEFAULT_SECONDARY_BASE_URL);
        assert_eq!(config.store_url, None);
        assert_eq!(config.ttls.profile, Duration::from_secs(2_592_000));
        assert_eq!(config.rate_limit.max, 2);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.store.cooldown, Duration::from_secs(5));
        assert_eq!(config.provider_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = PipelineConfig::from_map(vars(&[
            ("PERSONA_PRIMARY_API_KEY", "sk-test-123456789"),
            ("PERSONA_STORE_URL", "memory://"),
            ("PERSONA_RATE_LIMIT_MAX", "5"),
            ("PERSONA_STORE_COOLDOWN_MS", "250"),
            ("PERSONA_AUCTION_TTL_SECS", "120"),
            ("PERSONA_BIND", "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert!(config.primary.is_enabled());
        assert_eq!(config.store_url.as_deref(), Some("memory://"));
        assert_eq!(config.rate_limit.max, 5);
        assert_eq!(config.store.cooldown, Duration::from_millis(250));
        assert_eq!(config.ttls.auction, Duration::from_secs(120));
        assert_eq!(config.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = PipelineConfig::from_map(vars(&[
            ("PERSONA_PRIMARY_API_KEY", "  "),
            ("PERSONA_STORE_URL", ""),
            ("PERSONA_RATE_LIMIT_MAX", ""),
        ]))
        .unwrap();
        assert!(!config.primary.is_enabled());
        assert_eq!(config.store_url, None);
        assert_eq!(config.rate_limit.max, 2);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = PipelineConfig::from_map(vars(&[("PERSONA_PROFILE_TTL_SECS", "forever")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("PERSONA_PROFILE_TTL_SECS")));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(PipelineConfig::from_map(vars(&[("PERSONA_RATE_LIMIT_MAX", "0")])).is_err());
        assert!(PipelineConfig::from_map(vars(&[("PERSONA_RATE_LIMIT_WINDOW_SECS", "0")])).is_err());
    }

    #[test]
    fn test_masked_output_hides_credentials() {
        let config = PipelineConfig::from_map(vars(&[
            ("PERSONA_SECONDARY_API_KEY", "mimo-secret-abcd"),
            ("PERSONA_STORE_URL", "redis://:hunter2@cache:6379"),
        ]))
        .unwrap();

        let masked = config.masked();
        assert_eq!(masked["secondary"]["apiKey"], "****abcd");
        assert_eq!(masked["primary"]["apiKey"], serde_json::Value::Null);
        let url = masked["store"]["url"].as_str().unwrap();
        assert!(!url.contains("hunter2"));
        assert!(!format!("{:?}", config).contains("mimo-secret"));
    }
}
