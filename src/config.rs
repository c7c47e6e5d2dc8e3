//! Settings resolved per environment with env-var overrides.
//!
//! Precedence, lowest first:
//! 1. the preset of the resolved [`AppEnvironment`]
//! 2. built-in defaults for server, cache, query and http sections
//! 3. `QUERY_KIT_*` environment variables (`__` separates nested keys,
//!    e.g. `QUERY_KIT_SERVER__PORT=8080`)

use crate::error::{Error, Result};
use crate::query::QueryClientConfig;
use config::{Config, Environment, Map};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const ENV_PREFIX: &str = "QUERY_KIT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: i64 = 3000;
const DEFAULT_MAX_AGE_SECS: i64 = 300;
const DEFAULT_GC_TIME_MS: i64 = 5 * 60 * 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Local,
    Staging,
    Production,
}

impl AppEnvironment {
    /// `APP_ENV` wins when it names a known environment; otherwise
    /// `NODE_ENV=production` selects production and anything else is local.
    pub fn resolve(app_env: Option<&str>, node_env: Option<&str>) -> Self {
        match app_env {
            Some("local") => return AppEnvironment::Local,
            Some("staging") => return AppEnvironment::Staging,
            Some("production") => return AppEnvironment::Production,
            _ => {}
        }
        match node_env {
            Some("production") => AppEnvironment::Production,
            _ => AppEnvironment::Local,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppEnvironment::Local => "local",
            AppEnvironment::Staging => "staging",
            AppEnvironment::Production => "production",
        }
    }

    fn preset(self) -> Preset {
        match self {
            AppEnvironment::Local => Preset {
                api_base_url: "https://jsonplaceholder.typicode.com",
                site_url: "http://localhost:3000",
                features: Features {
                    analytics: false,
                    sentry: false,
                    debug_mode: true,
                },
            },
            AppEnvironment::Staging => Preset {
                api_base_url: "https://staging-api.example.com",
                site_url: "https://staging.example.com",
                features: Features::all_tracking(),
            },
            AppEnvironment::Production => Preset {
                api_base_url: "https://api.example.com",
                site_url: "https://example.com",
                features: Features::all_tracking(),
            },
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Preset {
    api_base_url: &'static str,
    site_url: &'static str,
    features: Features,
}

/// Feature flags, passed through to consumers unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Features {
    pub analytics: bool,
    pub sentry: bool,
    pub debug_mode: bool,
}

impl Features {
    fn all_tracking() -> Self {
        Features {
            analytics: true,
            sentry: true,
            debug_mode: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheSettings {
    /// Server-side response cache max-age.
    pub max_age_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuerySettings {
    pub stale_time_ms: u64,
    pub gc_time_ms: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HttpSettings {
    /// Outbound request timeout; unset means none.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub environment: AppEnvironment,
    pub api_base_url: String,
    pub site_url: String,
    pub features: Features,
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub query: QuerySettings,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Settings {
    /// Load from the process environment.
    ///
    /// # Errors
    /// `Error::ConfigError` on unparsable or invalid values.
    pub fn load() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load from an explicit variable map instead of the process environment.
    ///
    /// # Errors
    /// `Error::ConfigError` on unparsable or invalid values.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self> {
        let environment = AppEnvironment::resolve(
            vars.get("APP_ENV").map(String::as_str),
            vars.get("NODE_ENV").map(String::as_str),
        );
        let preset = environment.preset();

        let settings: Settings = Config::builder()
            .set_default("environment", environment.as_str())?
            .set_default("api_base_url", preset.api_base_url)?
            .set_default("site_url", preset.site_url)?
            .set_default("features.analytics", preset.features.analytics)?
            .set_default("features.sentry", preset.features.sentry)?
            .set_default("features.debug_mode", preset.features.debug_mode)?
            .set_default("server.host", DEFAULT_HOST)?
            .set_default("server.port", DEFAULT_PORT)?
            .set_default("cache.max_age_secs", DEFAULT_MAX_AGE_SECS)?
            .set_default("query.stale_time_ms", 0i64)?
            .set_default("query.gc_time_ms", DEFAULT_GC_TIME_MS)?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        info!("Loaded {} settings (api {})", settings.environment, settings.api_base_url);
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::ConfigError("api_base_url must not be empty".into()));
        }
        if self.site_url.trim().is_empty() {
            return Err(Error::ConfigError("site_url must not be empty".into()));
        }
        if self.cache.max_age_secs == 0 {
            return Err(Error::ConfigError("cache.max_age_secs must be positive".into()));
        }
        if self.server.port == 0 {
            return Err(Error::ConfigError("server.port must be positive".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.cache.max_age_secs)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http.timeout_secs.map(Duration::from_secs)
    }

    pub fn query_config(&self) -> QueryClientConfig {
        QueryClientConfig {
            stale_time: Duration::from_millis(self.query.stale_time_ms),
            gc_time: Duration::from_millis(self.query.gc_time_ms),
        }
    }

    /// Default log filter: `debug` with the debug flag on, `info` otherwise.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.features.debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
