use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Root every request path is joined onto, e.g. `https://api.example.com/api`
    pub base_url: String,
    pub timeout_ms: u64,
}

/// How the client proves it is logged in. Exactly one is active per client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// `Authorization: Bearer` header, refreshed through `/auth/refresh` on 401
    Bearer,
    /// Server session cookie plus an `X-XSRF-TOKEN` header on mutating requests
    #[default]
    Cookie,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where the route guard and forced sign-out send the user
    pub login_path: String,
    pub mode: SessionMode,
    /// Client-side minimum for new passwords
    pub password_min_length: usize,
    /// Refresh a bearer credential this long before the server says it expires
    pub refresh_margin_seconds: u64,
    /// Endpoint that issues the `XSRF-TOKEN` cookie (cookie mode only)
    pub xsrf_cookie_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            mode: SessionMode::Cookie,
            password_min_length: 6,
            refresh_margin_seconds: 60,
            xsrf_cookie_path: "/sanctum/csrf-cookie".to_string(),
        }
    }
}

impl Config {
    /// Build a configuration for `base_url` with every other setting at its default.
    pub fn new(base_url: impl Into<String>, mode: SessionMode) -> Self {
        Config {
            api: ApiConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            session: SessionConfig {
                mode,
                ..Default::default()
            },
        }
    }

    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let base_url = std::env::var("API_BASE_URL").map_err(|_| {
            ConfigError::ValidationError("API_BASE_URL must be set".to_string())
        })?;

        let timeout_ms = env_parse("API_TIMEOUT_MS").unwrap_or(10_000);

        let mode = match std::env::var("SESSION_MODE") {
            Ok(value) => parse_mode(&value)?,
            Err(_) => SessionMode::default(),
        };

        let defaults = SessionConfig::default();
        let config = Config {
            api: ApiConfig {
                base_url,
                timeout_ms,
            },
            session: SessionConfig {
                login_path: std::env::var("LOGIN_PATH").unwrap_or(defaults.login_path),
                mode,
                password_min_length: env_parse("PASSWORD_MIN_LENGTH")
                    .unwrap_or(defaults.password_min_length),
                refresh_margin_seconds: env_parse("REFRESH_MARGIN_SECONDS")
                    .unwrap_or(defaults.refresh_margin_seconds),
                xsrf_cookie_path: std::env::var("XSRF_COOKIE_PATH")
                    .unwrap_or(defaults.xsrf_cookie_path),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "API_BASE_URL is not a valid URL ({}): {e}",
                self.api.base_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "API_BASE_URL must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.api.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "API_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.session.password_min_length == 0 {
            return Err(ConfigError::ValidationError(
                "PASSWORD_MIN_LENGTH must be greater than 0".to_string(),
            ));
        }

        if !self.session.login_path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "LOGIN_PATH must start with '/'".to_string(),
            ));
        }

        if url.scheme() == "http" && self.session.mode == SessionMode::Bearer {
            tracing::warn!(
                base_url = %self.api.base_url,
                "Bearer credentials will be sent over plain HTTP"
            );
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }
}

fn parse_mode(value: &str) -> Result<SessionMode, ConfigError> {
    match value.to_lowercase().as_str() {
        "bearer" | "token" => Ok(SessionMode::Bearer),
        "cookie" | "session" => Ok(SessionMode::Cookie),
        other => Err(ConfigError::ValidationError(format!(
            "SESSION_MODE must be 'cookie' or 'bearer', got '{other}'"
        ))),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
