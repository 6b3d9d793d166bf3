/// Configuration management for the CDN refresh service
///
/// Configuration is loaded from environment variables, with development
/// defaults for everything except the secrets that production must set.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Video provider API configuration
    pub provider: ProviderConfig,
    /// Notification sink configuration
    pub notifier: NotifierConfig,
    /// Refresh trigger configuration
    pub refresh: RefreshConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// Video provider API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider API base URL
    pub base_url: String,
    /// Provider API key
    pub api_key: String,
    /// Max provider API calls per run, kept below the provider's own
    /// per-window rate limit
    pub call_budget: u32,
}

/// Notification sink (Telegram bot) configuration. Both token and chat
/// id must be set for pushes to happen; otherwise the sink is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub api_base: String,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

/// Refresh trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Shared secret required by the trigger and diagnose endpoints
    pub trigger_secret: String,
    /// Chat sender id allowed to trigger runs via the webhook command
    pub admin_sender_id: Option<i64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let is_production = app_env.eq_ignore_ascii_case("production");

        Ok(Config {
            app: AppConfig {
                env: app_env,
                host: std::env::var("REFRESH_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("REFRESH_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8086),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/catalog".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(5),
            },
            provider: ProviderConfig {
                base_url: std::env::var("PROVIDER_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.videoprovider.example".to_string()),
                api_key: match std::env::var("PROVIDER_API_KEY") {
                    Ok(key) => key,
                    Err(_) if is_production => {
                        return Err("PROVIDER_API_KEY must be set in production".to_string())
                    }
                    Err(_) => "dev-key".to_string(),
                },
                call_budget: std::env::var("PROVIDER_CALL_BUDGET")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(900),
            },
            notifier: NotifierConfig {
                api_base: std::env::var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
                bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
                chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
            },
            refresh: RefreshConfig {
                trigger_secret: match std::env::var("REFRESH_TRIGGER_SECRET") {
                    Ok(secret) if !secret.trim().is_empty() => secret,
                    Ok(_) | Err(_) if is_production => {
                        return Err(
                            "REFRESH_TRIGGER_SECRET must be set in production".to_string()
                        )
                    }
                    _ => "dev-secret".to_string(),
                },
                admin_sender_id: std::env::var("REFRESH_ADMIN_SENDER_ID")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
        })
    }
}
