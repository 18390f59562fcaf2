/// Configuration for Chat Tracker Service
///
/// Loaded from environment variables (optionally seeded from a `.env` file).
/// Database settings live in `db_pool::DbConfig`.
use db_pool::env_utils::{parse_env_bool, parse_env_with_default};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub sse: SseConfig,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Seconds between keep-alive comments; 0 disables them
    pub heartbeat_secs: u64,
}

impl SseConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs))
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env_with_default("PORT", 8080),
        };

        let allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );
        if allowed_origins.is_empty() {
            return Err("CORS_ALLOWED_ORIGINS must list at least one origin".to_string());
        }
        let cors = CorsConfig { allowed_origins };
        if app.is_production() && cors.allows_any_origin() {
            return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
        }

        Ok(Config {
            app,
            cors,
            sse: SseConfig {
                heartbeat_secs: parse_env_with_default("SSE_HEARTBEAT_SECS", 15),
            },
            run_migrations: parse_env_bool("RUN_MIGRATIONS", true),
        })
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
