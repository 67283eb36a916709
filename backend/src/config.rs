//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Subscription service configuration
    pub subscriptions: SubscriptionsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
    /// Public base URL of the API, used when building hypermedia links
    pub api_base_url: String,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// SQLite database location (`sqlite:` URL or plain file path)
    pub database_url: String,
}

/// Subscription service configuration
#[derive(Debug, Clone)]
pub struct SubscriptionsConfig {
    /// Service ids registered with the default subscription hook
    pub service_ids: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_base_url = env::var("API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://localhost:{}/api", port));

        Self {
            server: ServerConfig {
                port,
                host,
                api_base_url,
            },
            persistence: PersistenceConfig {
                database_url: env::var("DATABASE_URL").unwrap_or_else(|_| {
                    // Default to ~/.che-api/che.db or current directory
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.che-api/che.db", home.to_string_lossy())
                    } else {
                        ".che-api/che.db".to_string()
                    }
                }),
            },
            subscriptions: SubscriptionsConfig {
                service_ids: parse_list(
                    &env::var("SUBSCRIPTION_SERVICES")
                        .unwrap_or_else(|_| "Saas,OnPremises".to_string()),
                ),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
