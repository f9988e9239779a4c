use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level service configuration, loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Health endpoint server configuration
    pub server: ServerConfig,
    /// Message destination configuration
    pub targets: SurfaceTargets,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// Destinations on the messaging surface. Unset destinations are a runtime
/// configuration error at the point they are first needed, not at startup:
/// a fresh deployment may set them later without restarting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SurfaceTargets {
    /// Moderation group chat id
    pub moderation_chat: Option<i64>,
    /// Publication channel id
    pub publication_channel: Option<i64>,
    /// Chat carrying the public reputation labels, when distinct from the
    /// moderation group
    pub title_chat: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses the in-memory ledger)
    pub postgres_enabled: bool,
    /// Connection pool size
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/postguard".to_string(),
            postgres_enabled: false,
            max_connections: 5,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8090,
            },
            targets: SurfaceTargets::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("POSTGUARD_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = env::var("POSTGUARD_PORT") {
            config.server.port = port.parse().context("Invalid POSTGUARD_PORT value")?;
        }

        if let Ok(chat) = env::var("POSTGUARD_MODERATION_CHAT") {
            config.targets.moderation_chat =
                Some(chat.parse().context("Invalid POSTGUARD_MODERATION_CHAT value")?);
        }

        if let Ok(channel) = env::var("POSTGUARD_PUBLICATION_CHANNEL") {
            config.targets.publication_channel = Some(
                channel
                    .parse()
                    .context("Invalid POSTGUARD_PUBLICATION_CHANNEL value")?,
            );
        }

        if let Ok(chat) = env::var("POSTGUARD_TITLE_CHAT") {
            config.targets.title_chat =
                Some(chat.parse().context("Invalid POSTGUARD_TITLE_CHAT value")?);
        }

        if let Ok(url) = env::var("POSTGUARD_POSTGRES_URL") {
            config.database.postgres_url = url;
        }

        if let Ok(enabled) = env::var("POSTGUARD_POSTGRES_ENABLED") {
            config.database.postgres_enabled = enabled
                .parse()
                .context("Invalid POSTGUARD_POSTGRES_ENABLED value")?;
        }

        if let Ok(max) = env::var("POSTGUARD_POSTGRES_MAX_CONNECTIONS") {
            config.database.max_connections = max
                .parse()
                .context("Invalid POSTGUARD_POSTGRES_MAX_CONNECTIONS value")?;
        }

        if let Ok(log_level) = env::var("POSTGUARD_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for consistency.
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.database.postgres_enabled && self.database.postgres_url.is_empty() {
            return Err(anyhow::anyhow!(
                "POSTGUARD_POSTGRES_URL is required when Postgres is enabled"
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("Connection pool size must be non-zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_url_with_postgres_enabled() {
        let mut config = AppConfig::default();
        config.database.postgres_enabled = true;
        config.database.postgres_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_targets_default_unset() {
        let targets = SurfaceTargets::default();
        assert!(targets.moderation_chat.is_none());
        assert!(targets.publication_channel.is_none());
        assert!(targets.title_chat.is_none());
    }
}
