//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables (and a `.env` file) or defaults.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Main configuration structure for the MCP server.
///
/// This struct contains all configurable aspects of the server, organized
/// by domain for clarity and maintainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Which adapters are registered and their local settings.
    pub adapters: AdaptersConfig,

    /// External service credentials.
    pub credentials: CredentialsConfig,

    /// Security and path validation configuration.
    pub security: SecurityConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

// ============================================================================
// Adapters
// ============================================================================

/// An adapter that can be switched on through `MCP_ADAPTERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Greet,
    Filesystem,
    Git,
    Postgres,
    Calendar,
    Gmail,
    WhatsApp,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 7] = [
        AdapterKind::Greet,
        AdapterKind::Filesystem,
        AdapterKind::Git,
        AdapterKind::Postgres,
        AdapterKind::Calendar,
        AdapterKind::Gmail,
        AdapterKind::WhatsApp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greet => "greet",
            Self::Filesystem => "filesystem",
            Self::Git => "git",
            Self::Postgres => "postgres",
            Self::Calendar => "calendar",
            Self::Gmail => "gmail",
            Self::WhatsApp => "whatsapp",
        }
    }

    /// Parse a comma-separated list; `all` selects every adapter.
    ///
    /// Unknown names are skipped with a warning.
    pub fn parse_list(list: &str) -> Vec<AdapterKind> {
        let mut kinds = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if item.eq_ignore_ascii_case("all") {
                return Self::ALL.to_vec();
            }
            match item.parse::<AdapterKind>() {
                Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Ok(_) => {}
                Err(e) => warn!("{}", e),
            }
        }
        kinds
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greet" => Ok(Self::Greet),
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "git" => Ok(Self::Git),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "calendar" => Ok(Self::Calendar),
            "gmail" => Ok(Self::Gmail),
            "whatsapp" => Ok(Self::WhatsApp),
            other => Err(format!("Unknown adapter '{}'", other)),
        }
    }
}

/// Adapter selection and adapter-local settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptersConfig {
    /// Adapters registered at startup, in this order.
    pub enabled: Vec<AdapterKind>,

    /// Scratch directory where `add_file_to_repo` clones repositories.
    pub git_repo_base: PathBuf,

    /// Number of characters returned by `read_file`.
    pub read_preview_chars: usize,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            enabled: AdapterKind::ALL.to_vec(),
            git_repo_base: PathBuf::from("repos"),
            read_preview_chars: 1000,
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Credentials for the external services behind the adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub google: GoogleCredentials,
    pub green_api: GreenApiCredentials,
    pub postgres: PostgresCredentials,
}

/// Google OAuth credentials shared by the Calendar and Gmail adapters.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GoogleCredentials {
    /// Ready-to-use bearer token. Takes precedence over the refresh grant.
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

impl GoogleCredentials {
    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
            || (self.client_id.is_some()
                && self.client_secret.is_some()
                && self.refresh_token.is_some())
    }
}

/// Green-API instance used by the WhatsApp adapter.
#[derive(Clone, Serialize, Deserialize)]
pub struct GreenApiCredentials {
    pub instance_id: Option<String>,
    pub api_token: Option<String>,
    pub api_url: String,
}

impl Default for GreenApiCredentials {
    fn default() -> Self {
        Self {
            instance_id: None,
            api_token: None,
            api_url: "https://api.green-api.com".to_string(),
        }
    }
}

/// PostgreSQL connection settings (the database is chosen per call).
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
}

impl Default for PostgresCredentials {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}

/// Custom Debug implementations to redact secrets from logs.
impl fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("access_token", &redact(&self.access_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl fmt::Debug for GreenApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenApiCredentials")
            .field("instance_id", &self.instance_id)
            .field("api_token", &redact(&self.api_token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl fmt::Debug for PostgresCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .finish()
    }
}

// ============================================================================
// Security
// ============================================================================

/// Configuration for security and path validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Optional root directory for path operations.
    /// If None, no path restrictions are enforced.
    pub root_path: Option<PathBuf>,

    /// Whether symlinks may be followed at all.
    /// Followed symlinks must still resolve inside the root.
    pub allow_symlinks: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            root_path: None,
            allow_symlinks: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "tool-adapter-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
            adapters: AdaptersConfig::default(),
            credentials: CredentialsConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Server settings use the `MCP_` prefix; service credentials keep the
    /// names their providers document (`GREENAPI_*`, `PG_*`).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(name) = env_opt("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Some(level) = env_opt("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(timestamps) = env_opt("MCP_LOG_TIMESTAMPS") {
            config.logging.with_timestamps = !matches!(timestamps.to_lowercase().as_str(), "false" | "0" | "no");
        }

        config.transport = TransportConfig::from_env();

        if let Some(adapters) = env_opt("MCP_ADAPTERS") {
            config.adapters.enabled = AdapterKind::parse_list(&adapters);
            info!("Enabled adapters: {:?}", config.adapters.enabled);
        }

        if let Some(base) = env_opt("MCP_GIT_REPO_BASE") {
            config.adapters.git_repo_base = PathBuf::from(base);
        }

        let google = &mut config.credentials.google;
        google.access_token = env_opt("MCP_GOOGLE_ACCESS_TOKEN");
        google.client_id = env_opt("MCP_GOOGLE_CLIENT_ID");
        google.client_secret = env_opt("MCP_GOOGLE_CLIENT_SECRET");
        google.refresh_token = env_opt("MCP_GOOGLE_REFRESH_TOKEN");
        if !google.is_configured() {
            warn!("Google credentials not set - Calendar and Gmail operations will fail");
        }

        let green = &mut config.credentials.green_api;
        green.instance_id = env_opt("GREENAPI_INSTANCE_ID");
        green.api_token = env_opt("GREENAPI_API_TOKEN");
        if let Some(url) = env_opt("GREENAPI_API_URL") {
            green.api_url = url.trim_end_matches('/').to_string();
        }

        let pg = &mut config.credentials.postgres;
        if let Some(host) = env_opt("PG_HOST") {
            pg.host = host;
        }
        if let Some(port) = env_opt("PG_PORT") {
            match port.parse() {
                Ok(port) => pg.port = port,
                Err(_) => warn!("Invalid PG_PORT '{}', using {}", port, pg.port),
            }
        }
        if let Some(user) = env_opt("PG_USER") {
            pg.user = user;
        }
        pg.password = env_opt("PG_PASS");

        if let Some(root_path) = env_opt("MCP_ROOT_PATH") {
            config.security.root_path = Some(PathBuf::from(root_path));
            info!("Path security enabled: root directory set to {:?}", config.security.root_path);
        } else {
            warn!(
                "MCP_ROOT_PATH not set - no path restrictions active. \
                 All filesystem paths will be allowed."
            );
        }

        if let Some(allow_symlinks) = env_opt("MCP_ALLOW_SYMLINKS") {
            config.security.allow_symlinks = allow_symlinks.parse().unwrap_or(true);
            info!("Symlinks allowed: {}", config.security.allow_symlinks);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests run serially
    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_postgres_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("PG_HOST", "db.internal");
            std::env::set_var("PG_PORT", "6543");
            std::env::set_var("PG_PASS", "hunter2");
        }
        let config = Config::from_env();
        assert_eq!(config.credentials.postgres.host, "db.internal");
        assert_eq!(config.credentials.postgres.port, 6543);
        assert_eq!(config.credentials.postgres.password.as_deref(), Some("hunter2"));
        unsafe {
            std::env::remove_var("PG_HOST");
            std::env::remove_var("PG_PORT");
            std::env::remove_var("PG_PASS");
        }
    }

    #[test]
    fn test_invalid_port_keeps_default() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("PG_PORT", "not-a-port");
        }
        let config = Config::from_env();
        assert_eq!(config.credentials.postgres.port, 5432);
        unsafe {
            std::env::remove_var("PG_PORT");
        }
    }

    #[test]
    fn test_adapters_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("MCP_ADAPTERS", "git, fs,unknown,git");
        }
        let config = Config::from_env();
        assert_eq!(
            config.adapters.enabled,
            vec![AdapterKind::Git, AdapterKind::Filesystem]
        );
        unsafe {
            std::env::remove_var("MCP_ADAPTERS");
        }
    }

    #[test]
    fn test_parse_all_adapters() {
        assert_eq!(AdapterKind::parse_list("greet,all"), AdapterKind::ALL.to_vec());
        assert!(AdapterKind::parse_list("").is_empty());
    }

    #[test]
    fn test_credentials_redacted_in_debug() {
        let creds = CredentialsConfig {
            google: GoogleCredentials {
                access_token: Some("ya29.secret".to_string()),
                client_secret: Some("client-secret".to_string()),
                ..Default::default()
            },
            green_api: GreenApiCredentials {
                api_token: Some("green-token".to_string()),
                ..Default::default()
            },
            postgres: PostgresCredentials {
                password: Some("pg-password".to_string()),
                ..Default::default()
            },
        };
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("REDACTED"));
        for secret in ["ya29.secret", "client-secret", "green-token", "pg-password"] {
            assert!(!debug_str.contains(secret));
        }
    }

    #[test]
    fn test_google_configured_requires_full_grant() {
        let mut google = GoogleCredentials {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        };
        assert!(!google.is_configured());
        google.refresh_token = Some("refresh".into());
        assert!(google.is_configured());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.adapters.enabled.len(), 7);
        assert_eq!(config.adapters.git_repo_base, PathBuf::from("repos"));
        assert_eq!(config.credentials.green_api.api_url, "https://api.green-api.com");
    }
}
