//! Environment-sourced gateway configuration

use crate::runtime::FailurePolicy;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_APP_NAME: &str = "session-gateway";
const DEFAULT_CLIENT_ID: &str = "default";
const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v18.0";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Relational store settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full sqlx URL; takes precedence over the individual parts
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Connection URL for the pool.
    ///
    /// Credentials and database name are percent-encoded, so reserved
    /// characters in a password cannot change the target host.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let username = urlencoding::encode(&self.username);
        let credentials = if self.password.is_empty() {
            username.into_owned()
        } else {
            format!("{username}:{}", urlencoding::encode(&self.password))
        };
        format!(
            "mysql://{credentials}@{}:{}/{}",
            self.host,
            self.port,
            urlencoding::encode(&self.database)
        )
    }
}

/// WhatsApp Cloud API settings
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub verify_token: String,
    /// Signs webhook deliveries (`X-Hub-Signature-256`)
    pub app_secret: String,
}

/// Fixed literals and timings of the session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub start_command: String,
    pub end_command: String,
    pub greeting: String,
    pub farewell: String,
    pub duration: Duration,
    pub typing_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            start_command: "!start.ai".to_string(),
            end_command: "!end.ai".to_string(),
            greeting: "Halo".to_string(),
            farewell: "Bye".to_string(),
            duration: Duration::from_secs(1800),
            typing_delay: Duration::from_millis(2000),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub app_name: String,
    pub client_id: String,
    pub port: u16,
    pub database: DatabaseConfig,
    /// Base URL of the answer service; `/chatbot` is appended per request
    pub answer_endpoint: String,
    /// `None` disables the request timeout
    pub answer_timeout: Option<Duration>,
    pub whatsapp: WhatsAppConfig,
    pub session: SessionSettings,
    pub failure_policy: FailurePolicy,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            start_command: or("SESSION_START_COMMAND", &defaults.start_command),
            end_command: or("SESSION_END_COMMAND", &defaults.end_command),
            greeting: or("SESSION_GREETING", &defaults.greeting),
            farewell: or("SESSION_FAREWELL", &defaults.farewell),
            duration: Duration::from_secs(parse_or(
                &get,
                "SESSION_DURATION_SECS",
                defaults.duration.as_secs(),
            )?),
            typing_delay: Duration::from_millis(parse_or(
                &get,
                "TYPING_DELAY_MS",
                u64::try_from(defaults.typing_delay.as_millis()).unwrap_or(2000),
            )?),
        };

        let answer_timeout_secs: u64 = parse_or(&get, "ANSWER_TIMEOUT_SECS", 60)?;

        Ok(Self {
            app_name: or("APP_NAME", DEFAULT_APP_NAME),
            client_id: or("CLIENT_ID", DEFAULT_CLIENT_ID),
            port: parse_or(&get, "GATEWAY_PORT", 8000)?,
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                host: or("DB_HOST", "127.0.0.1"),
                port: parse_or(&get, "DB_PORT", 3306)?,
                username: or("DB_USERNAME", "root"),
                password: get("DB_PASSWORD").unwrap_or_default(),
                database: or("DB_DATABASE", "chatbot"),
                max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 5)?,
            },
            answer_endpoint: get("ENDPOINT_BEDROCK")
                .map(|e| e.trim_end_matches('/').to_string())
                .ok_or(ConfigError::Missing("ENDPOINT_BEDROCK"))?,
            answer_timeout: (answer_timeout_secs > 0)
                .then(|| Duration::from_secs(answer_timeout_secs)),
            whatsapp: WhatsAppConfig {
                api_base: or("WHATSAPP_API_BASE", DEFAULT_WHATSAPP_API_BASE)
                    .trim_end_matches('/')
                    .to_string(),
                phone_number_id: get("WHATSAPP_PHONE_NUMBER_ID")
                    .ok_or(ConfigError::Missing("WHATSAPP_PHONE_NUMBER_ID"))?,
                access_token: get("WHATSAPP_ACCESS_TOKEN")
                    .ok_or(ConfigError::Missing("WHATSAPP_ACCESS_TOKEN"))?,
                verify_token: get("WHATSAPP_VERIFY_TOKEN")
                    .ok_or(ConfigError::Missing("WHATSAPP_VERIFY_TOKEN"))?,
                app_secret: get("WHATSAPP_APP_SECRET")
                    .ok_or(ConfigError::Missing("WHATSAPP_APP_SECRET"))?,
            },
            session,
            failure_policy: get("FAILURE_REPLY")
                .map_or(FailurePolicy::Silent, FailurePolicy::Fallback),
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
