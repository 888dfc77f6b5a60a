//! Configuration — everything comes from environment variables.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Default HTTP port for the web app and webhook endpoint.
const DEFAULT_PORT: u16 = 3000;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Chat id that receives lead reports and support forwards.
    /// Absent means those notifications are skipped.
    pub admin_chat_id: Option<String>,
    /// Externally reachable base URL (e.g. `https://promo.example.com`).
    /// When set, the bot registers a webhook and the web-app button points
    /// here; when absent, the bot long-polls and the button points at
    /// localhost.
    pub base_url: Option<String>,
    /// HTTP listen port.
    pub port: u16,
    /// Path to the libSQL database file. Absent means leads and sessions
    /// live in process memory only.
    pub db_path: Option<PathBuf>,
    /// Directory with the wheel web-app static assets.
    pub webapp_dir: PathBuf,
    /// Forward free text outside the funnel to the admin chat as a
    /// support message.
    pub forward_unsolicited: bool,
}

impl Config {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        let port = match std::env::var("PRIZEWHEEL_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PRIZEWHEEL_PORT".to_string(),
                message: format!("not a valid port: {raw}"),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            admin_chat_id: env_opt("ADMIN_CHAT_ID"),
            base_url: env_opt("PRIZEWHEEL_BASE_URL"),
            port,
            db_path: env_opt("PRIZEWHEEL_DB_PATH").map(PathBuf::from),
            webapp_dir: env_opt("PRIZEWHEEL_WEBAPP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("webapp")),
            forward_unsolicited: env_flag("PRIZEWHEEL_FORWARD_UNSOLICITED", true),
        })
    }

    /// URL the web-app launch button opens.
    pub fn webapp_url(&self) -> String {
        match &self.base_url {
            Some(base) => format!("{}/index.html", base.trim_end_matches('/')),
            None => format!("http://localhost:{}/index.html", self.port),
        }
    }

    /// Webhook URL to register with Telegram, if a public base URL is set.
    pub fn webhook_url(&self) -> Option<String> {
        self.base_url.as_ref().map(|base| {
            format!(
                "{}/bot/{}",
                base.trim_end_matches('/'),
                self.bot_token.expose_secret()
            )
        })
    }
}

/// Read an optional env var, treating empty strings as absent.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read a boolean env flag with a default.
fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => !matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webapp_url_with_base() {
        let config = Config {
            bot_token: SecretString::from("t"),
            admin_chat_id: None,
            base_url: Some("https://promo.example.com/".to_string()),
            port: 3000,
            db_path: None,
            webapp_dir: PathBuf::from("webapp"),
            forward_unsolicited: true,
        };
        assert_eq!(config.webapp_url(), "https://promo.example.com/index.html");
    }

    #[test]
    fn webapp_url_localhost_fallback() {
        let config = Config {
            bot_token: SecretString::from("t"),
            admin_chat_id: None,
            base_url: None,
            port: 8080,
            db_path: None,
            webapp_dir: PathBuf::from("webapp"),
            forward_unsolicited: true,
        };
        assert_eq!(config.webapp_url(), "http://localhost:8080/index.html");
        assert!(config.webhook_url().is_none());
    }

    #[test]
    fn webhook_url_embeds_token() {
        let config = Config {
            bot_token: SecretString::from("123:ABC"),
            admin_chat_id: None,
            base_url: Some("https://promo.example.com".to_string()),
            port: 3000,
            db_path: None,
            webapp_dir: PathBuf::from("webapp"),
            forward_unsolicited: true,
        };
        assert_eq!(
            config.webhook_url().as_deref(),
            Some("https://promo.example.com/bot/123:ABC")
        );
    }
}
