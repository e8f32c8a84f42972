use std::{env, net::SocketAddr};

use axum::http::HeaderValue;
use chrono::Locale;
use lettre::{message::Mailbox, Address};
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    /// Base of the confirmation links embedded in outgoing mail.
    pub api_base_url: BaseUrl,
    /// Base of the pages the confirmation routes redirect to.
    pub web_base_url: BaseUrl,
    pub cors_origin: HeaderValue,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: Mailbox,
    pub locale: Locale,
    pub smtp_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = var("DATABASE_URL", "sqlite://planner.db");
        let listen_addr: SocketAddr = var("APP_LISTEN_ADDR", "127.0.0.1:3333")
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let api_base_url = BaseUrl::parse("API_BASE_URL", &var("API_BASE_URL", DEFAULT_BASE))?;
        let web_base_url = BaseUrl::parse("WEB_BASE_URL", &var("WEB_BASE_URL", DEFAULT_BASE))?;

        let cors_origin = var("CORS_ORIGIN", DEFAULT_BASE);
        Url::parse(&cors_origin)
            .map_err(|err| AppError::Config(format!("invalid CORS_ORIGIN: {err}")))?;
        let cors_origin = HeaderValue::from_str(cors_origin.trim_end_matches('/'))
            .map_err(|err| AppError::Config(format!("invalid CORS_ORIGIN: {err}")))?;

        let from_name = var("MAIL_FROM_NAME", "Equipe plann.er");
        let from_address = var("MAIL_FROM_ADDRESS", "oi@plann.er")
            .parse::<Address>()
            .map_err(|err| AppError::Config(format!("invalid MAIL_FROM_ADDRESS: {err}")))?;
        let locale_name = var("MAIL_LOCALE", "pt_BR");
        let locale = Locale::try_from(locale_name.as_str())
            .map_err(|_| AppError::Config(format!("unknown MAIL_LOCALE: {locale_name}")))?;
        let smtp_url = lookup("SMTP_URL").filter(|value| !value.trim().is_empty());

        Ok(Self {
            database_url,
            listen_addr,
            api_base_url,
            web_base_url,
            cors_origin,
            mail: MailConfig {
                sender: Mailbox::new(Some(from_name), from_address),
                locale,
                smtp_url,
            },
        })
    }
}

const DEFAULT_BASE: &str = "http://localhost:3333";

/// An absolute http(s) URL that relative paths get appended to.
#[derive(Debug, Clone)]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn parse(name: &str, raw: &str) -> Result<Self, AppError> {
        let url =
            Url::parse(raw).map_err(|err| AppError::Config(format!("invalid {name}: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "invalid {name}: expected an http(s) URL, got {raw}"
            )));
        }
        Ok(Self(url))
    }

    pub fn join_path(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_local_development() {
        let config = config_from(&[]).expect("defaults are valid");
        assert_eq!(config.listen_addr.port(), 3333);
        assert_eq!(
            config.api_base_url.join_path("trips/1/confirm"),
            "http://localhost:3333/trips/1/confirm"
        );
        assert_eq!(config.cors_origin, "http://localhost:3333");
        assert_eq!(config.mail.sender.email.to_string(), "oi@plann.er");
        assert!(matches!(config.mail.locale, Locale::pt_BR));
        assert!(config.mail.smtp_url.is_none());
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let config = config_from(&[("WEB_BASE_URL", "https://plann.er/app/")]).expect("valid");
        assert_eq!(
            config.web_base_url.join_path("/trips"),
            "https://plann.er/app/trips"
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            config_from(&[("APP_LISTEN_ADDR", "nowhere")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("API_BASE_URL", "ftp://files.example.com")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("MAIL_FROM_ADDRESS", "not-an-address")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("MAIL_LOCALE", "xx_YY")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn blank_smtp_url_falls_back_to_log_mailer() {
        let config = config_from(&[("SMTP_URL", "  ")]).expect("valid");
        assert!(config.mail.smtp_url.is_none());
    }
}
