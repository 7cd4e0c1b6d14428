use crate::error::{Error, Result};
use config::Config;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub portal_url: String,
    pub site_version: String,
    pub access_token: String,
    pub session_token: String,
    pub logged_user: i64,
    pub client_id: i64,
    pub x_cart: String,
    pub users: Vec<i64>,
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://peapi.servimed.com.br".to_string(),
            portal_url: "https://pedidoeletronico.servimed.com.br".to_string(),
            site_version: "4.0.27".to_string(),
            access_token: String::new(),
            session_token: String::new(),
            logged_user: 0,
            client_id: 0,
            x_cart: String::new(),
            users: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::MissingSetting("portal.access_token"));
        }
        if self.session_token.is_empty() {
            return Err(Error::MissingSetting("portal.session_token"));
        }
        if self.logged_user <= 0 {
            return Err(Error::MissingSetting("portal.logged_user"));
        }
        if self.client_id <= 0 {
            return Err(Error::MissingSetting("portal.client_id"));
        }
        if self.x_cart.is_empty() {
            return Err(Error::MissingSetting("portal.x_cart"));
        }
        Ok(())
    }

    // The search payload carries a user list; a single-account setup only
    // configures logged_user.
    pub fn payload_users(&self) -> Vec<i64> {
        if self.users.is_empty() {
            vec![self.logged_user]
        } else {
            self.users.clone()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CallbackConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://desafio.cotefacil.net".to_string(),
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: 60,
        }
    }
}

impl CallbackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::MissingSetting("callback.username"));
        }
        if self.password.is_empty() {
            return Err(Error::MissingSetting("callback.password"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScrapeConfig {
    pub page_delay_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self { page_delay_secs: 2 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_secs: 30,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self> {
        let builder = Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            portal = %settings.portal.base_url,
            callback = %settings.callback.base_url,
            output_dir = %settings.storage.output_dir.display(),
            "Loaded configuration"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_portal() -> PortalConfig {
        PortalConfig {
            access_token: "at".to_string(),
            session_token: "st".to_string(),
            logged_user: 267511,
            client_id: 267511,
            x_cart: "cart".to_string(),
            ..PortalConfig::default()
        }
    }

    #[test]
    fn portal_validation_requires_access_token() {
        let cfg = PortalConfig {
            access_token: String::new(),
            ..complete_portal()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::MissingSetting("portal.access_token"))
        ));
    }

    #[test]
    fn portal_validation_requires_session_token() {
        let cfg = PortalConfig {
            session_token: String::new(),
            ..complete_portal()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::MissingSetting("portal.session_token"))
        ));
    }

    #[test]
    fn portal_validation_requires_identifiers() {
        let cfg = PortalConfig {
            logged_user: 0,
            ..complete_portal()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::MissingSetting("portal.logged_user"))
        ));

        let cfg = PortalConfig {
            client_id: 0,
            ..complete_portal()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::MissingSetting("portal.client_id"))
        ));
    }

    #[test]
    fn complete_portal_config_passes() {
        assert!(complete_portal().validate().is_ok());
    }

    #[test]
    fn payload_users_falls_back_to_logged_user() {
        let cfg = complete_portal();
        assert_eq!(cfg.payload_users(), vec![267511]);

        let cfg = PortalConfig {
            users: vec![1, 2],
            ..complete_portal()
        };
        assert_eq!(cfg.payload_users(), vec![1, 2]);
    }

    #[test]
    fn callback_validation_requires_credentials() {
        let cfg = CallbackConfig::default();
        assert!(matches!(
            cfg.validate(),
            Err(Error::MissingSetting("callback.username"))
        ));

        let cfg = CallbackConfig {
            username: "user".to_string(),
            ..CallbackConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::MissingSetting("callback.password"))
        ));
    }

    #[test]
    fn defaults_match_portal_contract() {
        let cfg = ScrapeConfig::default();
        assert_eq!(cfg.page_delay_secs, 2);

        let cfg = QueueConfig::default();
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.retry_delay_secs, 30);

        let cfg = PortalConfig::default();
        assert_eq!(cfg.timeout_secs, 30);
    }
}
