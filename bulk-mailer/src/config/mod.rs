//! Configuration management for bulk-mailer
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `BULK_MAILER_` prefix, `__` for nesting)
//! 2. An explicit file passed with `--config`
//! 3. `./bulk-mailer.toml` (working directory)
//! 4. `~/.config/bulk-mailer/config.toml` (user config, XDG)
//! 5. `/etc/bulk-mailer/config.toml` (system config)
//! 6. Hardcoded defaults (fallback)
//!
//! Environment variable format: `BULK_MAILER_SECTION__FIELD_NAME`, for
//! example `BULK_MAILER_SMTP__HOST=smtp.office365.com`.
//!
//! # Example Configuration
//!
//! ```toml
//! [smtp]
//! host = "smtp.gmail.com"
//! port = 587
//! tls = "starttls"
//! timeout_secs = 30
//!
//! [sending]
//! delay_secs = 2
//! html_alternative = true
//!
//! [attachments]
//! max_files = 5
//! max_file_bytes = 26214400
//! max_total_bytes = 26214400
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::email::AttachmentLimits;
use crate::error::MailerError;

/// Application name used for config directories
pub const APP_NAME: &str = "bulk-mailer";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "BULK_MAILER_";

/// Transport security used when talking to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS; fail if the relay refuses (recommended)
    #[default]
    Starttls,
    /// Upgrade with STARTTLS when the relay offers it, continue in clear text otherwise
    Opportunistic,
    /// TLS from the first byte (usually port 465)
    Wrapper,
    /// No encryption at all; only for local test relays
    None,
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    /// Relay hostname
    pub host: String,

    /// Relay port (587 for submission with STARTTLS)
    pub port: u16,

    /// Transport security
    pub tls: TlsMode,

    /// Per-command timeout in seconds
    pub timeout_secs: u64,

    /// Address used in `From`; defaults to the login username
    pub from_address: Option<String>,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            tls: TlsMode::Starttls,
            timeout_secs: 30,
            from_address: None,
        }
    }
}

/// Send loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendingSettings {
    /// Pause between two consecutive messages, in seconds
    pub delay_secs: u64,

    /// Also attach the body as a `text/html` alternative
    pub html_alternative: bool,
}

impl Default for SendingSettings {
    fn default() -> Self {
        Self {
            delay_secs: 2,
            html_alternative: true,
        }
    }
}

/// Complete bulk-mailer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailerConfig {
    /// Relay settings
    #[serde(default)]
    pub smtp: SmtpSettings,

    /// Send loop settings
    #[serde(default)]
    pub sending: SendingSettings,

    /// Attachment ceilings
    #[serde(default)]
    pub attachments: AttachmentLimits,
}

impl MailerConfig {
    /// Load configuration from every layer, optionally including an explicit file
    ///
    /// # Errors
    ///
    /// Returns [`MailerError::FileNotFound`] if `explicit` does not exist and
    /// [`MailerError::Config`] if any layer fails to parse.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bulk_mailer::config::MailerConfig;
    ///
    /// # fn example() -> Result<(), bulk_mailer::MailerError> {
    /// let config = MailerConfig::load(None)?;
    /// assert_eq!(config.smtp.port, 587);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(explicit: Option<&Path>) -> Result<Self, MailerError> {
        let mut figment = Self::base()?;

        let system_config = PathBuf::from("/etc").join(APP_NAME).join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path();
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from(format!("./{APP_NAME}.toml"));
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(MailerError::FileNotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        Self::finish(figment)
    }

    /// Load defaults, one file and environment overrides, skipping the search path
    ///
    /// # Errors
    ///
    /// Returns [`MailerError::Config`] if the file or environment cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, MailerError> {
        let figment = Self::base()?.merge(Toml::file(path.as_ref()));
        Self::finish(figment)
    }

    /// Get the recommended XDG config path
    ///
    /// Returns `~/.config/bulk-mailer/config.toml` on Linux.
    #[must_use]
    pub fn recommended_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(format!("./{APP_NAME}.toml")),
            |config_dir| config_dir.join(APP_NAME).join("config.toml"),
        )
    }

    /// The inter-send pause as a [`std::time::Duration`]
    #[must_use]
    pub const fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sending.delay_secs)
    }

    fn base() -> Result<Figment, MailerError> {
        let defaults = toml::to_string(&Self::default())
            .map_err(|e| MailerError::config(format!("cannot serialise defaults: {e}")))?;
        Ok(Figment::new().merge(Toml::string(&defaults)))
    }

    fn finish(figment: Figment) -> Result<Self, MailerError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MailerError> {
        if self.smtp.host.trim().is_empty() {
            return Err(MailerError::config("smtp.host must not be empty"));
        }
        if self.smtp.port == 0 {
            return Err(MailerError::config("smtp.port must not be 0"));
        }
        if self.attachments.max_files == 0 {
            tracing::warn!("attachments.max_files is 0, attachments are disabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = MailerConfig::default();
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.tls, TlsMode::Starttls);
        assert_eq!(config.sending.delay_secs, 2);
        assert!(config.sending.html_alternative);
        assert_eq!(config.attachments.max_files, 5);
        assert_eq!(config.attachments.max_file_bytes, 25 * 1024 * 1024);
        assert_eq!(config.attachments.max_total_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn test_delay_duration() {
        let mut config = MailerConfig::default();
        config.sending.delay_secs = 7;
        assert_eq!(config.delay(), std::time::Duration::from_secs(7));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [smtp]
                host = "smtp.example.com"
                tls = "wrapper"
                port = 465

                [sending]
                delay_secs = 5
                "#,
            )?;

            let config = MailerConfig::load_from("custom.toml").expect("config loads");
            assert_eq!(config.smtp.host, "smtp.example.com");
            assert_eq!(config.smtp.port, 465);
            assert_eq!(config.smtp.tls, TlsMode::Wrapper);
            assert_eq!(config.sending.delay_secs, 5);
            // untouched sections keep their defaults
            assert!(config.sending.html_alternative);
            assert_eq!(config.attachments.max_files, 5);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("bulk-mailer.toml", "[smtp]\nhost = \"from-file.example.com\"\n")?;
            jail.set_env("BULK_MAILER_SMTP__HOST", "from-env.example.com");
            jail.set_env("BULK_MAILER_SENDING__DELAY_SECS", "0");

            let config = MailerConfig::load(None).expect("config loads");
            assert_eq!(config.smtp.host, "from-env.example.com");
            assert_eq!(config.sending.delay_secs, 0);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_not_found() {
        Jail::expect_with(|_jail| {
            let err = MailerConfig::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(err, MailerError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_port_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[smtp]\nport = 0\n")?;
            let err = MailerConfig::load_from("bad.toml").unwrap_err();
            assert!(matches!(err, MailerError::Config(_)));
            Ok(())
        });
    }
}
