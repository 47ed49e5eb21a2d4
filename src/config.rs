//! Configuration loading and validation.
//!
//! Settings come from `config.yaml` in the working directory; secrets come
//! from the environment (a `.env` file is honored). Validation collects
//! every problem at once and fails startup with the full list - a bad
//! config is never discovered mid-run.

use std::path::Path;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::Restaurant;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static regex")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Minimum minutes between cycles.
    pub interval_min: u64,
    /// Maximum minutes between cycles.
    pub interval_max: u64,
    /// Upper bound in seconds for the extra jitter added to each interval.
    pub random_delay_max: u64,
    pub run_immediately: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_min: 5,
            interval_max: 10,
            random_delay_max: 120,
            run_immediately: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OmakaseSettings {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub gmail: GmailSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GmailSettings {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub receiver_email: String,
    /// Filled from the GMAIL_APP_PASSWORD environment variable, never YAML.
    #[serde(skip)]
    pub app_password: String,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            sender_email: String::new(),
            receiver_email: String::new(),
            app_password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub omakase: OmakaseSettings,
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    #[serde(default)]
    pub notification: NotificationSettings,
}

impl Config {
    /// Collect every validation problem. Empty means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.monitor.interval_min < 1 {
            errors.push("monitor.interval_min must be at least 1 minute".to_string());
        }
        if self.monitor.interval_max < self.monitor.interval_min {
            errors.push("monitor.interval_max must be >= interval_min".to_string());
        }

        if self.omakase.email.is_empty() {
            errors.push("omakase.email is required".to_string());
        } else if !EMAIL_REGEX.is_match(&self.omakase.email) {
            errors.push("omakase.email is not a valid email address".to_string());
        }
        if self.omakase.password.is_empty() {
            errors.push("omakase.password is required".to_string());
        }

        if self.restaurants.is_empty() {
            errors.push("At least one restaurant must be configured".to_string());
        } else if !self.restaurants.iter().any(|r| r.enabled) {
            errors.push("At least one restaurant must be enabled".to_string());
        }
        for (i, restaurant) in self.restaurants.iter().enumerate() {
            if restaurant.name.is_empty() {
                errors.push(format!("restaurants[{}].name is required", i));
            }
            if restaurant.slug.is_empty() {
                errors.push(format!("restaurants[{}].slug is required", i));
            }
            if restaurant.url.is_empty() {
                errors.push(format!("restaurants[{}].url is required", i));
            }
        }

        let gmail = &self.notification.gmail;
        if gmail.sender_email.is_empty() {
            errors.push("notification.gmail.sender_email is required".to_string());
        } else if !EMAIL_REGEX.is_match(&gmail.sender_email) {
            errors.push("notification.gmail.sender_email is not a valid email address".to_string());
        }
        if gmail.receiver_email.is_empty() {
            errors.push("notification.gmail.receiver_email is required".to_string());
        } else if !EMAIL_REGEX.is_match(&gmail.receiver_email) {
            errors
                .push("notification.gmail.receiver_email is not a valid email address".to_string());
        }
        if gmail.app_password.is_empty() {
            errors.push(
                "GMAIL_APP_PASSWORD environment variable is required. \
                 Please set it in your .env file."
                    .to_string(),
            );
        }

        errors
    }
}

/// Load and validate configuration from a YAML file plus the environment.
pub fn load_config(config_path: &str) -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let path = Path::new(config_path);
    if !path.exists() {
        return Err(ConfigError::NotFound(config_path.to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&content)?;

    config.notification.gmail.app_password =
        std::env::var("GMAIL_APP_PASSWORD").unwrap_or_default();

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Invalid(errors));
    }

    info!("Configuration loaded successfully from {}", config_path);
    Ok(config)
}
