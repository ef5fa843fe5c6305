use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chatbot::catalog::{Catalog, Treatment, default_treatments};
use crate::chatbot::reminders::{DEFAULT_PROMO, DEFAULT_SALON_PHONE, ReminderTemplate, validate_cron};

pub const DEFAULT_CONFIG_PATH: &str = "estilista.json";
pub const DEFAULT_SANDBOX_NUMBER: &str = "whatsapp:+14155238886";
pub const DEFAULT_SCHEDULE: &str = "0 0 10 * * * *";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Unknown IANA timezone name.
    InvalidTimezone { name: String },
    /// Cron expression that does not parse.
    InvalidSchedule { expr: String, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidTimezone { name } => write!(f, "unknown timezone '{}'", name),
            Self::InvalidSchedule { expr, reason } => {
                write!(f, "invalid reminder_schedule '{}': {}", expr, reason)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidTimezone { .. } | Self::InvalidSchedule { .. } | Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
    twilio_account_sid: String,
    twilio_auth_token: String,
    twilio_whatsapp_number: String,
    /// Directory for the client file and logs.
    data_dir: String,
    clients_file: String,
    bind_addr: String,
    port: u16,
    timezone: String,
    /// 7-field cron expression (sec min hour dom month dow year).
    reminder_schedule: String,
    poll_interval_secs: u64,
    /// Run the reminder timer alongside the webhook in `serve`.
    run_background: bool,
    dry_run: bool,
    /// 0 = sessions never expire.
    session_ttl_hours: u64,
    salon_phone: String,
    promo: Option<String>,
    treatments: Vec<Treatment>,
    seed_examples: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_whatsapp_number: DEFAULT_SANDBOX_NUMBER.to_string(),
            data_dir: ".".to_string(),
            clients_file: "clientas.json".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            timezone: "America/Bogota".to_string(),
            reminder_schedule: DEFAULT_SCHEDULE.to_string(),
            poll_interval_secs: 60,
            run_background: true,
            dry_run: false,
            session_ttl_hours: 24,
            salon_phone: DEFAULT_SALON_PHONE.to_string(),
            promo: Some(DEFAULT_PROMO.to_string()),
            treatments: default_treatments(),
            seed_examples: false,
        }
    }
}

pub struct Config {
    /// Path the config was loaded from (may not exist).
    pub config_path: PathBuf,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_number: String,
    pub data_dir: PathBuf,
    /// Full path of the client collection file.
    pub clients_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub timezone: Tz,
    pub reminder_schedule: String,
    pub poll_interval: Duration,
    pub run_background: bool,
    /// True when explicitly requested or when credentials are missing.
    pub dry_run: bool,
    pub session_ttl: Option<Duration>,
    pub salon_phone: String,
    pub promo: Option<String>,
    pub treatments: Vec<Treatment>,
    pub seed_examples: bool,
}

impl Config {
    /// Load from `path` and apply environment overrides. A missing file
    /// means all defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let mut file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
            serde_json::from_str::<ConfigFile>(&content)
                .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?
        } else {
            ConfigFile::default()
        };

        apply_env(&mut file, env)?;
        Self::from_file(config_path, file)
    }

    fn from_file(config_path: PathBuf, file: ConfigFile) -> Result<Self, ConfigError> {
        let timezone: Tz = file
            .timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone { name: file.timezone.clone() })?;

        validate_cron(&file.reminder_schedule).map_err(|reason| ConfigError::InvalidSchedule {
            expr: file.reminder_schedule.clone(),
            reason,
        })?;

        if file.poll_interval_secs == 0 {
            return Err(ConfigError::Validation("poll_interval_secs must be greater than 0".into()));
        }
        validate_treatments(&file.treatments)?;

        let data_dir = PathBuf::from(&file.data_dir);
        let clients_path = data_dir.join(&file.clients_file);

        let has_credentials = !file.twilio_account_sid.is_empty() && !file.twilio_auth_token.is_empty();

        Ok(Self {
            config_path,
            twilio_account_sid: file.twilio_account_sid,
            twilio_auth_token: file.twilio_auth_token,
            twilio_whatsapp_number: file.twilio_whatsapp_number,
            data_dir,
            clients_path,
            bind_addr: file.bind_addr,
            port: file.port,
            timezone,
            reminder_schedule: file.reminder_schedule,
            poll_interval: Duration::from_secs(file.poll_interval_secs),
            run_background: file.run_background,
            dry_run: file.dry_run || !has_credentials,
            session_ttl: (file.session_ttl_hours > 0)
                .then(|| Duration::from_secs(file.session_ttl_hours * 3600)),
            salon_phone: file.salon_phone,
            promo: file.promo.filter(|p| !p.trim().is_empty()),
            treatments: file.treatments,
            seed_examples: file.seed_examples,
        })
    }

    /// Both Twilio credentials are set.
    pub fn has_credentials(&self) -> bool {
        !self.twilio_account_sid.is_empty() && !self.twilio_auth_token.is_empty()
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.treatments.clone())
    }

    pub fn template(&self) -> ReminderTemplate {
        ReminderTemplate { salon_phone: self.salon_phone.clone(), promo: self.promo.clone() }
    }
}

fn apply_env<F>(file: &mut ConfigFile, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(sid) = env("TWILIO_ACCOUNT_SID") {
        file.twilio_account_sid = sid;
    }
    if let Some(token) = env("TWILIO_AUTH_TOKEN") {
        file.twilio_auth_token = token;
    }
    if let Some(number) = env("TWILIO_WHATSAPP_NUMBER") {
        file.twilio_whatsapp_number = number;
    }
    if let Some(port) = env("PORT") {
        file.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Validation(format!("PORT must be a port number, got '{port}'")))?;
    }
    if let Some(flag) = env("RUN_BACKGROUND_LOGIC") {
        file.run_background = flag.trim() == "1";
    }
    Ok(())
}

fn validate_treatments(treatments: &[Treatment]) -> Result<(), ConfigError> {
    if treatments.is_empty() {
        return Err(ConfigError::Validation("treatments must contain at least one entry".into()));
    }
    let mut keys = HashSet::new();
    for t in treatments {
        if t.key.trim().is_empty() {
            return Err(ConfigError::Validation("treatment key cannot be empty".into()));
        }
        if !keys.insert(t.key.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate treatment key '{}'", t.key)));
        }
        if t.duration_months == 0 {
            return Err(ConfigError::Validation(format!(
                "treatment '{}' must have a positive duration_months",
                t.key
            )));
        }
    }
    Ok(())
}
