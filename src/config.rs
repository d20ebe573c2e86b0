use crate::i18n::AdmissionPolicy;
use crate::markup::ParseMode;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_MASTER_FILE: &str = "English";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct Config {
    // Language files
    pub translations_dir: PathBuf,
    pub translations_temp_dir: PathBuf,
    pub master_file: String,

    // Reports
    pub parse_mode: ParseMode,
    pub strict_errors: bool,

    // Telegram (remote uploads only)
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            translations_dir: std::env::var("TRANSLATIONS_DIR")
                .context("TRANSLATIONS_DIR not set")?
                .into(),
            translations_temp_dir: std::env::var("TRANSLATIONS_TEMP_DIR")
                .context("TRANSLATIONS_TEMP_DIR not set")?
                .into(),
            master_file: std::env::var("MASTER_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MASTER_FILE.to_string()),

            parse_mode: match std::env::var("PARSE_MODE") {
                Ok(value) => value
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("PARSE_MODE must be one of plain, markdown or html")?,
                Err(_) => ParseMode::default(),
            },
            strict_errors: std::env::var("STRICT_ERRORS")
                .ok()
                .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
                .unwrap_or(false),

            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            telegram_api_url: std::env::var("TELEGRAM_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
        })
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy::from_strict_flag(self.strict_errors)
    }
}
