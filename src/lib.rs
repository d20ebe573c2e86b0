//! Validation, resolution and promotion of a Telegram bot's language files.

pub mod config;
pub mod i18n;
pub mod markup;
pub mod retry;
pub mod telegram;
