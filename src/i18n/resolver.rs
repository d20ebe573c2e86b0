//! Runtime lookup of a (key, language) pair into a ready-to-send string.
//!
//! Lookup degrades to the master file whenever the requested language cannot
//! answer: unknown language, missing key, empty value list, or a value that
//! does not accept the given arguments. Only when the master fails too is an
//! error returned.

use crate::i18n::corpus::Corpus;
use crate::i18n::document::{LanguageDocument, StringEntry};
use crate::i18n::placeholder::{self, FormatError};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Resolution failures. All of them mean the master could not answer either.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No string with key {key} could be found (in both language {language} and the master file).")]
    NoStringKey { key: String, language: String },

    #[error("The string with the key {key} has no values (in both language {language} and the master file).")]
    NoValues { key: String, language: String },

    #[error(
        "The string with the key {key} couldn't be formatted with arguments: {} (in both language {language} and the master file).",
        display_arguments(.arguments)
    )]
    FormatMismatch {
        key: String,
        language: String,
        arguments: Vec<String>,
    },
}

fn display_arguments(arguments: &[String]) -> String {
    if arguments.is_empty() {
        "None".to_string()
    } else {
        arguments.join(", ")
    }
}

/// Source of randomness for picking one of several value variants.
pub trait VariantPicker: Send + Sync {
    /// Pick an index in `0..count`. `count` is never 0.
    fn pick(&self, count: usize) -> usize;
}

/// Uniform, unseeded selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl VariantPicker for RandomPicker {
    fn pick(&self, count: usize) -> usize {
        rand::thread_rng().gen_range(0..count)
    }
}

/// Where a resolved string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// The requested language answered
    Requested,
    /// The language is not in the corpus, so the master answered
    UnknownLanguage,
    /// The requested language lacks the key (or its values), so the master answered
    KeyFallback,
    /// The value did not accept the arguments; the master's first value was used
    FormatFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub from: ResolvedFrom,
}

/// Resolve `key` in `language`, substituting `arguments` into the chosen value.
pub fn resolve(
    corpus: &Corpus,
    picker: &dyn VariantPicker,
    key: &str,
    language: &str,
    arguments: &[String],
) -> Result<Resolution, ResolveError> {
    let master = corpus.master();
    let (document, mut from) = match corpus.get(language) {
        Some(document) => (document, ResolvedFrom::Requested),
        None => (master, ResolvedFrom::UnknownLanguage),
    };

    let entry = match usable(document, key) {
        Ok(entry) => entry,
        Err(_) => {
            let found_in_document = document.entry(key).is_some();
            if from == ResolvedFrom::Requested {
                from = ResolvedFrom::KeyFallback;
            }
            match usable(master, key) {
                Ok(entry) => entry,
                Err(Lookup::Missing) if !found_in_document => {
                    return Err(ResolveError::NoStringKey {
                        key: key.to_string(),
                        language: language.to_string(),
                    })
                }
                Err(_) => {
                    return Err(ResolveError::NoValues {
                        key: key.to_string(),
                        language: language.to_string(),
                    })
                }
            }
        }
    };

    let chosen = &entry.values[picker.pick(entry.values.len()).min(entry.values.len() - 1)];
    match format_value(chosen, arguments) {
        Ok(text) => return Ok(Resolution { text, from }),
        Err(e) => debug!(
            "String {} in {} rejected arguments ({}), retrying with master",
            key, language, e
        ),
    }

    // Second chance: the master's canonical value, no random draw
    let canonical = match usable(master, key) {
        Ok(entry) => &entry.values[0],
        Err(Lookup::Missing) => {
            return Err(ResolveError::NoStringKey {
                key: key.to_string(),
                language: language.to_string(),
            })
        }
        Err(Lookup::Empty) => {
            return Err(ResolveError::NoValues {
                key: key.to_string(),
                language: language.to_string(),
            })
        }
    };

    format_value(canonical, arguments)
        .map(|text| Resolution {
            text,
            from: ResolvedFrom::FormatFallback,
        })
        .map_err(|_| ResolveError::FormatMismatch {
            key: key.to_string(),
            language: language.to_string(),
            arguments: arguments.to_vec(),
        })
}

enum Lookup {
    Missing,
    Empty,
}

fn usable<'a>(document: &'a LanguageDocument, key: &str) -> Result<&'a StringEntry, Lookup> {
    match document.entry(key) {
        None => Err(Lookup::Missing),
        Some(entry) if entry.values.is_empty() => Err(Lookup::Empty),
        Some(entry) => Ok(entry),
    }
}

fn format_value(value: &str, arguments: &[String]) -> Result<String, FormatError> {
    placeholder::substitute(&placeholder::unescape_newlines(value), arguments)
}
