//! Template validation module.
//!
//! This module checks a language file against the master template and against
//! the rest of the corpus:
//! - the language node is complete and fits the callback-data budget
//! - the file does not claim an identity already owned by another file
//! - every master key is present, with the same placeholders
//! - no value exceeds the master's length ceiling
//!
//! Validation never fails. Every finding becomes a [`Diagnostic`] in a
//! [`ValidationReport`].

use crate::i18n::corpus::Corpus;
use crate::i18n::document::{LanguageDocument, LanguageIdentity, LanguageInfo};
use crate::i18n::placeholder::{self, SLOT_COUNT};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Budget for callback data carrying a language identity.
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Classification of a validation finding.
///
/// These are independent classes, not a ranking. Only [`Severity::FatalError`]
/// blocks promotion under every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    DuplicatedString,
    MissingString,
    Error,
    FatalError,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Subject {
    /// The `language` node (base, variant, identity)
    LanguageNode,
    /// A string key
    Key(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::LanguageNode => f.write_str("Language Node"),
            Subject::Key(key) => f.write_str(key),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub subject: Subject,
    pub message: String,
    pub severity: Severity,

    /// The corpus member this file collides with, for identity collisions
    pub conflict: Option<LanguageInfo>,
}

impl Diagnostic {
    pub fn new(
        file: impl Into<String>,
        subject: Subject,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            file: file.into(),
            subject,
            message: message.into(),
            severity,
            conflict: None,
        }
    }
}

/// All findings for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub file: String,
    pub identity: LanguageIdentity,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    /// Create a new empty report for a document
    pub fn new(document: &LanguageDocument) -> Self {
        Self {
            file: document.file_name().to_string(),
            identity: document.identity().clone(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Diagnostics of one severity, in the order they were found
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.with_severity(severity).count()
    }

    pub fn has(&self, severity: Severity) -> bool {
        self.with_severity(severity).next().is_some()
    }

    /// Check if the report carries anything that blocks promotion unconditionally
    pub fn has_fatal(&self) -> bool {
        self.has(Severity::FatalError)
    }

    /// Check if the report is clean (no findings at all)
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Which reports allow a file to be promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AdmissionPolicy {
    /// Only fatal errors block promotion
    #[default]
    Permissive,
    /// Any finding blocks promotion
    Strict,
}

impl AdmissionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            AdmissionPolicy::Strict
        } else {
            AdmissionPolicy::Permissive
        }
    }

    pub fn admits(&self, report: &ValidationReport) -> bool {
        match self {
            AdmissionPolicy::Strict => report.is_clean(),
            AdmissionPolicy::Permissive => !report.has_fatal(),
        }
    }
}

impl FromStr for AdmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(AdmissionPolicy::Strict),
            "permissive" => Ok(AdmissionPolicy::Permissive),
            other => Err(format!("Unknown admission policy: '{}'", other)),
        }
    }
}

/// Validator for language templates.
pub struct TemplateValidator;

impl TemplateValidator {
    /// Run every check against a document, in order: language node, identity
    /// budget, duplicate keys, identity collisions, then the per-key scan.
    ///
    /// The corpus may contain the document itself; an identical file name
    /// and identity never counts as a collision.
    pub fn validate(document: &LanguageDocument, corpus: &Corpus) -> ValidationReport {
        let mut report = ValidationReport::new(document);

        Self::check_language_node(document, &mut report);
        Self::check_identity_length(document, &mut report);
        Self::check_duplicate_keys(document, &mut report);
        Self::check_identity(document, corpus.documents(), &mut report);
        Self::check_strings(document, corpus.master(), &mut report);

        report
    }

    /// Base and variant must both be present and non-blank.
    pub fn check_language_node(document: &LanguageDocument, report: &mut ValidationReport) {
        if is_blank(document.base()) {
            report.push(Diagnostic::new(
                document.file_name(),
                Subject::LanguageNode,
                "Base is missing",
                Severity::FatalError,
            ));
        }
        if is_blank(document.variant()) {
            report.push(Diagnostic::new(
                document.file_name(),
                Subject::LanguageNode,
                "Variant is missing",
                Severity::FatalError,
            ));
        }
    }

    /// Base and variant end up in inline keyboard callback data, next to a
    /// command and a chat id. The whole thing has to fit in 64 bytes.
    pub fn check_identity_length(document: &LanguageDocument, report: &mut ValidationReport) {
        let callback_data = format!(
            "testing|-1001234567890|{}|{}|t",
            document.identity().base_or_empty(),
            document.identity().variant_or_empty()
        );

        if callback_data.len() > CALLBACK_DATA_LIMIT {
            report.push(Diagnostic::new(
                document.file_name(),
                Subject::LanguageNode,
                "Base and variant are too long.",
                Severity::FatalError,
            ));
        }
    }

    /// Every key defined more than once.
    pub fn check_duplicate_keys(document: &LanguageDocument, report: &mut ValidationReport) {
        for (key, count) in document.duplicate_keys() {
            report.push(Diagnostic::new(
                document.file_name(),
                Subject::Key(key.to_string()),
                format!("Key defined {} times", count),
                Severity::DuplicatedString,
            ));
        }
    }

    /// Find the first corpus member whose file name or identity partially
    /// matches the candidate's: same file name with a different identity, or
    /// same identity under a different file name.
    pub fn find_identity_collision<'a>(
        file_name: &str,
        identity: &LanguageIdentity,
        others: impl IntoIterator<Item = &'a LanguageDocument>,
    ) -> Option<&'a LanguageDocument> {
        others.into_iter().find(|other| {
            let same_file = other.file_name() == file_name;
            let same_identity = other.identity() == identity;
            same_file != same_identity
        })
    }

    /// Report the first identity collision, if any.
    pub fn check_identity<'a>(
        document: &LanguageDocument,
        others: impl IntoIterator<Item = &'a LanguageDocument>,
        report: &mut ValidationReport,
    ) {
        let Some(conflict) =
            Self::find_identity_collision(document.file_name(), document.identity(), others)
        else {
            return;
        };

        report.push(Diagnostic {
            file: document.file_name().to_string(),
            subject: Subject::LanguageNode,
            message: "ERROR: The following file partially matches the same language node. \
                      Please check the file name, and the language base and variant. Aborting."
                .to_string(),
            severity: Severity::FatalError,
            conflict: Some(conflict.info()),
        });
    }

    /// Scan every master key: presence, placeholders and length.
    ///
    /// Keys the document has but the master doesn't are ignored.
    pub fn check_strings(
        document: &LanguageDocument,
        master: &LanguageDocument,
        report: &mut ValidationReport,
    ) {
        let mut seen = HashSet::new();

        for master_entry in master.entries() {
            if !seen.insert(master_entry.key.as_str()) {
                continue;
            }
            let key = &master_entry.key;

            let Some(entry) = document.entry(key).filter(|entry| !entry.values.is_empty())
            else {
                report.push(Diagnostic::new(
                    document.file_name(),
                    Subject::Key(key.clone()),
                    "Values missing",
                    Severity::MissingString,
                ));
                continue;
            };

            let vars = placeholder::arity(master_entry.canonical().unwrap_or_default());

            for value in &entry.values {
                for index in 0..SLOT_COUNT {
                    let present = placeholder::contains_slot(value, index);
                    let required = index < vars;

                    if required && !present {
                        report.push(Diagnostic::new(
                            document.file_name(),
                            Subject::Key(key.clone()),
                            format!("Missing {{{}}}", index),
                            Severity::Error,
                        ));
                    } else if present && !required {
                        report.push(Diagnostic::new(
                            document.file_name(),
                            Subject::Key(key.clone()),
                            format!("Extra {{{}}}", index),
                            Severity::Error,
                        ));
                    }
                }

                if master_entry.max_length != 0
                    && value.chars().count() > master_entry.max_length
                {
                    report.push(Diagnostic::new(
                        document.file_name(),
                        Subject::Key(key.clone()),
                        format!(
                            "String is longer than {} character(s)",
                            master_entry.max_length
                        ),
                        Severity::FatalError,
                    ));
                }
            }
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
