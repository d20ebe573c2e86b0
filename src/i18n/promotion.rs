//! Promotion: admitting an uploaded language file into the live corpus.
//!
//! Promotion is two-phase. [`PromotionCoordinator::stage`] and
//! [`PromotionCoordinator::assess`] store the upload in a staging directory
//! and validate it against a fresh corpus. After an operator has read the
//! report, [`PromotionCoordinator::promote`] re-checks identity uniqueness
//! against the live directory and copies the staged file over.

use crate::i18n::corpus::{
    identifier_for_upload, is_plain_identifier, Corpus, CorpusError, TemplateDirectory,
};
use crate::i18n::document::{DocumentError, LanguageDocument, LanguageIdentity, LanguageInfo};
use crate::i18n::validator::{AdmissionPolicy, Severity, Subject, TemplateValidator, ValidationReport};
use crate::markup::ParseMode;
use crate::telegram::FetchError;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

/// Failures that stop `prepare` before any diagnostics are produced.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("'{name}' is not a usable language file name")]
    InvalidFileName { name: String },

    #[error("Failed to stage uploaded file: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// The stored version of a file that an upload would replace.
#[derive(Debug, Clone)]
pub struct PreviousVersion {
    pub info: LanguageInfo,
    pub last_modified: DateTime<Utc>,
    pub report: ValidationReport,
}

/// Validation result for a staged upload.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub report: ValidationReport,

    /// The corpus member with the same file name, if this is an update
    pub previous: Option<PreviousVersion>,

    /// No corpus member shares the upload's base
    pub new_base: bool,

    pub can_promote: bool,
}

impl PreparedUpload {
    pub fn file_name(&self) -> &str {
        &self.report.file
    }

    /// Operator-facing report text.
    pub fn render(&self, mode: ParseMode) -> String {
        let report = &self.report;
        let mut out = String::from("NEW FILE\n");
        out.push_str(&mode.bold(&format!("{}.xml - ({})", report.file, report.identity)));
        out.push('\n');
        render_findings(report, mode, &mut out);

        out.push_str("\n\n");
        match &self.previous {
            Some(previous) => {
                out.push_str(&mode.bold("OLD FILE"));
                out.push_str(&mode.escape(&format!(
                    " (Last updated: {})\n{}.xml - ({} {})\nErrors: {}\nMissing strings: {}",
                    previous.last_modified.format("%b %d"),
                    previous.info.file_name,
                    previous.info.base.as_deref().unwrap_or(""),
                    previous.info.variant.as_deref().unwrap_or(""),
                    previous.report.count(Severity::Error),
                    previous.report.count(Severity::MissingString),
                )));
            }
            None => {
                out.push_str(&mode.bold("No old file, this is a new language"));
                out.push_str(&mode.escape(
                    "\nPlease double check the filename, and the language base and variant, \
                     as you won't be able to change them.",
                ));
                out.push('\n');
                out.push_str(&mode.italic("Base:"));
                out.push(' ');
                out.push_str(&mode.escape(report.identity.base_or_empty()));
                if self.new_base {
                    out.push(' ');
                    out.push_str(&mode.bold("(NEW)"));
                }
                out.push('\n');
                out.push_str(&mode.italic("Variant:"));
                out.push(' ');
                out.push_str(&mode.escape(report.identity.variant_or_empty()));
            }
        }

        if !self.can_promote {
            out.push_str("\n\n");
            if report.has_fatal() {
                out.push_str(&mode.bold("Fatal errors present, can't upload!"));
            } else {
                out.push_str(&mode.bold("Errors present, can't upload!"));
            }
        }

        out
    }
}

/// Operator-facing text for a standalone validation of one file.
pub fn render_report(report: &ValidationReport, mode: ParseMode) -> String {
    let mut out = mode.bold(&format!("{}.xml - ({})", report.file, report.identity));
    out.push('\n');
    render_findings(report, mode, &mut out);

    out.push('\n');
    out.push_str(&mode.italic("Base:"));
    out.push(' ');
    out.push_str(&mode.escape(report.identity.base_or_empty()));
    out.push('\n');
    out.push_str(&mode.italic("Variant:"));
    out.push(' ');
    out.push_str(&mode.escape(report.identity.variant_or_empty()));

    out
}

fn render_subject(subject: &Subject, mode: ParseMode) -> String {
    match subject {
        Subject::LanguageNode => mode.bold(&subject.to_string()),
        Subject::Key(key) => mode.escape(key),
    }
}

fn render_findings(report: &ValidationReport, mode: ParseMode, out: &mut String) {
    if report.has(Severity::Error) {
        out.push_str(&mode.italic("Errors:"));
        out.push('\n');
        for diagnostic in report.with_severity(Severity::Error) {
            out.push_str(&render_subject(&diagnostic.subject, mode));
            out.push('\n');
            out.push_str(&mode.escape(&diagnostic.message));
            out.push_str("\n\n");
        }
    }

    if report.has(Severity::MissingString) {
        out.push_str(&mode.italic("Missing Values:"));
        out.push('\n');
        for diagnostic in report.with_severity(Severity::MissingString) {
            out.push_str(&render_subject(&diagnostic.subject, mode));
            out.push('\n');
        }
    }

    if report.has(Severity::DuplicatedString) {
        out.push_str(&mode.italic("Duplicated Strings:"));
        out.push('\n');
        for diagnostic in report.with_severity(Severity::DuplicatedString) {
            out.push_str(&render_subject(&diagnostic.subject, mode));
            out.push('\n');
            out.push_str(&mode.escape(&diagnostic.message));
            out.push('\n');
        }
    }

    if report.has_fatal() {
        out.push('\n');
        out.push_str(&mode.bold("Fatal errors:"));
        out.push('\n');
        for diagnostic in report.with_severity(Severity::FatalError) {
            out.push_str(&render_subject(&diagnostic.subject, mode));
            out.push('\n');
            out.push_str(&mode.escape(&diagnostic.message));
            if let Some(conflict) = &diagnostic.conflict {
                out.push_str("\n\n");
                out.push_str(&mode.bold(&format!("{}.xml", conflict.file_name)));
                out.push('\n');
                out.push_str(&mode.italic("Base:"));
                out.push(' ');
                out.push_str(&mode.escape(conflict.base.as_deref().unwrap_or("")));
                out.push('\n');
                out.push_str(&mode.italic("Variant:"));
                out.push(' ');
                out.push_str(&mode.escape(conflict.variant.as_deref().unwrap_or("")));
            }
            out.push_str("\n\n");
        }
    }

    if report.is_clean() {
        out.push_str(&mode.italic("No errors"));
        out.push('\n');
    }
}

/// How a promotion ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionStatus {
    /// The file is live and the corpus was reloaded
    Completed,
    /// Another file already owns the upload's base and variant
    Aborted { conflicting_file: String },
    /// Something failed part way; `steps` shows how far it got
    Failed { reason: String },
}

/// Progress log plus terminal status of a promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionOutcome {
    pub steps: Vec<String>,
    pub status: PromotionStatus,
}

impl PromotionOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == PromotionStatus::Completed
    }

    pub fn render(&self, mode: ParseMode) -> String {
        let mut out: String = self
            .steps
            .iter()
            .map(|step| format!("{}\n", mode.escape(step)))
            .collect();

        match &self.status {
            PromotionStatus::Completed => {
                out.push('\n');
                out.push_str(&mode.bold("Operation complete."));
            }
            PromotionStatus::Aborted { conflicting_file } => {
                out.push_str(&mode.escape(&format!(
                    "Found duplicate language (matching base and variant) with filename {}\n",
                    conflicting_file
                )));
                out.push_str(&mode.bold("Aborting!"));
            }
            PromotionStatus::Failed { reason } => {
                out.push_str(&mode.escape(&format!("Failed: {}", reason)));
            }
        }

        out
    }
}

/// Stages, assesses and promotes uploaded language files.
#[derive(Debug, Clone)]
pub struct PromotionCoordinator {
    live: TemplateDirectory,
    staging: TemplateDirectory,
    policy: AdmissionPolicy,
}

impl PromotionCoordinator {
    pub fn new(live: TemplateDirectory, staging: TemplateDirectory, policy: AdmissionPolicy) -> Self {
        Self {
            live,
            staging,
            policy,
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn staging(&self) -> &TemplateDirectory {
        &self.staging
    }

    /// Store an upload in the staging directory and parse it.
    pub fn stage(&self, bytes: &[u8], file_name: &str) -> Result<LanguageDocument, PrepareError> {
        let identifier = identifier_for_upload(file_name).ok_or_else(|| {
            PrepareError::InvalidFileName {
                name: file_name.to_string(),
            }
        })?;

        let path = self
            .staging
            .write(&identifier, bytes)
            .map_err(PrepareError::Staging)?;
        info!("Staged upload {} at {}", file_name, path.display());

        Ok(LanguageDocument::load(&path)?)
    }

    /// Parse an already staged file (e.g. one written by a fetcher).
    pub fn load_staged(&self, file_name: &str) -> Result<LanguageDocument, PrepareError> {
        let identifier = identifier_for_upload(file_name).ok_or_else(|| {
            PrepareError::InvalidFileName {
                name: file_name.to_string(),
            }
        })?;
        Ok(LanguageDocument::load(&self.staging.path_for(&identifier))?)
    }

    /// Validate a staged candidate against the current corpus.
    pub fn assess(&self, candidate: &LanguageDocument, corpus: &Corpus) -> PreparedUpload {
        let report = TemplateValidator::validate(candidate, corpus);

        let previous = corpus.get(candidate.file_name()).map(|current| {
            let mut current_report = ValidationReport::new(current);
            TemplateValidator::check_identity_length(current, &mut current_report);
            TemplateValidator::check_strings(current, corpus.master(), &mut current_report);
            PreviousVersion {
                info: current.info(),
                last_modified: current.last_modified(),
                report: current_report,
            }
        });

        let can_promote = self.policy.admits(&report);
        info!(
            "Assessed upload {}: {} finding(s), can promote: {}",
            candidate.file_name(),
            report.diagnostics.len(),
            can_promote
        );

        PreparedUpload {
            new_base: !corpus.has_base(candidate.base()),
            previous,
            can_promote,
            report,
        }
    }

    /// Copy a staged file into the live directory.
    ///
    /// Uniqueness is re-derived from a fresh scan of the live directory rather
    /// than trusted from `assess`. `reload` runs after the copy.
    pub fn promote<F>(&self, file_name: &str, reload: F) -> PromotionOutcome
    where
        F: FnOnce() -> Result<(), CorpusError>,
    {
        let mut steps = vec!["Moving file to language directory...".to_string()];
        let failed = |steps: Vec<String>, reason: String| {
            warn!("Promotion of {} failed: {}", file_name, reason);
            PromotionOutcome {
                steps,
                status: PromotionStatus::Failed { reason },
            }
        };

        steps.push("Checking paths for duplicate language file...".to_string());
        if !is_plain_identifier(file_name) {
            return failed(steps, format!("'{}' is not a usable file name", file_name));
        }

        let staged_path = self.staging.path_for(file_name);
        let staged = match LanguageDocument::load(&staged_path) {
            Ok(document) => document,
            Err(e) => return failed(steps, e.to_string()),
        };
        let identity: LanguageIdentity = staged.identity().clone();
        if identity.base.is_none() || identity.variant.is_none() {
            return failed(steps, "the staged file has no base or variant".to_string());
        }

        let live_documents = match self.live.load_documents() {
            Ok(documents) => documents,
            Err(e) => return failed(steps, e.to_string()),
        };

        let is_update = live_documents
            .iter()
            .any(|document| document.file_name() == file_name);
        if !is_update {
            if let Some(conflict) =
                TemplateValidator::find_identity_collision(file_name, &identity, &live_documents)
            {
                warn!(
                    "Promotion of {} aborted: {} already owns {}",
                    file_name,
                    conflict.file_name(),
                    identity
                );
                return PromotionOutcome {
                    steps,
                    status: PromotionStatus::Aborted {
                        conflicting_file: conflict.file_name().to_string(),
                    },
                };
            }
        }

        if let Err(e) = self.live.copy_in(&staged_path, file_name) {
            return failed(steps, e.to_string());
        }
        steps.push("File copied to bot.".to_string());

        if let Err(e) = reload() {
            return failed(steps, e.to_string());
        }
        steps.push("Language files refreshed.".to_string());

        info!("Promoted {} ({})", file_name, identity);
        PromotionOutcome {
            steps,
            status: PromotionStatus::Completed,
        }
    }
}
