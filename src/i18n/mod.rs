//! Language files for a multi-language Telegram bot.
//!
//! Every language is one XML template file in a directory. One of them, the
//! master, is the reference every other file is validated against and the
//! fallback for every lookup the requested language cannot answer.
//!
//! # Architecture
//!
//! - `document`: Template file model and parsing
//! - `placeholder`: `{0}`..`{9}` slots and argument substitution
//! - `corpus`: Immutable snapshot of every language file, plus the directory it came from
//! - `validator`: Structural and consistency checks producing a diagnostic report
//! - `resolver`: Key lookup with fallback to the master
//! - `promotion`: Staging, validating and promoting uploaded files
//! - `metrics`: Resolution counters
//! - `manager`: `TranslationManager`, the engine owning the live snapshot
//!
//! # Example
//!
//! ```rust,ignore
//! use bot_translations::i18n::TranslationManager;
//!
//! let manager = TranslationManager::new(&config)?;
//! let text = manager.resolve_string("welcome", "Deutsch", &[&user_name])?;
//!
//! let prepared = manager.prepare_upload(&bytes, "Deutsch.xml")?;
//! if prepared.can_promote {
//!     let outcome = manager.promote("Deutsch");
//! }
//! ```

mod corpus;
mod document;
mod manager;
mod metrics;
mod placeholder;
mod promotion;
mod resolver;
mod validator;

pub use corpus::{identifier_for_upload, is_plain_identifier, Corpus, CorpusError, TemplateDirectory};
pub use document::{
    DocumentError, LanguageDocument, LanguageIdentity, LanguageInfo, StringEntry,
    TEMPLATE_EXTENSION,
};
pub use manager::TranslationManager;
pub use metrics::{MetricsReport, ResolutionMetrics};
pub use placeholder::{arity, substitute, FormatError, SLOT_COUNT, WIDTH_LIMIT};
pub use promotion::{
    render_report, PrepareError, PreparedUpload, PreviousVersion, PromotionCoordinator,
    PromotionOutcome, PromotionStatus,
};
pub use resolver::{resolve, RandomPicker, Resolution, ResolveError, ResolvedFrom, VariantPicker};
pub use validator::{
    AdmissionPolicy, Diagnostic, Severity, Subject, TemplateValidator, ValidationReport,
    CALLBACK_DATA_LIMIT,
};
