//! The translation engine a bot process owns.
//!
//! `TranslationManager` holds the current corpus snapshot behind an
//! `RwLock<Arc<_>>`. Readers clone the `Arc` and never see a half-built
//! corpus; `reload` builds a new snapshot and swaps the pointer.

use crate::config::Config;
use crate::i18n::corpus::{identifier_for_upload, Corpus, CorpusError, TemplateDirectory};
use crate::i18n::document::{LanguageDocument, LanguageInfo};
use crate::i18n::metrics::{MetricsReport, ResolutionMetrics};
use crate::i18n::promotion::{
    render_report, PrepareError, PreparedUpload, PromotionCoordinator, PromotionOutcome,
};
use crate::i18n::resolver::{self, RandomPicker, ResolveError, ResolvedFrom, VariantPicker};
use crate::i18n::validator::{AdmissionPolicy, TemplateValidator, ValidationReport};
use crate::markup::ParseMode;
use crate::telegram::FileFetcher;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

pub struct TranslationManager {
    live: TemplateDirectory,
    coordinator: PromotionCoordinator,
    master_name: String,
    parse_mode: ParseMode,
    picker: Box<dyn VariantPicker>,
    corpus: RwLock<Arc<Corpus>>,
    metrics: ResolutionMetrics,
}

impl TranslationManager {
    /// Load the corpus described by `config`. Creates the staging directory
    /// if it does not exist yet.
    pub fn new(config: &Config) -> Result<Self, CorpusError> {
        Self::open(
            &config.translations_dir,
            &config.translations_temp_dir,
            &config.master_file,
            config.parse_mode,
            config.admission_policy(),
        )
    }

    pub fn open(
        translations_dir: &Path,
        staging_dir: &Path,
        master_name: &str,
        parse_mode: ParseMode,
        policy: AdmissionPolicy,
    ) -> Result<Self, CorpusError> {
        std::fs::create_dir_all(staging_dir).map_err(|source| CorpusError::Io {
            path: staging_dir.display().to_string(),
            source,
        })?;

        let live = TemplateDirectory::new(translations_dir);
        let corpus = Corpus::load(&live, master_name)?;
        info!(
            "Loaded {} language file(s) from {} (master: {})",
            corpus.len(),
            translations_dir.display(),
            master_name
        );

        Ok(Self {
            coordinator: PromotionCoordinator::new(
                live.clone(),
                TemplateDirectory::new(staging_dir),
                policy,
            ),
            live,
            master_name: master_name.to_string(),
            parse_mode,
            picker: Box::new(RandomPicker),
            corpus: RwLock::new(Arc::new(corpus)),
            metrics: ResolutionMetrics::new(),
        })
    }

    /// Replace the source of randomness used to pick value variants.
    pub fn with_picker(mut self, picker: impl VariantPicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.coordinator.policy()
    }

    /// The current snapshot.
    pub fn corpus(&self) -> Arc<Corpus> {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the language directory. On failure the previous snapshot stays.
    pub fn reload(&self) -> Result<Arc<Corpus>, CorpusError> {
        let corpus = match Corpus::load(&self.live, &self.master_name) {
            Ok(corpus) => Arc::new(corpus),
            Err(e) => {
                warn!("Reload failed, keeping previous language files: {}", e);
                return Err(e);
            }
        };

        *self.corpus.write().unwrap_or_else(PoisonError::into_inner) = corpus.clone();
        info!("Reloaded {} language file(s)", corpus.len());
        Ok(corpus)
    }

    // ==================== Resolution ====================

    /// Look up `key` for `language` and substitute `arguments`.
    pub fn resolve_string(
        &self,
        key: &str,
        language: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<String, ResolveError> {
        let arguments: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
        let corpus = self.corpus();

        match resolver::resolve(&corpus, self.picker.as_ref(), key, language, &arguments) {
            Ok(resolution) => {
                if resolution.from != ResolvedFrom::Requested {
                    debug!(
                        "String {} for {} answered by master ({:?})",
                        key, language, resolution.from
                    );
                }
                self.metrics.record(resolution.from);
                Ok(resolution.text)
            }
            Err(e) => {
                warn!("{}", e);
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    // ==================== Listing ====================

    /// Distinct language bases, sorted.
    pub fn list_language_families(&self) -> Vec<String> {
        self.corpus().bases()
    }

    /// Identity records of every file, or of the files sharing one base.
    pub fn list_language_variants(&self, base: Option<&str>) -> Vec<LanguageInfo> {
        self.corpus().variants(base)
    }

    pub fn language(&self, file_name: &str) -> Option<LanguageInfo> {
        self.corpus().get(file_name).map(LanguageDocument::info)
    }

    // ==================== Validation & Promotion ====================

    /// Reload, then validate a live file against the fresh corpus.
    /// `Ok(None)` if there is no such file.
    pub fn validation_report(&self, file_name: &str) -> Result<Option<ValidationReport>, CorpusError> {
        let corpus = self.reload()?;
        Ok(corpus
            .get(file_name)
            .map(|document| TemplateValidator::validate(document, &corpus)))
    }

    /// Rendered report for a live file.
    pub fn validate_existing(&self, file_name: &str) -> Result<Option<String>, CorpusError> {
        Ok(self
            .validation_report(file_name)?
            .map(|report| render_report(&report, self.parse_mode)))
    }

    /// Stage uploaded bytes and validate them against a freshly loaded corpus.
    pub fn prepare_upload(&self, bytes: &[u8], file_name: &str) -> Result<PreparedUpload, PrepareError> {
        let candidate = self.coordinator.stage(bytes, file_name)?;
        self.assess(candidate)
    }

    /// Like [`prepare_upload`](Self::prepare_upload), with the bytes fetched
    /// straight into the staging directory.
    pub async fn prepare_remote_upload(
        &self,
        fetcher: &dyn FileFetcher,
        handle: &str,
        file_name: &str,
    ) -> Result<PreparedUpload, PrepareError> {
        let identifier =
            identifier_for_upload(file_name).ok_or_else(|| PrepareError::InvalidFileName {
                name: file_name.to_string(),
            })?;

        let destination = self.coordinator.staging().path_for(&identifier);
        fetcher.fetch(handle, &destination).await?;

        let candidate = self.coordinator.load_staged(file_name)?;
        self.assess(candidate)
    }

    fn assess(&self, candidate: LanguageDocument) -> Result<PreparedUpload, PrepareError> {
        let corpus = self.reload()?;
        Ok(self.coordinator.assess(&candidate, &corpus))
    }

    /// Move a staged file into the live directory and reload.
    pub fn promote(&self, file_name: &str) -> PromotionOutcome {
        self.coordinator
            .promote(file_name, || self.reload().map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::promotion::PromotionStatus;
    use crate::i18n::validator::Severity;
    use crate::telegram::FetchError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    struct FirstPicker;

    impl VariantPicker for FirstPicker {
        fn pick(&self, _count: usize) -> usize {
            0
        }
    }

    const ENGLISH: &str = r#"<strings><language base="English" variant="Standard" langcode="en" />
        <string key="welcome"><value>Welcome {0}!</value><value>Hi {0}!</value></string>
        <string key="bye"><value>Goodbye</value></string></strings>"#;

    const DEUTSCH: &str = r#"<strings><language base="Deutsch" variant="Standard" langcode="de" />
        <string key="welcome"><value>Willkommen {0}!</value></string></strings>"#;

    const PIRATE: &str = r#"<strings><language base="English" variant="Pirate" />
        <string key="welcome"><value>Ahoy {0}!</value></string>
        <string key="bye"><value>Arr</value></string></strings>"#;

    struct Fixture {
        manager: TranslationManager,
        live: TempDir,
        _staging: TempDir,
    }

    fn create_fixture(policy: AdmissionPolicy) -> Fixture {
        let live = TempDir::new().expect("Failed to create temp dir");
        let staging = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(live.path().join("English.xml"), ENGLISH).unwrap();
        std::fs::write(live.path().join("Deutsch.xml"), DEUTSCH).unwrap();

        let manager = TranslationManager::open(
            live.path(),
            staging.path(),
            "English",
            ParseMode::Plain,
            policy,
        )
        .expect("Should open")
        .with_picker(FirstPicker);

        Fixture {
            manager,
            live,
            _staging: staging,
        }
    }

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl FileFetcher for StaticFetcher {
        async fn fetch(&self, _handle: &str, destination: &Path) -> Result<(), FetchError> {
            std::fs::write(destination, self.0).map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl FileFetcher for FailingFetcher {
        async fn fetch(&self, _handle: &str, _destination: &Path) -> Result<(), FetchError> {
            Err(FetchError::Api {
                status: 400,
                description: "Bad Request: invalid file_id".to_string(),
            })
        }
    }

    // ==================== Open Tests ====================

    #[test]
    fn test_open_creates_staging_dir() {
        let live = TempDir::new().unwrap();
        std::fs::write(live.path().join("English.xml"), ENGLISH).unwrap();
        let staging = live.path().join("temp");

        TranslationManager::open(
            live.path(),
            &staging,
            "English",
            ParseMode::Plain,
            AdmissionPolicy::Permissive,
        )
        .expect("Should open");
        assert!(staging.is_dir());
    }

    #[test]
    fn test_open_without_master_fails() {
        let live = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        std::fs::write(live.path().join("Deutsch.xml"), DEUTSCH).unwrap();

        let result = TranslationManager::open(
            live.path(),
            staging.path(),
            "English",
            ParseMode::Plain,
            AdmissionPolicy::Permissive,
        );
        assert!(matches!(result, Err(CorpusError::MissingMaster { .. })));
    }

    // ==================== Resolve Tests ====================

    #[test]
    fn test_resolve_string_with_arguments() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let text = fixture
            .manager
            .resolve_string("welcome", "Deutsch", &[&"Ada"])
            .expect("Should resolve");
        assert_eq!(text, "Willkommen Ada!");
    }

    #[test]
    fn test_resolve_string_falls_back_and_counts() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let manager = &fixture.manager;

        assert_eq!(manager.resolve_string("bye", "Deutsch", &[]).unwrap(), "Goodbye");
        assert_eq!(manager.resolve_string("welcome", "Klingon", &[&42]).unwrap(), "Welcome 42!");
        assert!(matches!(
            manager.resolve_string("nope", "Deutsch", &[]),
            Err(ResolveError::NoStringKey { .. })
        ));

        let report = manager.metrics();
        assert_eq!(report.key_fallbacks, 1);
        assert_eq!(report.unknown_language, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.lookups, 3);
    }

    // ==================== Listing Tests ====================

    #[test]
    fn test_listing() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        std::fs::write(fixture.live.path().join("Pirate.xml"), PIRATE).unwrap();
        fixture.manager.reload().expect("Should reload");

        assert_eq!(fixture.manager.list_language_families(), vec!["Deutsch", "English"]);
        let english = fixture.manager.list_language_variants(Some("English"));
        assert_eq!(english.len(), 2);
        assert_eq!(fixture.manager.list_language_variants(None).len(), 3);

        let info = fixture.manager.language("Deutsch").expect("Should exist");
        assert_eq!(info.lang_code.as_deref(), Some("de"));
        assert!(fixture.manager.language("Klingon").is_none());
    }

    // ==================== Reload Tests ====================

    #[test]
    fn test_reload_failure_keeps_snapshot() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        std::fs::write(fixture.live.path().join("Broken.xml"), "<strings><string>").unwrap();

        assert!(fixture.manager.reload().is_err());
        assert_eq!(fixture.manager.corpus().len(), 2);
        assert_eq!(
            fixture.manager.resolve_string("welcome", "Deutsch", &[&"Bo"]).unwrap(),
            "Willkommen Bo!"
        );
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let before = fixture.manager.corpus();
        std::fs::write(fixture.live.path().join("Pirate.xml"), PIRATE).unwrap();
        fixture.manager.reload().unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(fixture.manager.corpus().len(), 3);
    }

    // ==================== Validate Existing Tests ====================

    #[test]
    fn test_validate_existing() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let text = fixture
            .manager
            .validate_existing("Deutsch")
            .expect("Should reload")
            .expect("Should exist");
        assert!(text.starts_with("Deutsch.xml - (Deutsch Standard)\n"));
        assert!(text.contains("Missing Values:\nbye\n"));
        assert!(fixture.manager.validate_existing("Klingon").unwrap().is_none());
    }

    #[test]
    fn test_validation_sees_disk_edits() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let before = fixture.manager.validation_report("Deutsch").unwrap().unwrap();
        assert_eq!(before.count(Severity::Error), 0);

        std::fs::write(
            fixture.live.path().join("Deutsch.xml"),
            DEUTSCH.replace("Willkommen {0}!", "Willkommen!"),
        )
        .unwrap();

        let after = fixture.manager.validation_report("Deutsch").unwrap().unwrap();
        assert_eq!(after.count(Severity::Error), 1);
    }

    #[test]
    fn test_validation_reports_unloadable_directory() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        std::fs::write(fixture.live.path().join("Broken.xml"), "<strings><string>").unwrap();

        assert!(fixture.manager.validate_existing("Deutsch").is_err());
    }

    // ==================== Prepare & Promote Tests ====================

    #[test]
    fn test_prepare_then_promote_round_trip() {
        let fixture = create_fixture(AdmissionPolicy::Strict);
        let prepared = fixture
            .manager
            .prepare_upload(PIRATE.as_bytes(), "Pirate.xml")
            .expect("Should prepare");
        assert!(prepared.can_promote, "{}", prepared.render(ParseMode::Plain));

        let outcome = fixture.manager.promote("Pirate");
        assert!(outcome.is_completed());
        assert_eq!(
            fixture.manager.resolve_string("bye", "Pirate", &[]).unwrap(),
            "Arr"
        );
    }

    #[test]
    fn test_prepare_sees_files_added_on_disk() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        std::fs::write(fixture.live.path().join("Pirate.xml"), PIRATE).unwrap();

        let prepared = fixture
            .manager
            .prepare_upload(PIRATE.as_bytes(), "Buccaneer.xml")
            .expect("Should prepare");
        assert!(prepared.report.has_fatal());
        assert!(!prepared.can_promote);
    }

    #[test]
    fn test_prepare_malformed_upload() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let result = fixture.manager.prepare_upload(b"not xml at all <", "Bad.xml");
        assert!(matches!(result, Err(PrepareError::Document(_))));
    }

    #[test]
    fn test_promote_collision_introduced_after_prepare() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        fixture
            .manager
            .prepare_upload(PIRATE.as_bytes(), "Pirate.xml")
            .expect("Should prepare");
        std::fs::write(fixture.live.path().join("Buccaneer.xml"), PIRATE).unwrap();

        let outcome = fixture.manager.promote("Pirate");
        assert!(matches!(outcome.status, PromotionStatus::Aborted { .. }));
        assert!(fixture.manager.language("Pirate").is_none());
    }

    #[tokio::test]
    async fn test_prepare_remote_upload() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let prepared = fixture
            .manager
            .prepare_remote_upload(&StaticFetcher(PIRATE), "doc-1", "Pirate.xml")
            .await
            .expect("Should prepare");
        assert_eq!(prepared.file_name(), "Pirate");
        assert!(prepared.can_promote);
        assert!(!prepared.new_base);
    }

    #[tokio::test]
    async fn test_prepare_remote_upload_fetch_failure() {
        let fixture = create_fixture(AdmissionPolicy::Permissive);
        let result = fixture
            .manager
            .prepare_remote_upload(&FailingFetcher, "doc-1", "Pirate.xml")
            .await;
        assert!(matches!(result, Err(PrepareError::Fetch(_))));
    }
}
