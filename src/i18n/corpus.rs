//! Corpus: every language file of a directory, plus the designated master.
//!
//! A `Corpus` is an immutable snapshot. Reloading builds a whole new snapshot;
//! nothing ever edits one in place.

use crate::i18n::document::{
    file_identifier, is_template_file, DocumentError, LanguageDocument, LanguageInfo,
    TEMPLATE_EXTENSION,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to read language directory '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Master file '{name}' not found among the language files")]
    MissingMaster { name: String },

    #[error("Language file '{name}' is present more than once")]
    DuplicateFile { name: String },
}

/// A directory of template files, one file per language.
#[derive(Debug, Clone)]
pub struct TemplateDirectory {
    root: PathBuf,
}

impl TemplateDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the file with this identifier lives.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", file_name, TEMPLATE_EXTENSION))
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.path_for(file_name).is_file()
    }

    /// Parse every template file at the top level of the directory.
    pub fn load_documents(&self) -> Result<Vec<LanguageDocument>, CorpusError> {
        let io_error = |source| CorpusError::Io {
            path: self.root.display().to_string(),
            source,
        };

        let mut documents = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root).map_err(io_error)? {
            let path = dir_entry.map_err(io_error)?.path();
            if !path.is_file() || !is_template_file(&path) {
                continue;
            }
            debug!("Loading language file {}", path.display());
            documents.push(LanguageDocument::load(&path)?);
        }

        Ok(documents)
    }

    /// Write raw bytes as `<file_name>.xml`, replacing any existing file.
    pub fn write(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(file_name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Copy a file in as `<file_name>.xml`, overwriting any existing file.
    pub fn copy_in(&self, source: &Path, file_name: &str) -> io::Result<PathBuf> {
        let destination = self.path_for(file_name);
        std::fs::copy(source, &destination)?;
        Ok(destination)
    }
}

/// Snapshot of all language files, keyed by file identifier.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: BTreeMap<String, LanguageDocument>,
    master_name: String,
}

impl Corpus {
    /// Build a snapshot from parsed documents. Fails if none of them is the
    /// master.
    pub fn from_documents(
        documents: impl IntoIterator<Item = LanguageDocument>,
        master_name: &str,
    ) -> Result<Self, CorpusError> {
        let mut by_name = BTreeMap::new();
        for document in documents {
            let name = document.file_name().to_string();
            if by_name.contains_key(&name) {
                return Err(CorpusError::DuplicateFile { name });
            }
            by_name.insert(name, document);
        }
        let documents = by_name;

        if !documents.contains_key(master_name) {
            return Err(CorpusError::MissingMaster {
                name: master_name.to_string(),
            });
        }

        Ok(Self {
            documents,
            master_name: master_name.to_string(),
        })
    }

    /// Load every template file of a directory.
    pub fn load(directory: &TemplateDirectory, master_name: &str) -> Result<Self, CorpusError> {
        Self::from_documents(directory.load_documents()?, master_name)
    }

    pub fn master(&self) -> &LanguageDocument {
        // from_documents guarantees the master is present
        &self.documents[&self.master_name]
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    pub fn get(&self, file_name: &str) -> Option<&LanguageDocument> {
        self.documents.get(file_name)
    }

    /// All documents, master included, ordered by file identifier.
    pub fn documents(&self) -> impl Iterator<Item = &LanguageDocument> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Distinct language bases, sorted. Files without a base are skipped.
    pub fn bases(&self) -> Vec<String> {
        self.documents()
            .filter_map(|document| document.base())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether any document has this base.
    pub fn has_base(&self, base: Option<&str>) -> bool {
        self.documents().any(|document| document.base() == base)
    }

    /// Identity records for every file, or only for the files of one base.
    pub fn variants(&self, base: Option<&str>) -> Vec<LanguageInfo> {
        self.documents()
            .filter(|document| base.is_none() || document.base() == base)
            .map(LanguageDocument::info)
            .collect()
    }
}

/// Corpus identifier for an uploaded file name, if it has a usable stem.
pub fn identifier_for_upload(file_name: &str) -> Option<String> {
    file_identifier(Path::new(file_name)).filter(|stem| is_plain_identifier(stem))
}

/// An identifier usable as a single file name inside a corpus directory.
pub fn is_plain_identifier(file_name: &str) -> bool {
    !file_name.trim().is_empty()
        && file_name != "."
        && file_name != ".."
        && !file_name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    fn template(base: &str, variant: &str) -> String {
        format!(
            r#"<strings><language base="{}" variant="{}" /><string key="hello"><value>Hello</value></string></strings>"#,
            base, variant
        )
    }

    fn create_test_dir(files: &[(&str, String)]) -> (TemplateDirectory, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            std::fs::write(temp_dir.path().join(name), content).expect("Failed to write");
        }
        (TemplateDirectory::new(temp_dir.path()), temp_dir)
    }

    // ==================== TemplateDirectory Tests ====================

    #[test]
    fn test_load_only_xml_files() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("notes.txt", "not a template".to_string()),
        ]);
        std::fs::create_dir(dir.root().join("nested.xml")).expect("Failed to create dir");

        let documents = dir.load_documents().expect("Should load");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].file_name(), "English");
    }

    #[test]
    fn test_load_ignores_other_extension_case() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("Deutsch.XML", template("Deutsch", "Alt")),
            ("Deutsch.xml", template("Deutsch", "Standard")),
        ]);

        let corpus = Corpus::load(&dir, "English").expect("Should load");
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get("Deutsch").and_then(|d| d.variant()), Some("Standard"));
    }

    #[test]
    fn test_duplicate_file_names_are_rejected() {
        let parse = |base: &str| {
            LanguageDocument::parse(
                "Deutsch",
                template(base, "Standard").as_bytes(),
                chrono::Utc::now(),
            )
            .unwrap()
        };
        let english = LanguageDocument::parse(
            "English",
            template("English", "Standard").as_bytes(),
            chrono::Utc::now(),
        )
        .unwrap();

        let result = Corpus::from_documents(vec![english, parse("Deutsch"), parse("German")], "English");
        assert!(matches!(result, Err(CorpusError::DuplicateFile { name }) if name == "Deutsch"));
    }

    #[test]
    fn test_load_fails_on_malformed_member() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("Broken.xml", "<strings><string key=\"a\">".to_string()),
        ]);

        let result = dir.load_documents();
        assert!(matches!(result, Err(CorpusError::Document(_))));
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = TemplateDirectory::new("/non/existent/path");
        assert!(matches!(dir.load_documents(), Err(CorpusError::Io { .. })));
    }

    #[test]
    fn test_write_and_copy_overwrite() {
        let (dir, temp_dir) = create_test_dir(&[]);
        let path = dir.write("Deutsch", b"first").expect("Should write");
        assert_eq!(path, temp_dir.path().join("Deutsch.xml"));
        assert!(dir.contains("Deutsch"));

        let source = temp_dir.path().join("source.bin");
        std::fs::write(&source, b"second").expect("Failed to write");
        dir.copy_in(&source, "Deutsch").expect("Should copy");
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    // ==================== Corpus Tests ====================

    #[test]
    fn test_corpus_resolves_master_by_name() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("Deutsch.xml", template("Deutsch", "Standard")),
        ]);

        let corpus = Corpus::load(&dir, "English").expect("Should load");
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.master().file_name(), "English");
        assert_eq!(corpus.master_name(), "English");
        assert!(corpus.get("Deutsch").is_some());
        assert!(corpus.get("Klingon").is_none());
    }

    #[test]
    fn test_corpus_without_master_fails() {
        let (dir, _temp_dir) = create_test_dir(&[("Deutsch.xml", template("Deutsch", "Standard"))]);
        let result = Corpus::load(&dir, "English");
        assert!(matches!(result, Err(CorpusError::MissingMaster { .. })));
    }

    #[test]
    fn test_documents_are_ordered_by_file_name() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("Deutsch.xml", template("Deutsch", "Standard")),
            ("Afrikaans.xml", template("Afrikaans", "Standard")),
        ]);
        let corpus = Corpus::load(&dir, "English").expect("Should load");
        let names: Vec<_> = corpus.documents().map(|d| d.file_name().to_string()).collect();
        assert_eq!(names, vec!["Afrikaans", "Deutsch", "English"]);
    }

    #[test]
    fn test_bases_are_distinct() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("Pirate.xml", template("English", "Pirate")),
            ("Deutsch.xml", template("Deutsch", "Standard")),
        ]);
        let corpus = Corpus::load(&dir, "English").expect("Should load");
        assert_eq!(corpus.bases(), vec!["Deutsch", "English"]);
        assert!(corpus.has_base(Some("Deutsch")));
        assert!(!corpus.has_base(Some("Français")));
    }

    #[test]
    fn test_variants_filtered_by_base() {
        let (dir, _temp_dir) = create_test_dir(&[
            ("English.xml", template("English", "Standard")),
            ("Pirate.xml", template("English", "Pirate")),
            ("Deutsch.xml", template("Deutsch", "Standard")),
        ]);
        let corpus = Corpus::load(&dir, "English").expect("Should load");

        let english = corpus.variants(Some("English"));
        let variants: Vec<_> = english.iter().filter_map(|info| info.variant.as_deref()).collect();
        assert_eq!(variants, vec!["Standard", "Pirate"]);

        assert_eq!(corpus.variants(None).len(), 3);
        assert!(corpus.variants(Some("Français")).is_empty());
    }

    // ==================== Identifier Tests ====================

    #[test]
    fn test_identifier_for_upload() {
        assert_eq!(identifier_for_upload("Deutsch.xml"), Some("Deutsch".to_string()));
        assert_eq!(identifier_for_upload("../../etc/Deutsch.xml"), Some("Deutsch".to_string()));
        assert_eq!(identifier_for_upload(""), None);
        assert_eq!(identifier_for_upload(".xml"), Some(".xml".to_string()));
    }

    #[test]
    fn test_is_plain_identifier() {
        assert!(is_plain_identifier("Deutsch"));
        assert!(!is_plain_identifier("../Deutsch"));
        assert!(!is_plain_identifier("a\\b"));
        assert!(!is_plain_identifier(".."));
        assert!(!is_plain_identifier("   "));
    }
}
