//! Template documents: the parsed form of one language file.
//!
//! A template file looks like this:
//!
//! ```xml
//! <strings>
//!   <language base="English" variant="Standard" langcode="en" />
//!   <string key="greeting" maxlength="40">
//!     <value>Hello {0}!</value>
//!     <value>Hi there, {0}.</value>
//!   </string>
//! </strings>
//! ```
//!
//! The first `language` element anywhere in the document carries the identity,
//! and every `string` element anywhere in the document is an entry.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Extension of template files inside a corpus directory.
pub const TEMPLATE_EXTENSION: &str = "xml";

/// Errors raised while turning raw bytes into a [`LanguageDocument`].
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Malformed language file '{file}': {reason}")]
    Malformed { file: String, reason: String },

    #[error("Failed to read language file '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    fn malformed(file: &str, reason: impl fmt::Display) -> Self {
        DocumentError::Malformed {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The two-part identity of a language: base ("English") and variant ("Standard").
///
/// Either part may be missing in a submitted file; the structural validator
/// flags that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct LanguageIdentity {
    pub base: Option<String>,
    pub variant: Option<String>,
}

impl LanguageIdentity {
    pub fn new(base: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            base: Some(base.into()),
            variant: Some(variant.into()),
        }
    }

    /// Base, or an empty string when absent.
    pub fn base_or_empty(&self) -> &str {
        self.base.as_deref().unwrap_or("")
    }

    /// Variant, or an empty string when absent.
    pub fn variant_or_empty(&self) -> &str {
        self.variant.as_deref().unwrap_or("")
    }
}

impl fmt::Display for LanguageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.base_or_empty(), self.variant_or_empty())
    }
}

/// One translatable string: a key and its value variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry {
    pub key: String,

    /// Value variants in document order. One is picked at random per lookup.
    pub values: Vec<String>,

    /// Maximum length in characters. 0 means unconstrained.
    pub max_length: usize,
}

impl StringEntry {
    /// The canonical value (the first variant), if any.
    pub fn canonical(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Public description of a corpus member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub base: Option<String>,
    pub variant: Option<String>,
    pub file_name: String,
    pub lang_code: Option<String>,
}

/// A parsed template file.
#[derive(Debug, Clone)]
pub struct LanguageDocument {
    file_name: String,
    identity: LanguageIdentity,
    lang_code: Option<String>,
    entries: Vec<StringEntry>,
    /// key -> position of its first occurrence in `entries`
    index: HashMap<String, usize>,
    last_modified: DateTime<Utc>,
}

impl LanguageDocument {
    /// Parse a template document from raw bytes.
    ///
    /// # Arguments
    /// * `file_name` - The corpus identifier (file name without extension)
    /// * `bytes` - Raw file content
    /// * `last_modified` - Timestamp of the backing storage
    pub fn parse(
        file_name: &str,
        bytes: &[u8],
        last_modified: DateTime<Utc>,
    ) -> Result<Self, DocumentError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DocumentError::malformed(file_name, e))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let parsed = parse_template(file_name, text)?;

        let mut index = HashMap::with_capacity(parsed.entries.len());
        for (position, entry) in parsed.entries.iter().enumerate() {
            index.entry(entry.key.clone()).or_insert(position);
        }

        Ok(Self {
            file_name: file_name.to_string(),
            identity: parsed.identity,
            lang_code: parsed.lang_code,
            entries: parsed.entries,
            index,
            last_modified,
        })
    }

    /// Read and parse a template file. The identifier is the file stem.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let file_name = file_identifier(path).unwrap_or_default();

        let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
            file: path.display().to_string(),
            source,
        })?;
        let last_modified = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Self::parse(&file_name, &bytes, last_modified)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn identity(&self) -> &LanguageIdentity {
        &self.identity
    }

    pub fn base(&self) -> Option<&str> {
        self.identity.base.as_deref()
    }

    pub fn variant(&self) -> Option<&str> {
        self.identity.variant.as_deref()
    }

    pub fn lang_code(&self) -> Option<&str> {
        self.lang_code.as_deref()
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// All entries in document order, duplicates included.
    pub fn entries(&self) -> &[StringEntry] {
        &self.entries
    }

    /// Look up an entry. When a key is defined more than once the first
    /// definition wins.
    pub fn entry(&self, key: &str) -> Option<&StringEntry> {
        self.index.get(key).map(|&position| &self.entries[position])
    }

    /// Keys defined more than once, with their occurrence counts, in order of
    /// first appearance.
    pub fn duplicate_keys(&self) -> Vec<(&str, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.key.as_str()).or_default() += 1;
        }

        self.entries
            .iter()
            .enumerate()
            .filter(|(position, entry)| self.index.get(&entry.key) == Some(position))
            .filter_map(|(_, entry)| {
                let count = counts[entry.key.as_str()];
                (count > 1).then_some((entry.key.as_str(), count))
            })
            .collect()
    }

    pub fn info(&self) -> LanguageInfo {
        LanguageInfo {
            base: self.identity.base.clone(),
            variant: self.identity.variant.clone(),
            file_name: self.file_name.clone(),
            lang_code: self.lang_code.clone(),
        }
    }
}

/// Corpus identifier for a path: the file name without its extension.
pub fn file_identifier(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// Whether a path is a template file. The extension must be exactly
/// `xml`, the one `TemplateDirectory` writes.
pub fn is_template_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(TEMPLATE_EXTENSION)
}

// ==================== XML Parsing ====================

struct ParsedTemplate {
    identity: LanguageIdentity,
    lang_code: Option<String>,
    entries: Vec<StringEntry>,
}

struct PendingEntry {
    entry: StringEntry,
    /// Text of the `value` element currently open, if any
    value: Option<String>,
}

fn parse_template(file: &str, text: &str) -> Result<ParsedTemplate, DocumentError> {
    let mut reader = Reader::from_str(text);

    let mut seen_root = false;
    let mut language: Option<(LanguageIdentity, Option<String>)> = None;
    let mut entries = Vec::new();
    let mut pending: Option<PendingEntry> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DocumentError::malformed(file, format!("{} at byte {}", e, reader.buffer_position())))?;

        match event {
            Event::Start(element) => {
                seen_root = true;
                match element.name().as_ref() {
                    b"language" if language.is_none() => {
                        language = Some(read_language(file, &element)?);
                    }
                    b"string" => {
                        if let Some(previous) = pending.take() {
                            entries.push(previous.entry);
                        }
                        pending = Some(PendingEntry {
                            entry: read_string(file, &element)?,
                            value: None,
                        });
                    }
                    b"value" => {
                        if let Some(current) = pending.as_mut() {
                            current.value.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(element) => {
                seen_root = true;
                match element.name().as_ref() {
                    b"language" if language.is_none() => {
                        language = Some(read_language(file, &element)?);
                    }
                    b"string" => {
                        entries.push(read_string(file, &element)?);
                    }
                    b"value" => {
                        if let Some(current) = pending.as_mut() {
                            if current.value.is_none() {
                                current.entry.values.push(String::new());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(content) => {
                if let Some(value) = pending.as_mut().and_then(|p| p.value.as_mut()) {
                    let unescaped = content
                        .unescape()
                        .map_err(|e| DocumentError::malformed(file, e))?;
                    value.push_str(&unescaped);
                }
            }
            Event::CData(content) => {
                if let Some(value) = pending.as_mut().and_then(|p| p.value.as_mut()) {
                    let raw = std::str::from_utf8(&content)
                        .map_err(|e| DocumentError::malformed(file, e))?;
                    value.push_str(raw);
                }
            }
            Event::End(element) => match element.name().as_ref() {
                b"value" => {
                    if let Some(current) = pending.as_mut() {
                        if let Some(value) = current.value.take() {
                            current.entry.values.push(value);
                        }
                    }
                }
                b"string" => {
                    if let Some(current) = pending.take() {
                        entries.push(current.entry);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(DocumentError::malformed(file, "document has no root element"));
    }
    if let Some(unterminated) = pending {
        return Err(DocumentError::malformed(
            file,
            format!("string '{}' is not closed", unterminated.entry.key),
        ));
    }

    let (identity, lang_code) = language.unwrap_or_default();
    Ok(ParsedTemplate {
        identity,
        lang_code,
        entries,
    })
}

fn attribute(
    file: &str,
    element: &BytesStart<'_>,
    name: &[u8],
) -> Result<Option<String>, DocumentError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| DocumentError::malformed(file, e))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::malformed(file, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn read_language(
    file: &str,
    element: &BytesStart<'_>,
) -> Result<(LanguageIdentity, Option<String>), DocumentError> {
    let identity = LanguageIdentity {
        base: attribute(file, element, b"base")?,
        variant: attribute(file, element, b"variant")?,
    };
    let lang_code = attribute(file, element, b"langcode")?;
    Ok((identity, lang_code))
}

fn read_string(file: &str, element: &BytesStart<'_>) -> Result<StringEntry, DocumentError> {
    let key = attribute(file, element, b"key")?
        .ok_or_else(|| DocumentError::malformed(file, "string element without a key attribute"))?;

    // An unparsable maxlength means "unconstrained", same as 0
    let max_length = attribute(file, element, b"maxlength")?
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(0);

    Ok(StringEntry {
        key,
        values: Vec::new(),
        max_length,
    })
}
