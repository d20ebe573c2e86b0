//! Resolution metrics.
//!
//! Counts how often lookups are answered by the requested language and how
//! often they degrade to the master file.

use crate::i18n::resolver::ResolvedFrom;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-manager resolution counters.
#[derive(Debug, Default)]
pub struct ResolutionMetrics {
    /// Lookups answered by the requested language
    requested: AtomicUsize,

    /// Lookups for a language that isn't in the corpus
    unknown_language: AtomicUsize,

    /// Lookups where the key (or its values) came from the master
    key_fallbacks: AtomicUsize,

    /// Lookups where formatting failed and the master's first value was used
    format_fallbacks: AtomicUsize,

    /// Lookups that failed in the master too
    failures: AtomicUsize,
}

impl ResolutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful lookup.
    pub fn record(&self, from: ResolvedFrom) {
        let counter = match from {
            ResolvedFrom::Requested => &self.requested,
            ResolvedFrom::UnknownLanguage => &self.unknown_language,
            ResolvedFrom::KeyFallback => &self.key_fallbacks,
            ResolvedFrom::FormatFallback => &self.format_fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that returned an error.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let requested = self.requested.load(Ordering::Relaxed);
        let unknown_language = self.unknown_language.load(Ordering::Relaxed);
        let key_fallbacks = self.key_fallbacks.load(Ordering::Relaxed);
        let format_fallbacks = self.format_fallbacks.load(Ordering::Relaxed);
        let failures = self.failures();

        let total = requested + unknown_language + key_fallbacks + format_fallbacks + failures;
        let fallback_rate = if total > 0 {
            ((unknown_language + key_fallbacks + format_fallbacks) as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            lookups: total,
            requested,
            unknown_language,
            key_fallbacks,
            format_fallbacks,
            failures,
            fallback_rate,
        }
    }
}

/// Snapshot of the resolution counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Total number of lookups
    pub lookups: usize,

    pub requested: usize,
    pub unknown_language: usize,
    pub key_fallbacks: usize,
    pub format_fallbacks: usize,
    pub failures: usize,

    /// Share of lookups answered by the master instead of the requested language (0-100)
    pub fallback_rate: f64,
}
