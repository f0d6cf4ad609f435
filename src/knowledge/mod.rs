//! Local keyword knowledge base.
//!
//! [`KnowledgeLookup`] owns the dataset sources and loads them on first use:
//! the optional user overlay first, then the mandatory builtin dataset, so
//! overlay entries shadow builtin ones. Each keyword is compiled once into a
//! case-insensitive, whole-word matcher.
//!
//! Loading never fails the caller. A missing or malformed overlay is logged
//! and skipped; a builtin failure leaves the base empty so every lookup misses.

pub mod dataset;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::KnowledgeConfig;
use dataset::{DatasetError, DatasetSource};

/// One keyword rule as stored in the dataset files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnowledgeEntry {
    pub keywords: Vec<String>,
    pub response: String,
}

struct CompiledEntry {
    matchers: Vec<Arc<Regex>>,
    response: String,
}

/// Ordered, immutable set of compiled entries.
pub struct KnowledgeBase {
    entries: Vec<CompiledEntry>,
}

impl KnowledgeBase {
    /// Compile `entries` in order. Keywords shared between entries reuse one
    /// matcher. Blank keywords are dropped.
    pub fn compile(entries: Vec<KnowledgeEntry>) -> Self {
        let mut cache: HashMap<String, Arc<Regex>> = HashMap::new();
        let compiled = entries
            .into_iter()
            .map(|entry| {
                let matchers = entry
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .filter_map(|k| {
                        if let Some(m) = cache.get(&k) {
                            return Some(m.clone());
                        }
                        match word_matcher(&k) {
                            Ok(m) => {
                                let m = Arc::new(m);
                                cache.insert(k, m.clone());
                                Some(m)
                            }
                            Err(e) => {
                                warn!(keyword = %k, "knowledge: keyword skipped: {e}");
                                None
                            }
                        }
                    })
                    .collect();
                CompiledEntry { matchers, response: entry.response }
            })
            .collect();
        Self { entries: compiled }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Response of the first entry with a keyword occurring as a whole word
    /// in `message`. Empty or whitespace-only input never matches.
    pub fn search(&self, message: &str) -> Option<&str> {
        let normalized = message.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.matchers.iter().any(|m| m.is_match(&normalized)))
            .map(|e| e.response.as_str())
    }
}

fn word_matcher(keyword: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
}

/// Load-once, read-many handle to the knowledge base.
///
/// Concurrent first callers wait on a single load; afterwards lookups are
/// lock-free reads.
pub struct KnowledgeLookup {
    builtin: Option<DatasetSource>,
    overlay: Option<DatasetSource>,
    base: OnceCell<KnowledgeBase>,
}

impl KnowledgeLookup {
    pub fn new(builtin: DatasetSource, overlay: Option<DatasetSource>) -> Self {
        Self { builtin: Some(builtin), overlay, base: OnceCell::new() }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(
            DatasetSource::parse(&config.builtin),
            config.overlay.as_deref().map(DatasetSource::parse),
        )
    }

    /// Already-loaded lookup over `entries`; no sources are ever read.
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            builtin: None,
            overlay: None,
            base: OnceCell::new_with(Some(KnowledgeBase::compile(entries))),
        }
    }

    /// Ensure the base is loaded and return its entry count. Repeated calls
    /// return the same base without reading the sources again.
    pub async fn load(&self) -> usize {
        self.base().await.len()
    }

    /// Entry count if loading already happened.
    pub fn loaded_len(&self) -> Option<usize> {
        self.base.get().map(KnowledgeBase::len)
    }

    /// Canned response for `message`, loading the base first if needed.
    pub async fn search(&self, message: &str) -> Option<String> {
        if message.trim().is_empty() {
            return None;
        }
        let hit = self.base().await.search(message).map(str::to_string);
        debug!(hit = hit.is_some(), "knowledge: lookup");
        hit
    }

    async fn base(&self) -> &KnowledgeBase {
        self.base
            .get_or_init(|| async {
                let entries = self.read_sources().await;
                let base = KnowledgeBase::compile(entries);
                info!(entries = base.len(), "knowledge base loaded");
                base
            })
            .await
    }

    async fn read_sources(&self) -> Vec<KnowledgeEntry> {
        let Some(builtin) = &self.builtin else {
            return Vec::new();
        };

        let builtin_entries = match builtin.fetch().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(source = %builtin, "knowledge: failed to load builtin dataset, local search disabled: {e}");
                return Vec::new();
            }
        };

        let overlay_entries = match &self.overlay {
            None => Vec::new(),
            Some(overlay) => match overlay.fetch().await {
                Ok(entries) => {
                    info!(source = %overlay, entries = entries.len(), "knowledge: user overlay loaded");
                    entries
                }
                Err(DatasetError::NotFound(_)) => {
                    warn!(source = %overlay, "knowledge: user overlay not found; this is normal without custom data");
                    Vec::new()
                }
                Err(e) => {
                    error!(source = %overlay, "knowledge: user overlay ignored, using builtin data only: {e}");
                    Vec::new()
                }
            },
        };

        let mut merged = overlay_entries;
        merged.extend(builtin_entries);
        merged
    }
}
