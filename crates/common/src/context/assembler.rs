//! Context assembly - numbered passages for grounded prompting
//!
//! Hits keep the order the search gateway returned them in; the passage at
//! position `i` is cited as `[i + 1]`. A hit whose id already appeared is
//! dropped, so every passage is cited once.

use crate::search::SearchHit;
use std::collections::HashSet;

/// Label used when a hit has no source
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Ordered, citation-numbered passages for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBlock {
    hits: Vec<SearchHit>,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<SearchHit> {
        self.hits
    }

    /// Hits paired with their 1-based citation index
    pub fn cited(&self) -> impl Iterator<Item = (usize, &SearchHit)> {
        self.hits.iter().enumerate().map(|(i, hit)| (i + 1, hit))
    }

    /// Render as `[i] <label>: <source>\n<content>` entries separated by a
    /// blank line. An empty block renders as an empty string.
    pub fn render(&self, source_label: &str) -> String {
        self.cited()
            .map(|(index, hit)| {
                format!(
                    "[{}] {}: {}\n{}",
                    index,
                    source_label,
                    hit.source.as_deref().unwrap_or(UNKNOWN_SOURCE),
                    hit.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Turn the gateway's ranked hits into a context block. Total and pure.
pub fn assemble(hits: Vec<SearchHit>) -> ContextBlock {
    let mut seen = HashSet::with_capacity(hits.len());
    let hits = hits
        .into_iter()
        .filter(|hit| seen.insert(hit.id.clone()))
        .collect();
    ContextBlock { hits }
}
