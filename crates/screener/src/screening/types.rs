use serde::{Deserialize, Serialize};

use crate::search::SearchOutcome;

/// One input row: an entity to screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Zero-based position in the input sequence.
    pub row: usize,
    /// Value of the identifier column (`ID` or `CIF`), kept as text.
    pub entity_id: String,
    pub name: String,
}

impl EntityRecord {
    pub fn new(row: usize, entity_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            row,
            entity_id: entity_id.into(),
            name: name.into(),
        }
    }

    /// Cache key: the trimmed name, or `None` when the name is blank.
    pub fn normalized_name(&self) -> Option<&str> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreeningStatus {
    Adverse,
    NoAdverse,
    EmptyName,
    Blocked,
}

impl ScreeningStatus {
    pub const ALL: [ScreeningStatus; 4] = [
        ScreeningStatus::Adverse,
        ScreeningStatus::NoAdverse,
        ScreeningStatus::EmptyName,
        ScreeningStatus::Blocked,
    ];

    /// Text written into the output spreadsheet.
    pub fn label(&self) -> &'static str {
        match self {
            ScreeningStatus::Adverse => "Adverse",
            ScreeningStatus::NoAdverse => "No Adverse",
            ScreeningStatus::EmptyName => "Empty Name",
            ScreeningStatus::Blocked => "Blocked",
        }
    }
}

impl std::fmt::Display for ScreeningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classification of one entity. One per input record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub row: usize,
    pub entity_id: String,
    pub name: String,
    pub status: ScreeningStatus,
    /// Matched filters in filter-declaration order, without duplicates.
    pub matched_keywords: Vec<String>,
    pub result_count: usize,
}

impl ScreeningResult {
    pub fn empty_name(record: &EntityRecord) -> Self {
        Self {
            row: record.row,
            entity_id: record.entity_id.clone(),
            name: record.name.clone(),
            status: ScreeningStatus::EmptyName,
            matched_keywords: Vec::new(),
            result_count: 0,
        }
    }

    pub fn blocked(record: &EntityRecord) -> Self {
        Self {
            row: record.row,
            entity_id: record.entity_id.clone(),
            name: record.name.clone(),
            status: ScreeningStatus::Blocked,
            matched_keywords: Vec::new(),
            result_count: 0,
        }
    }

    pub fn from_entry(record: &EntityRecord, entry: &CacheEntry) -> Self {
        Self {
            row: record.row,
            entity_id: record.entity_id.clone(),
            name: record.name.clone(),
            status: entry.status,
            matched_keywords: entry.matched_keywords.clone(),
            result_count: entry.result_count,
        }
    }

    /// The `Keyword` output column.
    pub fn keyword_column(&self) -> String {
        self.matched_keywords.join(", ")
    }
}

/// A cached, non-blocked outcome for one normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: ScreeningStatus,
    pub matched_keywords: Vec<String>,
    pub result_count: usize,
}

impl CacheEntry {
    /// Classifies a fresh lookup. Blocked outcomes have no cache entry.
    pub fn from_outcome(outcome: &SearchOutcome) -> Option<Self> {
        if outcome.blocked {
            return None;
        }

        let status = if outcome.matched_keywords.is_empty() {
            ScreeningStatus::NoAdverse
        } else {
            ScreeningStatus::Adverse
        };

        Some(Self {
            status,
            matched_keywords: outcome.matched_keywords.clone(),
            result_count: outcome.result_count,
        })
    }
}

/// Restores input order on a completion-ordered result set.
pub fn sort_by_input_order(results: &mut [ScreeningResult]) {
    results.sort_by_key(|r| r.row);
}
