//! Resume sidecar (`<file>.json`): the plan a download was started with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-segment entry of the sidecar, keyed by segment index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub start: u64,
    pub end: u64,
    pub segment_size: u64,
    pub segment_path: String,
}

/// Persisted plan. `etag` is written as `false` when the server sent none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub url: String,
    #[serde(with = "etag_or_false")]
    pub etag: Option<String>,
    pub segments: usize,
    #[serde(flatten)]
    pub table: BTreeMap<String, SegmentEntry>,
}

/// The part of a sidecar needed to decide whether a prior plan is reusable.
/// Segment entries are kept loosely typed so hand-edited or older sidecars
/// still parse.
#[derive(Debug, Deserialize)]
pub(crate) struct PlanHeader {
    pub url: String,
    #[serde(with = "etag_or_false")]
    pub etag: Option<String>,
    pub segments: usize,
    #[serde(flatten)]
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl PlanHeader {
    /// Inclusive `(start, end)` recorded for segment `index`, if well formed.
    pub fn recorded_range(&self, index: usize) -> Option<(u64, u64)> {
        let entry: SegmentEntry =
            serde_json::from_value(self.entries.get(&index.to_string())?.clone()).ok()?;
        Some((entry.start, entry.end))
    }
}

impl ProgressRecord {
    /// Segment entries ordered by index.
    pub fn entries(&self) -> Vec<(usize, &SegmentEntry)> {
        let mut entries: Vec<_> = self
            .table
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
            .collect();
        entries.sort_by_key(|(i, _)| *i);
        entries
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read sidecar: {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse sidecar: {}", path.display()))
    }

    /// Overwrites any previous sidecar. Not atomic: a torn write reads back as
    /// "no prior plan".
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize sidecar")?;
        std::fs::write(path, json).with_context(|| format!("write sidecar: {}", path.display()))
    }
}

/// Reads the plan header of an existing sidecar. Missing or unparseable files
/// yield `None`.
pub(crate) fn read_header(path: &Path) -> Option<PlanHeader> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(header) => Some(header),
        Err(e) => {
            tracing::debug!(path = %path.display(), "ignoring unreadable sidecar: {}", e);
            None
        }
    }
}

mod etag_or_false {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Tag(String),
        Flag(bool),
    }

    pub fn serialize<S: Serializer>(etag: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match etag {
            Some(tag) => tag.serialize(s),
            None => false.serialize(s),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Raw>::deserialize(d)? {
            Some(Raw::Tag(tag)) => Some(tag),
            Some(Raw::Flag(_)) | None => None,
        })
    }
}
