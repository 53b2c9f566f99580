use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Spreadsheet column that carries the case number in batch inputs.
pub const CASE_NUMBER_FIELD: &str = "NUMERO_PROCESSO";

/// A case number already validated against the CNJ layout
/// `NNNNNNN-DD.AAAA.J.TR.OOOO`.
///
/// Only constructed by [`crate::normalize`] / [`CnjNumber::parse`], so every
/// instance has exactly 20 digits in canonical position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CnjNumber(pub(crate) String);

impl CnjNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `NNNNNNN`
    pub fn sequence(&self) -> &str {
        &self.0[0..7]
    }

    /// `AAAA`
    pub fn year(&self) -> &str {
        &self.0[11..15]
    }

    /// `J`
    pub fn branch(&self) -> char {
        self.0.as_bytes()[16] as char
    }

    /// `TR`, exactly as written (with any leading zero).
    pub fn tribunal(&self) -> &str {
        &self.0[18..20]
    }

    /// `OOOO`
    pub fn origin(&self) -> &str {
        &self.0[21..25]
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CnjNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CnjNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Tribunal region owning a case, e.g. `"2"` for TRT-2.
///
/// Ordered numerically so `"2"` sorts before `"10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for RegionCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for RegionCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One row of a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Raw number as submitted; replaced by the canonical form once normalized.
    pub case_number: String,
    /// Filled in by the partitioner.
    pub region_code: Option<RegionCode>,
    /// Remaining spreadsheet columns, carried through untouched.
    pub attributes: BTreeMap<String, String>,
    /// Position in the submitted batch. Never changes.
    pub original_index: usize,
}

impl CaseRecord {
    pub fn new(original_index: usize, case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            region_code: None,
            attributes: BTreeMap::new(),
            original_index,
        }
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Build a record from a spreadsheet row keyed by column name.
    ///
    /// Returns `None` when the row has no [`CASE_NUMBER_FIELD`] column.
    pub fn from_row(original_index: usize, mut row: BTreeMap<String, String>) -> Option<Self> {
        let case_number = row.remove(CASE_NUMBER_FIELD)?;
        Some(Self {
            case_number,
            region_code: None,
            attributes: row,
            original_index,
        })
    }
}

/// All records of one batch that belong to a single region, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBatch {
    pub region_code: RegionCode,
    pub records: Vec<CaseRecord>,
}

impl RegionBatch {
    pub fn new(region_code: RegionCode) -> Self {
        Self {
            region_code,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
