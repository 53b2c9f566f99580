//! Reading the batch a run works on.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crawjud_cnj::{CASE_NUMBER_FIELD, CaseRecord};
use serde_json::Value;
use thiserror::Error;

pub const BATCH_FILE: &str = "batch.json";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a JSON array of objects: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads `<folder>/batch.json`.
pub fn read_batch(folder: &Path) -> Result<Vec<CaseRecord>, BatchError> {
    let path = folder.join(BATCH_FILE);
    let text = fs::read_to_string(&path).map_err(|source| BatchError::Io {
        path: path.clone(),
        source,
    })?;
    parse_batch(&text).map_err(|source| BatchError::Json { path, source })
}

/// Turns an array of row objects into records, keeping submission order.
///
/// Non-string cells are kept in their JSON text form and nulls are dropped. A
/// row without a case number still yields a record, with an empty number, so
/// the partitioner counts it as rejected.
pub fn parse_batch(text: &str) -> Result<Vec<CaseRecord>, serde_json::Error> {
    let rows: Vec<BTreeMap<String, Value>> = serde_json::from_str(text)?;
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let row: BTreeMap<String, String> = row
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::Null => None,
                    Value::String(s) => Some((key, s)),
                    other => Some((key, other.to_string())),
                })
                .collect();
            CaseRecord::from_row(index, row).unwrap_or_else(|| {
                tracing::warn!(row = index + 1, field = CASE_NUMBER_FIELD, "row has no case number");
                CaseRecord::new(index, String::new())
            })
        })
        .collect())
}
