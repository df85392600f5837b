//! Tabular dataset loading.
//!
//! Reads a CSV file with a header row into a [`RawTable`]. Every cell is kept as
//! text; empty cells become `None` so formatters can treat them as null.

use crate::error::{TrainingError, TrainingResult};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// One input row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Zero-based position in the source file (header excluded).
    pub index: usize,
    fields: BTreeMap<String, Option<String>>,
}

impl RawRecord {
    #[must_use]
    pub fn new(index: usize, fields: BTreeMap<String, Option<String>>) -> Self {
        Self { index, fields }
    }

    /// Non-null cell value for `column`, or `None` when the column is absent or
    /// the cell is empty.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fails with `DataLoad` naming every missing column.
    pub fn require_columns(&self, columns: &[&str]) -> TrainingResult<()> {
        let missing: Vec<&str> = columns.iter().copied().filter(|c| !self.has_column(c)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(TrainingError::DataLoad(format!(
            "missing required column(s) {:?}; available: {:?}",
            missing, self.headers
        )))
    }
}

/// Parse CSV bytes (header row required) into a table.
pub fn load_csv_bytes(bytes: &[u8]) -> TrainingResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| TrainingError::DataLoad(format!("failed to read CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(TrainingError::DataLoad("CSV header row is empty".to_string()));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            TrainingError::DataLoad(format!("malformed CSV record {}: {e}", index + 1))
        })?;
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| {
                let v = v.trim();
                (h.clone(), if v.is_empty() { None } else { Some(v.to_string()) })
            })
            .collect();
        rows.push(RawRecord::new(index, fields));
    }

    info!(rows = rows.len(), columns = headers.len(), "loaded dataset");
    Ok(RawTable { headers, rows })
}

pub fn load_csv_path(path: &Path) -> TrainingResult<RawTable> {
    let bytes = std::fs::read(path).map_err(|e| {
        TrainingError::DataLoad(format!("cannot read dataset '{}': {e}", path.display()))
    })?;
    load_csv_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_csv_bytes_maps_empty_cells_to_none() {
        let csv = "sentence,translation\nHello there,There hello\nBye,\n";
        let table = load_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["sentence", "translation"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].get("translation"), Some("There hello"));
        assert_eq!(table.rows[1].get("translation"), None);
        assert_eq!(table.rows[1].index, 1);
    }

    #[test]
    fn test_malformed_record_is_data_load_error() {
        let csv = "a,b\n1,2\n3,4,5\n";
        let err = load_csv_bytes(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, TrainingError::DataLoad(_)));
    }

    #[test]
    fn test_missing_file_is_data_load_error() {
        let err = load_csv_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, TrainingError::DataLoad(_)));
    }

    #[test]
    fn test_require_columns_lists_missing() {
        let table = load_csv_bytes(b"food,Protein\napple,0.3\n").unwrap();
        assert!(table.require_columns(&["food"]).is_ok());
        let err = table.require_columns(&["food", "sentence"]).unwrap_err();
        assert!(err.to_string().contains("sentence"));
    }
}
