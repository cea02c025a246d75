//! Table shaping
//!
//! [`TableData`] can only be built with rows as wide as its header, and the
//! same check runs when a table is deserialized from the cache.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One resource, positionally aligned with the header
pub type ResourceRecord = Vec<String>;

/// Label of the serial-number column that leads every header
pub const SERIAL_HEADER: &str = "SN";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("row {row} has {found} fields, header has {expected}")]
    WidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Header plus equal-width body rows
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct TableData {
    header: Vec<String>,
    body: Vec<ResourceRecord>,
}

/// Unchecked wire form
#[derive(Deserialize)]
struct RawTable {
    header: Vec<String>,
    body: Vec<ResourceRecord>,
}

impl TryFrom<RawTable> for TableData {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        TableData::new(raw.header, raw.body)
    }
}

impl TableData {
    /// Build a table, rejecting any row whose width differs from the header
    pub fn new(header: Vec<String>, body: Vec<ResourceRecord>) -> Result<Self, TableError> {
        check_widths(header.len(), &body)?;
        Ok(Self { header, body })
    }

    /// A table with a header and no rows
    pub fn empty(header: Vec<String>) -> Self {
        Self {
            header,
            body: Vec::new(),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn body(&self) -> &[ResourceRecord] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Column index for a header label
    pub fn column(&self, label: &str) -> Option<usize> {
        self.header.iter().position(|h| h == label)
    }

    /// Rewrite the first column as a 1-based index over the current rows
    pub fn renumber(&mut self) {
        if self.header.is_empty() {
            return;
        }
        for (i, row) in self.body.iter_mut().enumerate() {
            row[0] = (i + 1).to_string();
        }
    }

    /// Keep only rows whose `column` holds one of `values`, then renumber
    pub fn retain_matching(&mut self, column: usize, values: &[String]) {
        if column >= self.header.len() {
            return;
        }
        self.body
            .retain(|row| values.iter().any(|v| v.eq_ignore_ascii_case(&row[column])));
        self.renumber();
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<ResourceRecord>) {
        (self.header, self.body)
    }
}

fn check_widths(expected: usize, body: &[ResourceRecord]) -> Result<(), TableError> {
    match body.iter().position(|row| row.len() != expected) {
        Some(row) => Err(TableError::WidthMismatch {
            row,
            expected,
            found: body[row].len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> ResourceRecord {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn header() -> Vec<String> {
        row(&["SN", "Name", "Status"])
    }

    #[test]
    fn test_new_rejects_short_row() {
        let err = TableData::new(header(), vec![row(&["1", "a", "RUNNING"]), row(&["2", "b"])])
            .unwrap_err();
        assert_eq!(
            err,
            TableError::WidthMismatch {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_renumber_overwrites_serials() {
        let mut table = TableData::new(
            header(),
            vec![row(&["1", "a", "RUNNING"]), row(&["1", "b", "STOPPED"]), row(&["7", "c", "RUNNING"])],
        )
        .unwrap();
        table.renumber();
        let serials: Vec<&str> = table.body().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(serials, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_retain_matching_renumbers() {
        let mut table = TableData::new(
            header(),
            vec![row(&["1", "a", "STOPPED"]), row(&["2", "b", "RUNNING"])],
        )
        .unwrap();
        table.retain_matching(2, &["running".to_string()]);
        assert_eq!(table.body(), &[row(&["1", "b", "RUNNING"])]);
    }

    #[test]
    fn test_deserialize_rejects_width_mismatch() {
        let json = r#"{"header":["SN","Name"],"body":[["1","a"],["2"]]}"#;
        let result: Result<TableData, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let table = TableData::new(header(), vec![row(&["1", "a", "RUNNING"])]).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"header":["SN","Name","Status"],"body":[["1","a","RUNNING"]]}"#);
        let back: TableData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
