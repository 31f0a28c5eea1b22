use std::collections::HashSet;

use gridfeed_core::FeedResult;
use polars::prelude::*;
use serde_json::Value;

use super::transport::Record;

/// Concatenated records of every page, in page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    records: Vec<Record>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn append(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub fn into_frame(self) -> FeedResult<DataFrame> {
        records_to_frame(&self.records)
    }
}

impl From<Vec<Record>> for RawTable {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
}

/// Build a DataFrame from JSON records.
///
/// Columns appear in first-seen key order. A key missing from a record, or
/// holding `null`, becomes a null cell. Each column gets the narrowest type
/// that fits every value: Boolean, Int64, Float64, otherwise Utf8.
pub fn records_to_frame(records: &[Record]) -> FeedResult<DataFrame> {
    let mut names: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                names.push(key.as_str());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let cells: Vec<Option<&Value>> = records
                .iter()
                .map(|record| record.get(name).filter(|value| !value.is_null()))
                .collect();
            column_series(name, &cells)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn infer_kind(cells: &[Option<&Value>]) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in cells.iter().flatten() {
        let cell_kind = match value {
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Number(n) if n.as_i64().is_some() => ColumnKind::Integer,
            Value::Number(_) => ColumnKind::Float,
            _ => ColumnKind::Text,
        };
        kind = Some(match (kind, cell_kind) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn column_series(name: &str, cells: &[Option<&Value>]) -> Series {
    match infer_kind(cells) {
        ColumnKind::Boolean => {
            let values: Vec<Option<bool>> =
                cells.iter().map(|cell| cell.and_then(Value::as_bool)).collect();
            Series::new(name, values)
        }
        ColumnKind::Integer => {
            let values: Vec<Option<i64>> =
                cells.iter().map(|cell| cell.and_then(Value::as_i64)).collect();
            Series::new(name, values)
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> =
                cells.iter().map(|cell| cell.and_then(Value::as_f64)).collect();
            Series::new(name, values)
        }
        ColumnKind::Text => {
            let owned: Vec<Option<String>> = cells
                .iter()
                .map(|cell| {
                    cell.map(|value| match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                })
                .collect();
            let values: Vec<Option<&str>> = owned.iter().map(|v| v.as_deref()).collect();
            Series::new(name, values)
        }
    }
}
