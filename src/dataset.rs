//! In-memory tables loaded from CSV sources.
//!
//! A [`Table`] is read once and never mutated; every query returns a fresh
//! table built from cloned rows.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::Path;

use rand::Rng;
use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::fetch;
use crate::spreadsheet;

/// Message returned instead of rows when a sample is larger than the table.
pub const OVERSIZED_SAMPLE_MESSAGE: &str = "dataset has less row than n_rows you entered.";

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Types a raw CSV cell. Missing markers become [`Value::Null`].
    pub fn parse_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "" | "NA" | "NaN" | "nan" | "null" | "None" => return Value::Null,
            _ => {}
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        match trimmed.parse::<f64>() {
            // -0.0 and 0.0 are one value
            Ok(f) if f.is_finite() => Value::Float(f + 0.0),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Exact string match against a user-supplied category.
    ///
    /// Booleans also accept the capitalised `True`/`False` spelling.
    pub fn matches_category(&self, category: &str) -> bool {
        match self {
            Value::Null => false,
            Value::Text(s) => s == category,
            Value::Bool(b) => {
                let (lower, upper) = if *b { ("true", "True") } else { ("false", "False") };
                category == lower || category == upper
            }
            Value::Int(i) => i.to_string() == category,
            Value::Float(f) => f.to_string() == category,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
        }
    }

    /// Total order used to sort group keys.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) if a.type_rank() == 2 && b.type_rank() == 2 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => (f + 0.0).to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

/// Options applied while decoding a CSV source.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Drop the leading column, which holds a row index rather than data.
    pub index_column: bool,
}

/// Result of a lenient operation: either data or an advisory message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Data(T),
    Advisory(String),
}

impl<T> Outcome<T> {
    pub fn advisory(message: impl Into<String>) -> Self {
        Outcome::Advisory(message.into())
    }

    pub fn is_advisory(&self) -> bool {
        matches!(self, Outcome::Advisory(_))
    }

    pub fn data(self) -> Option<T> {
        match self {
            Outcome::Data(t) => Some(t),
            Outcome::Advisory(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Data(_) => None,
            Outcome::Advisory(m) => Some(m),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Outcome::Data(t) => t.serialize(serializer),
            Outcome::Advisory(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

/// Column-ordered, row-major table of typed cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table; every row must have one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(AnalyticsError::ParseError(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        let mut table = Table { columns, rows };
        table.unify_numeric_columns();
        Ok(table)
    }

    /// An empty table sharing this table's columns.
    pub fn empty_like(&self) -> Self {
        Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    /// Reads a CSV file or a workbook's first sheet from disk.
    pub fn load(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnalyticsError::not_found(path.display().to_string()));
        }
        let bytes = std::fs::read(path)
            .map_err(|_| AnalyticsError::not_found(path.display().to_string()))?;
        let table = Self::decode(&path.to_string_lossy(), bytes, options)?;
        debug!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns.len(),
            "Table loaded"
        );
        Ok(table)
    }

    /// Reads a source that is either a local path or an `http(s)` URL.
    #[tracing::instrument(skip(options))]
    pub async fn load_source(source: &str, options: LoadOptions) -> Result<Self> {
        if !fetch::is_remote(source) {
            return Self::load(source, options);
        }
        let bytes = fetch::read_source(source).await?;
        Self::decode(source, bytes, options)
    }

    fn decode(source: &str, bytes: Vec<u8>, options: LoadOptions) -> Result<Self> {
        let csv = spreadsheet::csv_bytes(source, bytes)?;
        Self::from_reader(csv.as_slice(), options)
    }

    /// Decodes CSV content with a header row.
    pub fn from_reader<R: Read>(reader: R, options: LoadOptions) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let skip = usize::from(options.index_column);

        let columns: Vec<String> = rdr.headers()?.iter().skip(skip).map(str::to_string).collect();
        if columns.is_empty() {
            return Err(AnalyticsError::ParseError("source has no columns".into()));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().skip(skip).map(Value::parse_cell).collect());
        }

        Self::new(columns, rows)
    }

    /// Column names in source order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column`, or [`AnalyticsError::UnknownColumn`].
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| AnalyticsError::UnknownColumn(column.to_string()))
    }

    /// Cells of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// A column is numeric when it has at least one value and every
    /// non-null value is a number or a boolean.
    pub fn is_numeric(&self, index: usize) -> bool {
        let mut seen = false;
        for value in self.column_values(index) {
            match value {
                Value::Null => {}
                Value::Text(_) => return false,
                _ => seen = true,
            }
        }
        seen
    }

    /// Distinct values of `column` in first-seen order.
    pub fn unique_values(&self, column: &str) -> Result<Vec<Value>> {
        let idx = self.column_index(column)?;
        let mut seen = HashSet::new();
        Ok(self
            .column_values(idx)
            .filter(|v| seen.insert(*v))
            .cloned()
            .collect())
    }

    /// Copies the rows at `indices`, in that order.
    pub fn select(&self, indices: impl IntoIterator<Item = usize>) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.into_iter().map(|i| self.rows[i].clone()).collect(),
        }
    }

    /// Copies the rows matching `predicate`.
    pub fn filter_rows(&self, predicate: impl Fn(&[Value]) -> bool) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// `n` rows drawn uniformly without replacement.
    ///
    /// Asking for more rows than the table holds is not an error: the
    /// caller gets an advisory message instead.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Outcome<Table> {
        if n > self.len() {
            return Outcome::advisory(OVERSIZED_SAMPLE_MESSAGE);
        }
        let picked = rand::seq::index::sample(rng, self.len(), n);
        Outcome::Data(self.select(picked))
    }

    /// Promotes integer cells to floats in columns that mix both.
    fn unify_numeric_columns(&mut self) {
        for idx in 0..self.columns.len() {
            let has_float = self.column_values(idx).any(|v| matches!(v, Value::Float(_)));
            if !has_float {
                continue;
            }
            for row in &mut self.rows {
                if let Value::Int(i) = row[idx] {
                    row[idx] = Value::Float(i as f64);
                }
            }
        }
    }
}

impl Serialize for Table {
    /// Serializes as a list of records, keeping column order.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Record<'a>(&'a [String], &'a [Value]);

        impl Serialize for Record<'_> {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (column, value) in self.0.iter().zip(self.1) {
                    map.serialize_entry(column, value)?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&Record(&self.columns, row))?;
        }
        seq.end()
    }
}
