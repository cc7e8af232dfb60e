use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse category of a result column, derived from the driver type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
    Temporal,
    Boolean,
    Other,
}

impl ColumnKind {
    /// Map a Postgres type name (as reported by the driver) to a kind.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "BIGINT" | "FLOAT4" | "FLOAT8"
            | "REAL" | "DOUBLE PRECISION" | "NUMERIC" | "DECIMAL" | "MONEY" | "OID" => {
                ColumnKind::Numeric
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" | "UUID" => ColumnKind::Text,
            "DATE" | "TIME" | "TIMETZ" | "TIMESTAMP" | "TIMESTAMPTZ" | "INTERVAL" => {
                ColumnKind::Temporal
            }
            "BOOL" | "BOOLEAN" => ColumnKind::Boolean,
            _ => ColumnKind::Other,
        }
    }
}

/// Column name and type as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub name: String,
    pub type_name: String,
    pub kind: ColumnKind,
}

impl ColumnHeader {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let kind = ColumnKind::from_type_name(&type_name);
        Self {
            name: name.into(),
            type_name,
            kind,
        }
    }
}

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(value) => Some(*value as f64),
            CellValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Int(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Text(value) => write!(f, "{value}"),
            CellValue::Json(value) => write!(f, "{value}"),
        }
    }
}

/// Summary statistics of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Ordered rows plus column headers, in the order produced by the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnHeader>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|col| col.name.as_str()).collect()
    }

    /// First `n` rows, preserving order.
    pub fn head(&self, n: usize) -> ResultSet {
        ResultSet {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Keep only the first `n` rows in place.
    pub fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// Indexes of numeric columns.
    ///
    /// A column counts as numeric when its declared type is numeric, or when
    /// its type is unknown and every non-null value decoded as a number.
    pub fn numeric_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, header)| match header.kind {
                ColumnKind::Numeric => true,
                ColumnKind::Other => {
                    let mut values = self.rows.iter().filter_map(|row| row.get(*idx));
                    let mut seen = false;
                    let all_numeric = values.all(|cell| {
                        if cell.is_null() {
                            return true;
                        }
                        seen = true;
                        cell.as_f64().is_some()
                    });
                    seen && all_numeric
                }
                _ => false,
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// count/mean/min/max over the non-null numeric values of a column.
    pub fn numeric_stats(&self, column: usize) -> Option<ColumnStats> {
        let values: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|row| row.get(column).and_then(CellValue::as_f64))
            .collect();
        if values.is_empty() {
            return None;
        }
        let sum: f64 = values.iter().sum();
        Some(ColumnStats {
            count: values.len(),
            mean: sum / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Aligned plain-text table of the first `limit` rows.
    pub fn format_table(&self, limit: usize) -> String {
        let header: Vec<String> = self.columns.iter().map(|col| col.name.clone()).collect();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|name| name.chars().count()).collect();
        for row in &body {
            for (idx, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(idx) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}", width = *width))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut lines = Vec::with_capacity(body.len() + 2);
        lines.push(line(header.as_slice()));
        lines.push(
            widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        lines.extend(body.iter().map(|row| line(row.as_slice())));
        lines.join("\n")
    }

    /// Rows as JSON objects keyed by column name.
    pub fn rows_as_json(&self, limit: usize) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(header, cell)| {
                        let value = serde_json::to_value(cell).unwrap_or(serde_json::Value::Null);
                        (header.name.clone(), value)
                    })
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect()
    }
}
