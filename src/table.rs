// src/table.rs

use serde_json::Value;
use std::fmt;

use crate::normalize::canonicalize;

/// A cell as the source delivered it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Display text; numbers print without a trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<Value> for CellValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
            Value::String(s) => CellValue::Text(s),
            // gviz never nests; keep whatever it is as text
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Headers plus rows; every row is exactly `headers.len()` wide.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    /// Pads short rows with `Empty` and truncates long ones.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// First record is the header line.
    pub fn from_records(mut records: Vec<Vec<String>>) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let headers = records.remove(0);
        let rows = records
            .into_iter()
            .map(|r| r.into_iter().map(CellValue::Text).collect())
            .collect();
        Self::new(headers, rows)
    }

    /// First row whose `column` cell canonicalizes to `canon_key`.
    pub fn find_row(&self, column: usize, canon_key: &str) -> Option<&[CellValue]> {
        self.rows
            .iter()
            .find(|row| {
                row.get(column)
                    .map(|cell| canonicalize(&cell.as_text()) == canon_key)
                    .unwrap_or(false)
            })
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const CUSTOMER_ALIASES: &[&str] = &["cliente", "patente"];
const BALANCE_ALIASES: &[&str] = &["saldo"];
const QUANTITY_ALIASES: &[&str] = &[
    "sumadecantidad",
    "suma de cantidad",
    "sumadesumadecantidad",
    "cantidad",
];
const PREMIUM_ALIASES: &[&str] = &[
    "sumadecantmetropremio",
    "suma de cantmetropremio",
    "sumadesumadecantmetropremio",
    "metropremio",
    "premio",
];

/// Header positions of the four logical fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnIndexMap {
    pub customer: Option<usize>,
    pub balance: Option<usize>,
    pub quantity: Option<usize>,
    pub premium: Option<usize>,
}

impl ColumnIndexMap {
    /// Customer plus either balance or both quantity and premium.
    pub fn is_usable(&self) -> bool {
        self.customer.is_some()
            && (self.balance.is_some() || (self.quantity.is_some() && self.premium.is_some()))
    }
}

/// Map the logical fields onto `headers` by alias. A header matches when its
/// canonical form equals or contains a canonical alias; first header wins.
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> ColumnIndexMap {
    let canon: Vec<String> = headers.iter().map(|h| canonicalize(h.as_ref())).collect();
    ColumnIndexMap {
        customer: find_column(&canon, CUSTOMER_ALIASES),
        balance: find_column(&canon, BALANCE_ALIASES),
        quantity: find_column(&canon, QUANTITY_ALIASES),
        premium: find_column(&canon, PREMIUM_ALIASES),
    }
}

fn find_column(canon_headers: &[String], aliases: &[&str]) -> Option<usize> {
    let aliases: Vec<String> = aliases.iter().map(|a| canonicalize(a)).collect();
    canon_headers
        .iter()
        .position(|h| aliases.iter().any(|a| h == a || h.contains(a.as_str())))
}
