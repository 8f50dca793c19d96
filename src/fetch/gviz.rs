// src/fetch/gviz.rs
//
// Google visualization query endpoint (`/gviz/tq`): URL building and
// response unwrapping. The body is JS, not JSON:
//   /*O_o*/ google.visualization.Query.setResponse({...});

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::LookupError;
use crate::table::{CellValue, SheetTable};

pub const DOCS_BASE: &str = "https://docs.google.com/spreadsheets/d/";

/// Login pages or any HTML instead of the JS wrapper.
static AUTH_WALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Sign in|Inicia sesi[oó]n|google\.com/a/|<html")
        .expect("auth wall pattern should compile")
});

/// `<base><id>/gviz/tq`
fn tq_endpoint(base: &Url, spreadsheet_id: &str) -> Result<Url> {
    base.join(&format!("{}/gviz/tq", spreadsheet_id))
        .with_context(|| format!("building gviz URL for {}", spreadsheet_id))
}

/// Query text for the fast path: customer, balance, quantity and premium
/// (columns A, D, B, C) of the one row whose column A matches `key`.
pub fn filtered_query_text(key: &str) -> String {
    format!(
        "select A,D,B,C where lower(A) = lower('{}') limit 1",
        key.replace('\'', "\\'")
    )
}

pub fn filtered_url(base: &Url, spreadsheet_id: &str, sheet: &str, key: &str) -> Result<Url> {
    let mut url = tq_endpoint(base, spreadsheet_id)?;
    url.query_pairs_mut()
        .append_pair("tqx", "out:json")
        .append_pair("tq", &filtered_query_text(key))
        .append_pair("sheet", sheet);
    Ok(url)
}

pub fn full_url(base: &Url, spreadsheet_id: &str, sheet: &str) -> Result<Url> {
    let mut url = tq_endpoint(base, spreadsheet_id)?;
    url.query_pairs_mut()
        .append_pair("tqx", "out:json")
        .append_pair("sheet", sheet);
    Ok(url)
}

/// `<base><id>/export?format=csv&gid=<gid>`
pub fn csv_export_url(base: &Url, spreadsheet_id: &str, gid: &str) -> Result<Url> {
    let mut url = base
        .join(&format!("{}/export", spreadsheet_id))
        .with_context(|| format!("building export URL for {}", spreadsheet_id))?;
    url.query_pairs_mut()
        .append_pair("format", "csv")
        .append_pair("gid", gid);
    Ok(url)
}

pub fn looks_like_auth_wall(body: &str) -> bool {
    AUTH_WALL.is_match(body)
}

/// `<title>` of an HTML body, for logs.
fn page_title(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let sel = Selector::parse("title").ok()?;
    doc.select(&sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Cut the JSON object out of the wrapper: first `{` through last `}`.
pub fn extract_gviz_json(body: &str) -> Result<Value, LookupError> {
    let span = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => {
            if looks_like_auth_wall(body) {
                warn!(title = ?page_title(body), "gviz answered with a login page");
                return Err(LookupError::auth_wall());
            }
            return Err(LookupError::MalformedSource(
                "Respuesta GViz inválida (no se encontró JSON interno).".to_string(),
            ));
        }
    };
    serde_json::from_str(span).map_err(|e| {
        debug!(error = %e, "gviz JSON did not parse");
        LookupError::MalformedSource(format!("Respuesta GViz inválida: {}", e))
    })
}

#[derive(Debug, Deserialize)]
pub struct GvizResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub errors: Vec<GvizError>,
    #[serde(default)]
    pub table: Option<GvizTable>,
}

#[derive(Debug, Deserialize)]
pub struct GvizError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detailed_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GvizTable {
    #[serde(default)]
    pub cols: Vec<GvizCol>,
    #[serde(default)]
    pub rows: Vec<GvizRow>,
}

#[derive(Debug, Deserialize)]
pub struct GvizCol {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GvizRow {
    #[serde(default)]
    pub c: Vec<Option<GvizCell>>,
}

#[derive(Debug, Deserialize)]
pub struct GvizCell {
    #[serde(default)]
    pub v: Value,
}

impl GvizTable {
    pub fn into_sheet_table(self) -> SheetTable {
        let headers = self
            .cols
            .into_iter()
            .map(|c| c.label.unwrap_or_default())
            .collect();
        let rows = self
            .rows
            .into_iter()
            .map(|r| {
                r.c.into_iter()
                    .map(|cell| cell.map(|c| CellValue::from(c.v)).unwrap_or_default())
                    .collect()
            })
            .collect();
        SheetTable::new(headers, rows)
    }
}

/// Unwrap a raw gviz body into a table.
pub fn parse_gviz_body(body: &str) -> Result<SheetTable, LookupError> {
    let value = extract_gviz_json(body)?;
    let resp: GvizResponse = serde_json::from_value(value)
        .map_err(|e| LookupError::MalformedSource(format!("Respuesta GViz inválida: {}", e)))?;

    if resp.status.as_deref() == Some("error") {
        let detail = resp
            .errors
            .into_iter()
            .next()
            .and_then(|e| e.detailed_message.or(e.message))
            .unwrap_or_else(|| "error desconocido".to_string());
        return Err(LookupError::MalformedSource(format!(
            "La consulta GViz falló: {}",
            detail
        )));
    }

    Ok(resp
        .table
        .map(GvizTable::into_sheet_table)
        .unwrap_or_default())
}
