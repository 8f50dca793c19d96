// src/fetch/modified.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

pub const DRIVE_FILES_BASE: &str = "https://www.googleapis.com/drive/v3/files/";

/// `Last-Modified: Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_last_modified(header: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(header.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    modified_time: String,
}

pub fn drive_metadata_url(base: &Url, spreadsheet_id: &str, api_key: &str) -> Result<Url> {
    let mut url = base
        .join(spreadsheet_id)
        .with_context(|| format!("building Drive URL for {}", spreadsheet_id))?;
    url.query_pairs_mut()
        .append_pair("fields", "modifiedTime")
        .append_pair("key", api_key);
    Ok(url)
}

/// Ask Drive for the file's `modifiedTime`.
pub async fn fetch_drive_modified_time(client: &Client, url: &Url) -> Result<DateTime<Utc>> {
    debug!(path = url.path(), "fetching drive metadata");
    let file: DriveFile = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url.path()))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url.path()))?
        .json()
        .await
        .context("decoding drive metadata")?;

    let dt = DateTime::parse_from_rfc3339(&file.modified_time)
        .with_context(|| format!("bad modifiedTime {:?}", file.modified_time))?;
    Ok(dt.with_timezone(&Utc))
}
