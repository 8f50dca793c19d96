// src/fetch/mod.rs

pub mod gviz;
pub mod modified;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{header::LAST_MODIFIED, Client};
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{SheetConfig, TimestampSource};
use crate::csv::parse_csv;
use crate::error::LookupError;
use crate::table::SheetTable;

/// Where the lookup gets its tables from, one method per fallback tier.
pub trait SheetSource {
    /// Server-side filtered query. Columns come back as customer, balance,
    /// quantity, premium; at most one row.
    fn filtered_query(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<SheetTable, LookupError>> + Send;

    /// Whole sheet, all columns, with headers.
    fn full_query(&self) -> impl Future<Output = Result<SheetTable, LookupError>> + Send;

    /// CSV export; `Ok(None)` when this source has no export configured.
    fn csv_export(&self) -> impl Future<Output = Result<Option<SheetTable>, LookupError>> + Send;

    /// When the sheet was last changed, if known.
    fn modified_time(&self) -> impl Future<Output = Option<DateTime<Utc>>> + Send;
}

/// `SheetSource` backed by the public Google Sheets endpoints.
pub struct HttpSheetSource {
    client: Client,
    config: SheetConfig,
    docs_base: Url,
    drive_base: Url,
    last_modified: Mutex<Option<DateTime<Utc>>>,
}

impl HttpSheetSource {
    pub fn new(config: SheetConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("saldo_lookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            config,
            docs_base: Url::parse(gviz::DOCS_BASE)?,
            drive_base: Url::parse(modified::DRIVE_FILES_BASE)?,
            last_modified: Mutex::new(None),
        })
    }

    /// Point the source at other hosts. Both bases must end with `/`.
    pub fn with_base_urls(mut self, docs_base: Url, drive_base: Url) -> Self {
        self.docs_base = docs_base;
        self.drive_base = drive_base;
        self
    }

    /// `Last-Modified` of the most recent gviz answer that carried one.
    fn captured_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified.lock().ok().and_then(|slot| *slot)
    }

    fn remember_modified(&self, modified: Option<DateTime<Utc>>) {
        let Some(dt) = modified else { return };
        if let Ok(mut slot) = self.last_modified.lock() {
            *slot = Some(dt);
        }
    }

    /// Body of a 2xx response plus its parsed `Last-Modified`, if any.
    async fn get_text(
        &self,
        url: &Url,
    ) -> Result<(String, Option<DateTime<Utc>>), LookupError> {
        debug!(path = url.path(), "GET");
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        let modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(modified::parse_last_modified);

        let body = resp
            .text()
            .await
            .with_context(|| format!("Reading text from {}", url))?;

        if !status.is_success() {
            if gviz::looks_like_auth_wall(&body) {
                return Err(LookupError::auth_wall());
            }
            return Err(LookupError::SourceUnavailable(format!(
                "La hoja respondió {} ({})",
                status,
                url.path()
            )));
        }
        Ok((body, modified))
    }

    /// Fetch and parse a gviz answer. The timestamp is kept only once the
    /// payload parsed.
    async fn gviz_table(&self, url: &Url) -> Result<SheetTable, LookupError> {
        let (body, modified) = self.get_text(url).await?;
        let table = gviz::parse_gviz_body(&body)?;
        self.remember_modified(modified);
        Ok(table)
    }
}

impl SheetSource for HttpSheetSource {
    #[instrument(level = "debug", skip(self))]
    async fn filtered_query(&self, key: &str) -> Result<SheetTable, LookupError> {
        let url = gviz::filtered_url(
            &self.docs_base,
            &self.config.spreadsheet_id,
            &self.config.sheet_name,
            key,
        )?;
        self.gviz_table(&url).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn full_query(&self) -> Result<SheetTable, LookupError> {
        let url = gviz::full_url(
            &self.docs_base,
            &self.config.spreadsheet_id,
            &self.config.sheet_name,
        )?;
        self.gviz_table(&url).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn csv_export(&self) -> Result<Option<SheetTable>, LookupError> {
        let Some(gid) = self.config.sheet_gid.as_deref() else {
            return Ok(None);
        };
        let url = gviz::csv_export_url(&self.docs_base, &self.config.spreadsheet_id, gid)?;
        // the export's Last-Modified is not the sheet's edit time
        let (body, _) = self.get_text(&url).await?;

        // a private sheet redirects to an HTML login page with status 200
        if body.trim_start().starts_with('<') {
            return Err(LookupError::auth_wall());
        }
        Ok(Some(SheetTable::from_records(parse_csv(&body))))
    }

    async fn modified_time(&self) -> Option<DateTime<Utc>> {
        match &self.config.timestamp {
            TimestampSource::Header => self.captured_modified(),
            TimestampSource::DriveApi { api_key } => {
                let url = modified::drive_metadata_url(
                    &self.drive_base,
                    &self.config.spreadsheet_id,
                    api_key,
                )
                .ok()?;
                match modified::fetch_drive_modified_time(&self.client, &url).await {
                    Ok(dt) => Some(dt),
                    Err(e) => {
                        warn!(error = %e, "no modified time");
                        None
                    }
                }
            }
            TimestampSource::Disabled => None,
        }
    }
}
