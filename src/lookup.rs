// src/lookup.rs

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::TableCache;
use crate::config::SheetConfig;
use crate::error::LookupError;
use crate::fetch::SheetSource;
use crate::normalize::canonicalize;
use crate::number::parse_locale_number;
use crate::table::{resolve_columns, CellValue, ColumnIndexMap, SheetTable};

const FULL_COLUMNS_MISSING: &str =
    "La hoja no contiene las columnas necesarias (Cliente y Saldo o Cantidad+MetroPremio).";
const CSV_COLUMNS_MISSING: &str = "La hoja CSV no contiene las columnas necesarias.";

/// Column order of the filtered query (`select A,D,B,C`).
const FILTERED_COLUMNS: ColumnIndexMap = ColumnIndexMap {
    customer: Some(0),
    balance: Some(1),
    quantity: Some(2),
    premium: Some(3),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    FilteredQuery,
    FullQuery,
    CsvExport,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::FilteredQuery => "filtered-query",
            Tier::FullQuery => "full-query",
            Tier::CsvExport => "csv-export",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRecord {
    pub customer_label: String,
    pub balance: f64,
    /// Tier that produced the row.
    pub tier: Tier,
}

/// Trim and uppercase.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Direct balance when it parses, else `quantity - premium` with
/// unparsable operands counted as zero.
pub fn compute_balance(row: &[CellValue], idx: &ColumnIndexMap) -> f64 {
    let number_at = |i: Option<usize>| i.and_then(|i| row.get(i)).and_then(parse_locale_number);

    number_at(idx.balance).unwrap_or_else(|| {
        number_at(idx.quantity).unwrap_or(0.0) - number_at(idx.premium).unwrap_or(0.0)
    })
}

/// Scan `table` for the first row whose customer cell matches `canon_key`.
fn scan_table(
    table: &SheetTable,
    canon_key: &str,
    tier: Tier,
    missing_columns: &str,
) -> Result<Option<BalanceRecord>, LookupError> {
    let idx = resolve_columns(table.headers.as_slice());
    let customer = match idx.customer {
        Some(c) if idx.is_usable() => c,
        _ => {
            warn!(%tier, headers = ?table.headers, "required columns not found");
            return Err(LookupError::MalformedSource(missing_columns.to_string()));
        }
    };

    Ok(table.find_row(customer, canon_key).map(|row| BalanceRecord {
        customer_label: row[customer].as_text(),
        balance: compute_balance(row, &idx),
        tier,
    }))
}

/// Runs the three fallback tiers against a [`SheetSource`].
pub struct BalanceLookup<S> {
    source: S,
    use_filtered: bool,
    cache: Option<TableCache>,
}

impl<S: SheetSource> BalanceLookup<S> {
    /// Filtered query on, no cache.
    pub fn new(source: S) -> Self {
        Self {
            source,
            use_filtered: true,
            cache: None,
        }
    }

    pub fn from_config(source: S, config: &SheetConfig) -> Self {
        Self::new(source)
            .with_filtered_query(config.use_gviz)
            .with_cache(config.cache_full_table)
    }

    pub fn with_filtered_query(mut self, enabled: bool) -> Self {
        self.use_filtered = enabled;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(TableCache::new);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> Option<&TableCache> {
        self.cache.as_ref()
    }

    /// Find the balance for `raw_key`. `Ok(None)` means no row matched.
    ///
    /// Errors from the filtered and full queries are swallowed so the next
    /// tier can run; an error from the CSV export surfaces. When the export
    /// is not configured and every earlier tier failed, the most specific of
    /// those failures surfaces instead of a plain "not found".
    #[instrument(level = "info", skip(self))]
    pub async fn lookup(&self, raw_key: &str) -> Result<Option<BalanceRecord>, LookupError> {
        let key = normalize_key(raw_key);
        if key.is_empty() {
            return Err(LookupError::EmptyInput);
        }
        let canon_key = canonicalize(&key);
        // only punctuation: it would match every blank customer cell
        if canon_key.is_empty() {
            info!(key = %key, "key has no letters or digits");
            return Ok(None);
        }

        let mut failures: Vec<LookupError> = Vec::new();
        let mut answered = false;

        if self.use_filtered {
            match self.filtered(&key).await {
                Ok(Some(rec)) => return Ok(Some(rec)),
                Ok(None) => answered = true,
                Err(e) => {
                    debug!(tier = %Tier::FilteredQuery, error = %e, "falling back");
                    failures.push(e);
                }
            }
        }

        match self.full(&canon_key).await {
            Ok(Some(rec)) => return Ok(Some(rec)),
            Ok(None) => answered = true,
            Err(e) => {
                debug!(tier = %Tier::FullQuery, error = %e, "falling back");
                failures.push(e);
            }
        }

        match self.source.csv_export().await {
            Ok(Some(table)) => {
                let found = scan_table(&table, &canon_key, Tier::CsvExport, CSV_COLUMNS_MISSING)?;
                log_outcome(&key, found.as_ref());
                return Ok(found);
            }
            Ok(None) => debug!(tier = %Tier::CsvExport, "skipped, no gid configured"),
            Err(e) => {
                warn!(tier = %Tier::CsvExport, error = %e, "last tier failed");
                return Err(e);
            }
        }

        if !answered {
            if let Some(err) = most_specific(failures) {
                warn!(error = %err, "every tier failed");
                return Err(err);
            }
        }
        log_outcome(&key, None);
        Ok(None)
    }

    /// Last-modified stamp of the sheet, if the source knows it.
    pub async fn modified_time(&self) -> Option<DateTime<Utc>> {
        self.source.modified_time().await
    }

    async fn filtered(&self, key: &str) -> Result<Option<BalanceRecord>, LookupError> {
        let table = self.source.filtered_query(key).await?;
        let found = table.rows.first().map(|row| BalanceRecord {
            customer_label: row.first().map(CellValue::as_text).unwrap_or_default(),
            balance: compute_balance(row, &FILTERED_COLUMNS),
            tier: Tier::FilteredQuery,
        });
        if found.is_some() {
            log_outcome(key, found.as_ref());
        }
        Ok(found)
    }

    async fn full(&self, canon_key: &str) -> Result<Option<BalanceRecord>, LookupError> {
        let table = self.full_table().await?;
        let found = scan_table(&table, canon_key, Tier::FullQuery, FULL_COLUMNS_MISSING)?;
        if found.is_some() {
            log_outcome(canon_key, found.as_ref());
        }
        Ok(found)
    }

    async fn full_table(&self) -> Result<Arc<SheetTable>, LookupError> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.source.full_query().await?));
        };
        if let Some(table) = cache.get() {
            debug!(rows = table.rows.len(), "full table from cache");
            return Ok(table);
        }
        let table = self.source.full_query().await?;
        Ok(cache.store(table))
    }
}

fn most_specific(failures: Vec<LookupError>) -> Option<LookupError> {
    failures.into_iter().fold(None, |best, e| match best {
        Some(b) if b.specificity() >= e.specificity() => Some(b),
        _ => Some(e),
    })
}

fn log_outcome(key: &str, found: Option<&BalanceRecord>) {
    match found {
        Some(rec) => info!(key, tier = %rec.tier, balance = rec.balance, "balance found"),
        None => info!(key, "no matching row"),
    }
}
