// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use tracing::debug;

pub const DEFAULT_SPREADSHEET_ID: &str = "1JJ4XmL9UAO8PkdS3C3fjYIIfnHNtlKZ4jcW2sJMuDJk";
pub const DEFAULT_SHEET_NAME: &str = "SaldoMts";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Env var holding the path of a YAML config file.
pub const CONFIG_PATH_VAR: &str = "SALDO_CONFIG";

/// Where the "last updated" stamp comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimestampSource {
    /// `Last-Modified` header of a gviz response.
    #[default]
    Header,
    /// Drive v3 file metadata (`modifiedTime`).
    DriveApi { api_key: String },
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    /// Tab name used by the gviz queries.
    pub sheet_name: String,
    /// Tab gid; enables the CSV export fallback when set.
    pub sheet_gid: Option<String>,
    /// Try the server-side filtered query first.
    pub use_gviz: bool,
    /// Keep the full table in memory after the first full fetch.
    pub cache_full_table: bool,
    pub timeout_secs: u64,
    pub timestamp: TimestampSource,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            sheet_gid: None,
            use_gviz: true,
            cache_full_table: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            timestamp: TimestampSource::default(),
        }
    }
}

impl SheetConfig {
    /// YAML file (explicit path, else `$SALDO_CONFIG`, else defaults), then
    /// `SALDO_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = env::var(CONFIG_PATH_VAR).ok();
        let path = path.or_else(|| from_env.as_deref().map(Path::new));

        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let cfg: Self =
            serde_yaml::from_str(&text).with_context(|| format!("parsing config {:?}", path))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(cfg)
    }

    /// Apply `SALDO_*` overrides; `lookup` resolves a variable name.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SALDO_SPREADSHEET_ID") {
            self.spreadsheet_id = v;
        }
        if let Some(v) = lookup("SALDO_SHEET_NAME") {
            self.sheet_name = v;
        }
        if let Some(v) = lookup("SALDO_SHEET_GID") {
            self.sheet_gid = Some(v).filter(|g| !g.trim().is_empty());
        }
        if let Some(v) = lookup("SALDO_USE_GVIZ") {
            self.use_gviz = parse_bool(&v)
                .with_context(|| format!("SALDO_USE_GVIZ: expected a boolean, got {:?}", v))?;
        }
        if let Some(v) = lookup("SALDO_CACHE") {
            self.cache_full_table = parse_bool(&v)
                .with_context(|| format!("SALDO_CACHE: expected a boolean, got {:?}", v))?;
        }
        if let Some(v) = lookup("SALDO_TIMEOUT_SECS") {
            self.timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("SALDO_TIMEOUT_SECS: {:?}", v))?;
        }
        if let Some(v) = lookup("SALDO_DRIVE_API_KEY") {
            self.timestamp = TimestampSource::DriveApi { api_key: v };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            bail!("spreadsheet_id must not be empty");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if let TimestampSource::DriveApi { api_key } = &self.timestamp {
            if api_key.trim().is_empty() {
                bail!("drive_api timestamp source needs an api_key");
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
