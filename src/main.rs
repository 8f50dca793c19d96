use anyhow::{bail, Context, Result};
use clap::Parser;
use saldo_lookup::{
    view::{self, key_from_url, sanitize_input, url_with_key},
    BalanceLookup, HttpSheetSource, LookupError, SheetConfig,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(author, version, about = "Consulta el saldo de una patente en la hoja publicada")]
struct Args {
    /// Plate to look up; whitespace is ignored
    key: Option<String>,
    /// Page URL carrying `?patente=`; the key is read from it when KEY is absent
    #[arg(long)]
    url: Option<Url>,
    /// YAML config file (defaults to $SALDO_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Also print which tier answered
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ─── 2) config + key ─────────────────────────────────────────────
    let config = SheetConfig::load(args.config.as_deref()).context("loading configuration")?;
    let key = match (&args.key, &args.url) {
        (Some(k), _) => sanitize_input(k),
        (None, Some(u)) => key_from_url(u).map(|k| sanitize_input(&k)).unwrap_or_default(),
        (None, None) => bail!("pasá una patente o una --url con ?patente="),
    };
    info!(key = %key, sheet = %config.sheet_name, "lookup");

    // ─── 3) lookup ───────────────────────────────────────────────────
    let source = HttpSheetSource::new(config.clone())?;
    let lookup = BalanceLookup::from_config(source, &config);

    match lookup.lookup(&key).await {
        Ok(Some(rec)) => {
            let modified = lookup.modified_time().await;
            println!("{}", view::render_record(&key, &rec, modified.as_ref()));
            if args.verbose {
                println!("({}: {})", rec.tier, rec.customer_label);
            }
            if let Some(u) = &args.url {
                println!("{}", url_with_key(u, &key));
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => {
            println!("{}", view::not_found_message(&key));
            Ok(ExitCode::from(1))
        }
        Err(e) => {
            if !matches!(e, LookupError::EmptyInput) {
                error!(error = ?e, "lookup failed");
            }
            eprintln!("{}", e);
            Ok(ExitCode::from(2))
        }
    }
}
