use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nifdata_core::{Nif, check_digit};
use nifdata_sources::http::DEFAULT_VIES_REQUESTER;
use nifdata_sources::{HttpConfig, build_sources};
use nifdata_store::{FsStore, LookupError, RecordCache};

/// Rejected before the cache is consulted.
const EXIT_INVALID: u8 = 2;
const EXIT_NOT_FOUND: u8 = 3;

#[derive(Parser)]
#[command(name = "nifdata", version, about = "Look up Portuguese businesses by NIF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a NIF to its business record and print it as JSON.
    Lookup {
        nif: String,

        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        config: Config,
    },
    /// Check a NIF's prefix and check digit without looking it up.
    Check { nif: String },
}

#[derive(Args)]
struct Config {
    /// Root of the sharded record cache.
    #[arg(long, env = "NIFDATA_CACHE_DIR", default_value = "nif")]
    cache_dir: PathBuf,

    /// Minimum seconds between requests to each scraped site.
    #[arg(long, env = "NIFDATA_COOL_DOWN_SECS", default_value_t = 60)]
    cool_down_secs: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "NIFDATA_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// VAT number sent to VIES as the requester.
    #[arg(long, env = "NIFDATA_VIES_REQUESTER", default_value = DEFAULT_VIES_REQUESTER)]
    vies_requester: String,
}

impl Config {
    fn http(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            cool_down: Duration::from_secs(self.cool_down_secs),
            vies_requester: self.vies_requester.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::debug!("nifdata v{}", env!("CARGO_PKG_VERSION"));

    match Cli::parse().command {
        Command::Check { nif } => Ok(check(&nif)),
        Command::Lookup {
            nif,
            pretty,
            config,
        } => lookup(&nif, pretty, &config).await,
    }
}

fn check(raw: &str) -> ExitCode {
    match Nif::checked(raw) {
        Ok(nif) => {
            println!("{nif} is valid");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            if let Some(digit) = check_digit(raw) {
                eprintln!("  expected check digit: {digit}");
            }
            ExitCode::from(EXIT_INVALID)
        }
    }
}

async fn lookup(raw: &str, pretty: bool, config: &Config) -> anyhow::Result<ExitCode> {
    let nif = match Nif::checked(raw) {
        Ok(nif) => nif,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::from(EXIT_INVALID));
        }
    };

    let sources = build_sources(&config.http()).context("building HTTP sources")?;
    let cache = RecordCache::new(FsStore::new(&config.cache_dir), sources);

    let bytes = match cache.get_bytes(&nif).await {
        Ok(bytes) => bytes,
        Err(LookupError::NotFound(_)) => {
            eprintln!("NIF {nif} not found");
            return Ok(ExitCode::from(EXIT_NOT_FOUND));
        }
        Err(err) => return Err(err).with_context(|| format!("looking up {nif}")),
    };

    let mut out = std::io::stdout().lock();
    if pretty {
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).context("decoding cached record")?;
        serde_json::to_writer_pretty(&mut out, &value)?;
    } else {
        out.write_all(&bytes)?;
    }
    writeln!(out)?;
    Ok(ExitCode::SUCCESS)
}
