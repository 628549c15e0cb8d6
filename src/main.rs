use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use xero_coa::upload::{DEFAULT_WORKERS, XERO_API_URL};
use xero_coa::{Uploader, generate_charts, read_accounts};
use xero_oauth::EnvStore;
use xero_oauth::store::{ACCESS_TOKEN_KEY, TENANT_ID_KEY};

const FILES_KEY: &str = "FILES";
const COA_PATH_KEY: &str = "COA_PATH";
const NUM_GENERATED_FILES_KEY: &str = "NUM_GENERATED_FILES";
const NUM_GENERATED_COA_KEY: &str = "NUM_GENERATED_COA";
const INIT_COA_NUMBER_KEY: &str = "INIT_COA_NUMBER";
const XERO_API_URL_KEY: &str = "XERO_API_URL";

/// Xero chart-of-accounts tool - generates import CSV files and uploads them
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Env file holding ACCESS_TOKEN, TENANT_ID and the generator settings
    #[arg(long, default_value = ".env", global = true)]
    env_file: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate chart-of-accounts CSV files and record their paths under FILES
    Generate,

    /// Upload the accounts of every file listed under FILES
    Upload {
        /// Number of accounts uploaded concurrently
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
    },
}

/// Settings from the env file, with the process environment taking precedence
struct Settings {
    entries: HashMap<String, String>,
}

impl Settings {
    fn load(store: &EnvStore) -> anyhow::Result<Self> {
        Ok(Self {
            entries: store.read()?,
        })
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.entries.get(key).cloned())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, key: &str) -> anyhow::Result<String> {
        self.get(key)
            .with_context(|| format!("{key} is not set in the env file or environment"))
    }

    fn parse<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let raw = self.require(key)?;
        raw.parse()
            .with_context(|| format!("{key} must be a number, got '{raw}'"))
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("xero_coa=info,xero_oauth=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn generate(store: &EnvStore, settings: &Settings) -> anyhow::Result<()> {
    let files: usize = settings.parse(NUM_GENERATED_FILES_KEY)?;
    let rows_per_file: usize = settings.parse(NUM_GENERATED_COA_KEY)?;
    let first_code: u64 = settings.parse(INIT_COA_NUMBER_KEY)?;
    let dir = PathBuf::from(settings.require(COA_PATH_KEY)?);

    let paths = generate_charts(&dir, files, rows_per_file, first_code, &mut rand::thread_rng())?;

    if paths.is_empty() {
        eprintln!("No files generated");
        return Ok(());
    }

    let joined = paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(",");
    store.set(FILES_KEY, &joined)?;

    eprintln!(
        "Generated {} file(s) in {}; paths saved under {} in {}",
        paths.len(),
        dir.display(),
        FILES_KEY,
        store.path().display()
    );
    Ok(())
}

async fn upload(settings: &Settings, workers: usize) -> anyhow::Result<()> {
    let access_token = settings.require(ACCESS_TOKEN_KEY)?;
    let tenant_id = settings.require(TENANT_ID_KEY)?;
    let files = settings.require(FILES_KEY)?;
    let api_base = settings
        .get(XERO_API_URL_KEY)
        .unwrap_or_else(|| XERO_API_URL.to_string());

    let mut accounts = Vec::new();
    for file in files.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match read_accounts(Path::new(file)) {
            Ok(found) => accounts.extend(found),
            Err(e) => tracing::warn!(error = %e, "skipping chart file"),
        }
    }

    eprintln!("Uploading {} account(s) with {} worker(s)", accounts.len(), workers);

    let uploader = Uploader::new(reqwest::Client::new(), &api_base, access_token, tenant_id);
    let summary = uploader.upload_all(accounts, workers).await;

    eprintln!(
        "Created: {}, already present: {}, failed: {}",
        summary.created, summary.already_exists, summary.failed
    );

    if summary.failed > 0 {
        bail!("{} account(s) could not be uploaded", summary.failed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let store = EnvStore::new(&args.env_file);
    let settings = Settings::load(&store)?;

    match args.command {
        Command::Generate => generate(&store, &settings),
        Command::Upload { workers } => upload(&settings, workers).await,
    }
}
