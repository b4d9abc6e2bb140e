//! CLI definitions and command routing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::cert::Certificate;
use crate::config::{Settings, TrustPaths};
use crate::init::{BundledSeed, FileSeed, SeedSource};
use crate::subsystem::TrustSubsystem;
use crate::TrustError;

#[derive(Parser)]
#[command(name = "certgate")]
#[command(about = "Remembered TLS trust decisions for a self-hosted panel server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// One-time setup: creates the data dir, seeds the trust store, writes default settings
    Init {
        /// Seed from this trust store file instead of the bundled default
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Accept a certificate (PEM or DER) into the local trust store
    Add { file: PathBuf },
    /// Check whether a certificate (PEM or DER) is already accepted
    Check { file: PathBuf },
    /// List accepted certificates with their aliases
    List,
    /// Print the store alias a certificate would get
    Alias { file: PathBuf },
    /// GET a URL using the current trust decisions
    Fetch { url: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run CLI and dispatch to handlers.
pub fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let paths = TrustPaths::default_paths();

    match cli.command {
        Commands::Init { seed } => cmd_init(&paths, seed),
        Commands::Add { file } => cmd_add(&paths, &file),
        Commands::Check { file } => cmd_check(&paths, &file),
        Commands::List => cmd_list(&paths),
        Commands::Alias { file } => cmd_alias(&file),
        Commands::Fetch { url } => cmd_fetch(&paths, &url),
    }
}

/// Subsystem over `paths`, initialized from the bundled seed.
fn open_subsystem(paths: &TrustPaths) -> Result<TrustSubsystem> {
    let settings = Settings::load(paths)?;
    let subsystem = TrustSubsystem::new(paths.clone(), settings);
    subsystem
        .initialize(&BundledSeed)
        .context("initialize trust store")?;
    Ok(subsystem)
}

fn read_cert_file(file: &Path) -> Result<Vec<u8>> {
    std::fs::read(file).with_context(|| format!("read certificate: {}", file.display()))
}

fn cmd_init(paths: &TrustPaths, seed: Option<PathBuf>) -> Result<()> {
    paths.ensure_dirs()?;
    if !paths.settings_file.is_file() {
        Settings::default().save(paths)?;
    }
    let settings = Settings::load(paths)?;
    let subsystem = TrustSubsystem::new(paths.clone(), settings);
    let source: Box<dyn SeedSource> = match seed {
        Some(p) => Box::new(FileSeed(p)),
        None => Box::new(BundledSeed),
    };
    subsystem
        .initialize(source.as_ref())
        .context("initialize trust store")?;
    println!("Certgate initialised at {}", paths.data_dir.display());
    Ok(())
}

fn cmd_add(paths: &TrustPaths, file: &Path) -> Result<()> {
    let raw = read_cert_file(file)?;
    let subsystem = open_subsystem(paths)?;
    let alias = subsystem.add_certificate(&raw)?;
    println!("Added certificate: {alias}");
    Ok(())
}

fn cmd_check(paths: &TrustPaths, file: &Path) -> Result<()> {
    let raw = read_cert_file(file)?;
    let subsystem = open_subsystem(paths)?;
    if subsystem.is_trusted(&raw)? {
        println!("trusted");
    } else {
        println!("not trusted");
    }
    Ok(())
}

fn cmd_list(paths: &TrustPaths) -> Result<()> {
    let subsystem = open_subsystem(paths)?;
    for entry in subsystem.entries()? {
        println!("{}\t{}", entry.alias, entry.certificate.subject());
    }
    Ok(())
}

fn cmd_alias(file: &Path) -> Result<()> {
    let raw = read_cert_file(file)?;
    let cert = Certificate::from_bytes(&raw)?;
    println!("{}", cert.alias());
    Ok(())
}

fn cmd_fetch(paths: &TrustPaths, url: &str) -> Result<()> {
    let subsystem = open_subsystem(paths)?;
    let connection = subsystem.open_connection(url)?;
    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(connection.get()) {
        Ok(res) => {
            println!("{}", res.status);
            print!("{}", String::from_utf8_lossy(&res.body));
            Ok(())
        }
        Err(TrustError::ChainNotTrusted) => {
            anyhow::bail!(
                "server certificate for {url} is not trusted; accept it with 'certgate add <cert-file>'"
            )
        }
        Err(e) => Err(e).with_context(|| format!("fetch {url}")),
    }
}
