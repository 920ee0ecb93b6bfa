//! Filereg Command Line Interface
//!
//! Hosts a sled-backed file registry and exposes each registry operation as
//! a subcommand. Boolean outcomes print `true`/`false` and exit 0/1; errors
//! exit 2.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use filereg_registry::{
    FileId, FileRegistry, Identity, Locator, PermissionDescriptor, PublicMatch, RecordStore,
    RegistryError, RegistryOptions, SledRecordStore,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "filereg")]
#[command(about = "File registry with owner and administrator authorization", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database directory (overrides FILEREG_DB_PATH)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Calling identity, encoded as `i` + base58 (overrides FILEREG_IDENTITY)
    #[arg(long = "as", value_name = "IDENTITY")]
    caller: Option<Identity>,

    /// How the `public` token is matched: substring | exact_token
    #[arg(long, value_name = "MODE")]
    public_match: Option<PublicMatch>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the calling identity as administrator (first call only)
    Init,
    /// Register a new file record owned by the caller
    Create(WriteArgs),
    /// Print `locator|permissions` for a file
    Read { file_id: String },
    /// Print the locator of a file
    Locator { file_id: String },
    /// Print the permission descriptor of a file
    Permissions { file_id: String },
    /// Print the owner of a file (zero identity if absent)
    Owner { file_id: String },
    /// Check whether a file record exists
    Exists { file_id: String },
    /// Replace locator and permissions (owner only)
    Update(WriteArgs),
    /// Delete a file record (owner only)
    Delete { file_id: String },
    /// Delete any file record (administrator only)
    AdminDelete { file_id: String },
    /// Evaluate whether a requester may read a file
    CanAccess {
        file_id: String,
        /// Encoded requester identity
        requester: Identity,
    },
    /// Derive a deterministic identity from a seed string
    Identity { seed: String },
}

#[derive(Args)]
struct WriteArgs {
    file_id: String,
    /// Permission descriptor: `public` or comma-separated encoded identities
    permissions: String,
    /// Opaque locator, e.g. a content identifier
    #[arg(long, required_unless_present = "content_file", conflicts_with = "content_file")]
    locator: Option<String>,
    /// Derive a content-addressed locator from a local file
    #[arg(long, value_name = "PATH")]
    content_file: Option<PathBuf>,
}

impl WriteArgs {
    fn resolve(&self) -> Result<(FileId, Locator, PermissionDescriptor)> {
        let locator = match (&self.locator, &self.content_file) {
            (Some(locator), _) => Locator::from(locator.as_str()),
            (None, Some(path)) => {
                let data = fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Locator::from_content(&data)
            }
            (None, None) => anyhow::bail!("either --locator or --content-file is required"),
        };
        Ok((
            FileId::from(self.file_id.as_str()),
            locator,
            PermissionDescriptor::from(self.permissions.as_str()),
        ))
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();

    if let Commands::Identity { seed } = &cli.command {
        println!("{}", Identity::derive(seed.as_bytes()));
        return Ok(true);
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(caller) = cli.caller {
        config.identity = Some(caller);
    }
    if let Some(mode) = cli.public_match {
        config.public_match = mode;
    }

    init_logging(&config)?;

    let store = SledRecordStore::new(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;

    execute(cli.command, &config, store)
}

fn execute(command: Commands, config: &AppConfig, store: SledRecordStore) -> Result<bool> {
    let options = RegistryOptions {
        public_match: config.public_match,
    };

    if let Commands::Init = command {
        let caller = require_caller(config)?;
        let registry = FileRegistry::with_options(store, caller, options)?;
        registry.store().flush()?;
        println!("{}", registry.administrator());
        return Ok(registry.administrator() == caller);
    }

    let administrator = store
        .administrator()?
        .context("registry not initialised; run `filereg init --as <IDENTITY>` first")?;
    let registry = FileRegistry::with_options(store, administrator, options)?;

    let outcome = match command {
        Commands::Create(args) => {
            let caller = require_caller(config)?;
            let (file_id, locator, permissions) = args.resolve()?;
            report("create", registry.try_create(&file_id, locator, permissions, caller))?
        }
        Commands::Update(args) => {
            let caller = require_caller(config)?;
            let (file_id, locator, permissions) = args.resolve()?;
            report("update", registry.try_update(&file_id, locator, permissions, caller))?
        }
        Commands::Delete { file_id } => {
            let caller = require_caller(config)?;
            report("delete", registry.try_delete(&FileId::from(file_id.as_str()), caller))?
        }
        Commands::AdminDelete { file_id } => {
            let caller = require_caller(config)?;
            report(
                "admin-delete",
                registry.try_delete_as_admin(&FileId::from(file_id.as_str()), caller),
            )?
        }
        Commands::Read { file_id } => {
            let record = registry.try_read(&FileId::from(file_id.as_str()))?;
            if let Some(record) = &record {
                println!("{}", String::from_utf8_lossy(&record.to_legacy_bytes()));
            }
            record.is_some()
        }
        Commands::Locator { file_id } => {
            let record = registry.try_read(&FileId::from(file_id.as_str()))?;
            if let Some(record) = &record {
                println!("{}", String::from_utf8_lossy(record.locator.as_bytes()));
            }
            record.is_some()
        }
        Commands::Permissions { file_id } => {
            let record = registry.try_read(&FileId::from(file_id.as_str()))?;
            if let Some(record) = &record {
                println!("{}", String::from_utf8_lossy(record.permissions.as_bytes()));
            }
            record.is_some()
        }
        Commands::Owner { file_id } => {
            let owner = registry.try_get_owner(&FileId::from(file_id.as_str()))?;
            println!("{}", owner.unwrap_or(Identity::ZERO));
            owner.is_some()
        }
        Commands::Exists { file_id } => {
            let exists = registry.try_exists(&FileId::from(file_id.as_str()))?;
            println!("{exists}");
            exists
        }
        Commands::CanAccess { file_id, requester } => {
            let grant = registry.try_access_grant(&FileId::from(file_id.as_str()), &requester)?;
            if let Some(grant) = grant {
                info!(?grant, "access granted");
            }
            println!("{}", grant.is_some());
            grant.is_some()
        }
        Commands::Init | Commands::Identity { .. } => {
            anyhow::bail!("command must be handled before the registry is opened")
        }
    };

    registry.store().flush()?;
    Ok(outcome)
}

/// Print the boolean projection; storage faults propagate as errors.
fn report(operation: &str, result: filereg_registry::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => {
            println!("true");
            Ok(true)
        }
        Err(RegistryError::Storage(err)) => Err(err.into()),
        Err(err) => {
            warn!(operation, kind = ?err.kind(), "{err}");
            println!("false");
            Ok(false)
        }
    }
}

fn require_caller(config: &AppConfig) -> Result<Identity> {
    config
        .identity
        .context("no caller identity; pass --as <IDENTITY> or set FILEREG_IDENTITY")
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "compact" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
