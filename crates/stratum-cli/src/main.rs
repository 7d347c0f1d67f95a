mod init;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stratum_config::{AppConfig, ConfigLoader};
use stratum_db::{SqliteHandle, VersionStore};
use stratum_migrate::{Catalog, DirectorySource, Migrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stratum", version, about = "Versioned, reversible schema migrations")]
struct Cli {
    /// Config file (defaults to ./stratum.yml, ./stratum.yaml or ./stratum.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the config
    #[arg(long, global = true, env = "STRATUM_DATABASE")]
    database: Option<PathBuf>,

    /// Migrations directory, overriding the config
    #[arg(long, global = true, env = "STRATUM_MIGRATIONS_DIR")]
    migrations_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply or revert migrations until the database is at the target version
    Migrate {
        /// Target version (defaults to the newest migration)
        #[arg(short, long, allow_hyphen_values = true)]
        target: Option<String>,
    },
    /// Revert to the applied version just below the current one
    Rollback,
    /// Show applied and pending migrations
    Status,
    /// Write a starter config file and migrations directory
    Init {
        /// Project directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

/// Command-line settings that take precedence over the config file.
struct Overrides {
    config: Option<PathBuf>,
    database: Option<PathBuf>,
    migrations_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let Cli {
        config,
        database,
        migrations_dir,
        verbose,
        log_json,
        command,
    } = Cli::parse();
    init_tracing(verbose, log_json);

    let overrides = Overrides {
        config,
        database,
        migrations_dir,
    };

    match command {
        Command::Init { dir } => init::run_init(&dir),
        Command::Migrate { target } => {
            let config = load_config(&overrides)?;
            let mut migrator = open_migrator(&config)?;

            let before = migrator.current_version()?;
            let count = match target.as_deref() {
                Some(raw) => migrator.migrate_to(raw)?,
                None => migrator.migrate(None)?,
            };
            let after = migrator.current_version()?;

            let verb = if after < before { "reverted" } else { "applied" };
            println!("{verb} {count} migration(s); database is at version {after}");
            Ok(())
        }
        Command::Rollback => {
            let config = load_config(&overrides)?;
            let mut migrator = open_migrator(&config)?;

            let count = migrator.rollback()?;
            let after = migrator.current_version()?;
            println!("reverted {count} migration(s); database is at version {after}");
            Ok(())
        }
        Command::Status => {
            let config = load_config(&overrides)?;
            let mut migrator = open_migrator(&config)?;

            let report = migrator.status()?;
            status::print_status(&report, &config);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(overrides: &Overrides) -> Result<AppConfig> {
    let (config, source) = ConfigLoader::discover(overrides.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(path) = source {
        info!("using config {}", path.display());
    }

    let config = apply_overrides(config, overrides);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(mut config: AppConfig, overrides: &Overrides) -> AppConfig {
    if let Some(database) = &overrides.database {
        config.database.path = database.clone();
    }
    if let Some(dir) = &overrides.migrations_dir {
        config.migrations.dir = dir.clone();
    }
    config
}

fn open_migrator(config: &AppConfig) -> Result<Migrator<SqliteHandle>> {
    let catalog = Catalog::from_source(&DirectorySource::new(&config.migrations.dir))
        .with_context(|| {
            format!(
                "failed to read migrations from {}",
                config.migrations.dir.display()
            )
        })?;
    info!(
        "found {} migration(s) in {}",
        catalog.len(),
        config.migrations.dir.display()
    );

    let db = SqliteHandle::open(&config.database.path).with_context(|| {
        format!("failed to open database {}", config.database.path.display())
    })?;
    let store = VersionStore::new(&config.migrations.table, &config.migrations.legacy_table)
        .context("invalid version table name")?;

    Ok(Migrator::new(db, catalog, store))
}
