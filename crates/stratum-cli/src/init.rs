use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dialoguer::Input;
use stratum_config::{AppConfig, ConfigLoader, DatabaseConfig, IdentifierValidator, MigrationsConfig};
use tracing::info;

/// Run the interactive setup. Writes `stratum.yml` into `project_dir` and
/// creates the migrations directory.
pub fn run_init(project_dir: &Path) -> Result<()> {
    let config_path = project_dir.join("stratum.yml");
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    if !std::io::stdin().is_terminal() {
        println!("Non-interactive environment detected.");
        println!("Create {} by hand:", config_path.display());
        println!();
        println!("---");
        println!("database:");
        println!("  path: stratum.db");
        println!("migrations:");
        println!("  dir: migrations");
        println!("  table: schema_migration");
        println!("  legacy_table: schema_info");
        return Ok(());
    }

    println!();
    println!("  Stratum Setup");
    println!("  -------------");
    println!();

    let defaults = AppConfig::default();

    let database: String = Input::new()
        .with_prompt("SQLite database file")
        .default(defaults.database.path.display().to_string())
        .interact_text()
        .context("database path input cancelled")?;

    let dir: String = Input::new()
        .with_prompt("Migrations directory")
        .default(defaults.migrations.dir.display().to_string())
        .interact_text()
        .context("migrations directory input cancelled")?;

    let table: String = Input::new()
        .with_prompt("Version table")
        .default(defaults.migrations.table.clone())
        .validate_with(|name: &String| {
            IdentifierValidator::validate_table_name(name).map_err(|e| e.to_string())
        })
        .interact_text()
        .context("version table input cancelled")?;

    let legacy_table: String = Input::new()
        .with_prompt("Legacy version table (read once on first run)")
        .default(defaults.migrations.legacy_table.clone())
        .validate_with(|name: &String| {
            IdentifierValidator::validate_table_name(name).map_err(|e| e.to_string())
        })
        .interact_text()
        .context("legacy table input cancelled")?;

    let config = AppConfig {
        database: DatabaseConfig {
            path: PathBuf::from(database.trim()),
        },
        migrations: MigrationsConfig {
            dir: PathBuf::from(dir.trim()),
            table,
            legacy_table,
        },
    };
    write_project(project_dir, &config_path, &config)?;

    println!();
    println!("  Config written to {}", config_path.display());
    println!(
        "  Add migrations as {}/<version>_<name>/up.sql and down.sql",
        config.migrations.dir.display()
    );
    println!("  Run `stratum migrate` to apply them.");
    println!();

    Ok(())
}

/// Validate `config`, write it and create its migrations directory.
fn write_project(project_dir: &Path, config_path: &Path, config: &AppConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let migrations_dir = project_dir.join(&config.migrations.dir);
    std::fs::create_dir_all(&migrations_dir)
        .with_context(|| format!("failed to create {}", migrations_dir.display()))?;

    ConfigLoader::write(config, config_path)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    info!("config written to {}", config_path.display());
    Ok(())
}
