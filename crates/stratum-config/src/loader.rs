use std::path::{Path, PathBuf};

use stratum_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const LOCAL_CANDIDATES: [&str; 3] = ["stratum.yml", "stratum.yaml", "stratum.toml"];

/// Locates and parses the Stratum config file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path` if given, otherwise the first existing candidate from
    /// [`ConfigLoader::candidate_paths`]. Falls back to defaults when no file
    /// exists. Returns the config and the file it came from.
    pub fn discover(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        for candidate in Self::candidate_paths() {
            if candidate.is_file() {
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }

        debug!("no config file found, using defaults");
        Ok((AppConfig::default(), None))
    }

    /// Search order: `./stratum.yml`, `./stratum.yaml`, `./stratum.toml`,
    /// then `<config dir>/stratum/config.yml`.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = LOCAL_CANDIDATES.iter().map(PathBuf::from).collect();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("stratum").join("config.yml"));
        }
        paths
    }

    /// Parse a YAML or TOML file (chosen by extension), resolve relative
    /// paths against its directory and validate it.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let mut config = Self::parse(path, &contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<AppConfig> {
        match extension(path) {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Serialize `config` to `path` in the format its extension names.
    pub fn write(config: &AppConfig, path: &Path) -> Result<()> {
        let rendered = match extension(path) {
            "yml" | "yaml" => serde_yaml::to_string(config)
                .map_err(|e| Error::Config(format!("YAML serialize error: {e}")))?,
            "toml" => toml::to_string_pretty(config)
                .map_err(|e| Error::Config(format!("TOML serialize error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}
