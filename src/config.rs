use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration for the fileroute server.
///
/// Values come from three layers, later layers winning: built-in
/// defaults, an optional `fileroute.toml` in the data directory, then
/// environment variables (`FILEROUTE_PORT`, `FILEROUTE_DATA_DIR`,
/// `FILEROUTE_DEV`). CLI flags override all of these in main.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Permissive CORS for local frontend development.
    pub dev_mode: bool,
}

/// Shape of the optional `fileroute.toml` file.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    port: Option<u16>,
    dev_mode: Option<bool>,
}

pub const DEFAULT_PORT: u16 = 4810;
pub const DEFAULT_DATA_DIR: &str = ".fileroute";

impl Config {
    /// Load configuration for the given data directory, applying the
    /// file and environment layers.
    pub fn load(data_dir: PathBuf) -> Result<Self> {
        let file = Self::read_config_file(&data_dir)?;

        let mut port = file.port.unwrap_or(DEFAULT_PORT);
        let mut dev_mode = file.dev_mode.unwrap_or(false);

        if let Ok(v) = std::env::var("FILEROUTE_PORT") {
            port = v
                .parse()
                .with_context(|| format!("invalid FILEROUTE_PORT value: {v}"))?;
        }
        if let Ok(v) = std::env::var("FILEROUTE_DEV") {
            dev_mode = v != "false" && v != "0";
        }

        Ok(Self {
            port,
            data_dir,
            dev_mode,
        })
    }

    /// Resolve the data directory from an optional CLI value, falling
    /// back to `FILEROUTE_DATA_DIR` and then `./.fileroute`.
    pub fn resolve_data_dir(cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| std::env::var("FILEROUTE_DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    fn read_config_file(data_dir: &Path) -> Result<ConfigFile> {
        let path = data_dir.join("fileroute.toml");
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("fileroute.db")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join("audit")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).context("Failed to create data directory")?;
        std::fs::create_dir_all(self.attachments_dir())
            .context("Failed to create attachments directory")?;
        std::fs::create_dir_all(self.audit_dir()).context("Failed to create audit directory")?;
        std::fs::create_dir_all(self.log_dir()).context("Failed to create log directory")?;
        Ok(())
    }
}
