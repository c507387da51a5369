//! Configuration loading
//!
//! One TOML file deserializes straight into `OrgConfig`. Lookup order:
//! explicit `--config` path, `./cellkit.toml`, then the user config
//! directory. With no file anywhere a local development default is used.

use anyhow::{bail, Context};
use cell_types::OrgConfig;
use std::path::{Path, PathBuf};
use tracing::warn;

const CONFIG_FILE: &str = "cellkit.toml";

/// Load the organization config.
pub fn load(explicit: Option<&str>) -> anyhow::Result<OrgConfig> {
    if let Some(path) = explicit {
        return read(Path::new(path));
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return read(&local);
    }
    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("cellkit").join("config.toml");
        if user.exists() {
            return read(&user);
        }
    }

    warn!("No configuration file found, using local development defaults");
    Ok(OrgConfig::new("local", "us-east-1"))
}

/// Write a starter config for `bootstrap`. Refuses to overwrite.
pub fn write_starter(path: &str) -> anyhow::Result<()> {
    let path = Path::new(path);
    if path.exists() {
        bail!("{} already exists, not overwriting", path.display());
    }

    let starter = OrgConfig::new("my-org", "us-east-1");
    let rendered = toml::to_string_pretty(&starter)
        .context("failed to render starter configuration")?;
    std::fs::write(path, rendered)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<OrgConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid configuration in {}", path.display()))
}
