use crate::config::Config;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file {}", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

    config.validate()?;

    info!(
        "Configuration loaded: {} batch addresses, window of {} transactions",
        config.analysis.addresses.len(),
        config.analysis.max_transactions
    );

    Ok(config)
}

/// Load the file when one is given, otherwise start from defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// Read `general.log_level` without validating or logging.
///
/// The logger has to exist before [`load_config`] runs, so this is the only
/// config access that happens silently. Unreadable files yield None and are
/// reported by the full load afterwards.
pub fn peek_log_level(config_path: Option<&Path>) -> Option<String> {
    let content = std::fs::read_to_string(config_path?).ok()?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content).ok()?;
    value.get("general")?.get("log_level")?.as_str().map(str::to_string)
}

/// CLI arguments that override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub threads: Option<usize>,
}

/// Apply CLI overrides to a loaded configuration
pub fn apply_cli_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(data_dir) = &overrides.data_dir {
        info!("Overriding data_dir with {}", data_dir.display());
        config.source.data_dir = data_dir.clone();
    }

    if let Some(output_dir) = &overrides.output_dir {
        info!("Overriding output_dir with {}", output_dir.display());
        config.general.output_dir = output_dir.clone();
    }

    if let Some(level) = &overrides.log_level {
        config.general.log_level = Some(level.clone());
    }

    if let Some(threads) = overrides.threads {
        config.general.threads = threads;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}
