use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Scenario to load at startup; the built-in scenario when unset.
    #[serde(default)]
    pub scenario_file: Option<PathBuf>,
    #[serde(default)]
    pub integrity: IntegrityConfig,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// JSON Lines mirror of the audit log; in-memory only when unset.
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            audit_log_path: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct IntegrityConfig {
    /// Re-take the baseline after each administrative grant.
    #[serde(default = "default_true")]
    pub rebaseline_on_grant: bool,
    /// Background check period; disabled when unset.
    #[serde(default)]
    pub check_interval_secs: Option<u64>,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            rebaseline_on_grant: default_true(),
            check_interval_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    // Diagnostics go to stderr; keep them out of the way of shell output.
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// Returns `None` when the file does not exist. This runs before tracing is
/// initialised, so the caller reports the fallback once it can be seen.
pub fn load(path: &Path) -> anyhow::Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    parse(&contents)
        .map(Some)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))
}

fn parse(yaml: &str) -> Result<Config, serde_yml::Error> {
    serde_yml::from_str(yaml)
}
