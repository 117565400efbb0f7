//! Config discovery and record loading shared by every subcommand.

use std::path::{Path, PathBuf};

use tally_rollup::{RawRecord, RecordSource, TallyConfig};
use tally_store::FileSource;

use crate::exit_codes::{engine_exit_code, EXIT_SOURCE, EXIT_USAGE};
use crate::CliError;

pub const CONFIG_FILE: &str = "tally.toml";

/// A parsed, validated config and the directory its relative paths use.
pub struct Loaded {
    pub config: TallyConfig,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl Loaded {
    pub fn describe(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "built-in defaults".to_string(),
        }
    }
}

/// Find the config file: explicit path (flag or `TALLY_CONFIG`), then
/// `./tally.toml`, then `<config dir>/tally/tally.toml`.
fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("tally").join(CONFIG_FILE))
        .filter(|p| p.is_file())
}

pub fn load_config(explicit: Option<&Path>) -> Result<Loaded, CliError> {
    let Some(path) = discover(explicit) else {
        tracing::debug!("no {CONFIG_FILE} found, using defaults");
        return Ok(Loaded {
            config: TallyConfig::default(),
            path: None,
            base_dir: PathBuf::from("."),
        });
    };

    let text = std::fs::read_to_string(&path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: explicit
            .is_none()
            .then(|| "pass --config or set TALLY_CONFIG".to_string()),
    })?;

    let config = TallyConfig::from_toml(&text).map_err(|e| CliError {
        code: engine_exit_code(&e),
        message: format!("{}: {e}", path.display()),
        hint: None,
    })?;

    tracing::debug!("loaded config {}", path.display());
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(Loaded {
        config,
        path: Some(path),
        base_dir,
    })
}

/// Read the full snapshot. `--input` files replace the configured source.
pub fn load_records(loaded: &Loaded, inputs: &[PathBuf]) -> Result<Vec<RawRecord>, CliError> {
    let source: Box<dyn RecordSource> = if inputs.is_empty() {
        tally_store::open_source(&loaded.config.source, &loaded.base_dir)
            .map_err(|e| CliError::source(e.to_string()))?
    } else {
        Box::new(FileSource::new(inputs.to_vec()))
    };

    let records = source.fetch_all().map_err(|e| CliError {
        code: EXIT_SOURCE,
        message: format!("cannot read records from {}: {e}", source.describe()),
        hint: inputs
            .is_empty()
            .then(|| "check [source] in the config, or pass --input FILE".to_string()),
    })?;

    tracing::info!("read {} records from {}", records.len(), source.describe());
    Ok(records)
}
