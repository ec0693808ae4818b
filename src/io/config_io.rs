use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::logging::normalize_level;
use crate::model::config::{Config, ViewMode};

pub const CONFIG_FILE: &str = "tick.toml";

/// Error type for configuration handling
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no tick.toml found (run `tick init` or pass --file)")]
    NotConfigured,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse tick.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not edit tick.toml: {0}")]
    Edit(#[from] toml_edit::TomlError),
    #[error("unknown config key '{0}'")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Find tick.toml by walking up from `start`
pub fn discover_config(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ConfigError::NotConfigured);
        }
    }
}

/// Read the config, returning both the parsed config and the raw
/// toml_edit document for round-trip-safe editing.
pub fn read_config(path: &Path) -> Result<(Config, toml_edit::DocumentMut), ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: Config = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    validate(&config)?;
    Ok((config, doc))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_config(path).map(|(config, _)| config)
}

/// Write the document back, preserving comments and layout
pub fn write_config(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    atomic_write(path, doc.to_string().as_bytes()).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// The task file a config points at, resolved against the config's directory
pub fn task_file_path(config_path: &Path, config: &Config) -> PathBuf {
    let base = config_path.parent().unwrap_or(Path::new("."));
    base.join(&config.file.path)
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

/// Set `section.key` to `raw`, typed and validated for that key
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

    let value = match (section, field) {
        ("file", "path") => {
            if raw.trim().is_empty() {
                return Err(invalid("path is empty".into()));
            }
            toml_edit::value(raw.trim())
        }
        ("time", "day_boundary_hour") => match raw.trim().parse::<i64>() {
            Ok(h) if (0..=23).contains(&h) => toml_edit::value(h),
            _ => return Err(invalid(format!("expected an hour 0-23, got '{}'", raw))),
        },
        ("view", "default_mode") => {
            let mode: ViewMode = raw.parse().map_err(invalid)?;
            toml_edit::value(mode.to_string())
        }
        ("ids", "persist") => match raw.trim() {
            "true" => toml_edit::value(true),
            "false" => toml_edit::value(false),
            _ => return Err(invalid(format!("expected true or false, got '{}'", raw))),
        },
        ("log", "level") => toml_edit::value(normalize_level(raw).map_err(invalid)?),
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    };

    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = value;
    Ok(())
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.time.day_boundary_hour > 23 {
        return Err(ConfigError::InvalidValue {
            key: "time.day_boundary_hour".into(),
            reason: format!("expected an hour 0-23, got {}", config.time.day_boundary_hour),
        });
    }
    normalize_level(&config.log.level).map_err(|reason| ConfigError::InvalidValue {
        key: "log.level".into(),
        reason,
    })?;
    Ok(())
}

/// Commented config written by `tick init`
pub fn config_template(task_file: &str) -> String {
    format!(
        r#"# tick configuration

[file]
# Task file, relative to this directory
path = "{task_file}"

[time]
# Times before this hour count as the previous day
day_boundary_hour = 3

[view]
# due | priority | area
default_mode = "due"

[ids]
# Write an id: token into tasks created by tick
persist = true

[log]
level = "warn"
"#
    )
}
