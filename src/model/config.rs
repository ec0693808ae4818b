use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Configuration from tick.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub file: FileConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Task file, relative to the directory holding tick.toml
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            path: default_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Hour at which "today" rolls over to the next date
    #[serde(default = "default_day_boundary_hour")]
    pub day_boundary_hour: u32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            day_boundary_hour: default_day_boundary_hour(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub default_mode: ViewMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Write an `id:` token into tasks created by tick
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for IdConfig {
    fn default() -> Self {
        IdConfig { persist: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_path() -> String {
    "tasks.txt".to_string()
}

fn default_day_boundary_hour() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Primary grouping of a view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Due,
    Priority,
    Area,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "due" => Ok(ViewMode::Due),
            "priority" => Ok(ViewMode::Priority),
            "area" => Ok(ViewMode::Area),
            other => Err(format!(
                "unknown view mode '{}' (expected: due, priority, area)",
                other
            )),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Due => write!(f, "due"),
            ViewMode::Priority => write!(f, "priority"),
            ViewMode::Area => write!(f, "area"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.file.path, "tasks.txt");
        assert_eq!(config.time.day_boundary_hour, 3);
        assert_eq!(config.view.default_mode, ViewMode::Due);
        assert!(config.ids.persist);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
[file]
path = "todo/life.txt"

[view]
default_mode = "area"

[ids]
persist = false
"#,
        )
        .unwrap();
        assert_eq!(config.file.path, "todo/life.txt");
        assert_eq!(config.view.default_mode, ViewMode::Area);
        assert!(!config.ids.persist);
        assert_eq!(config.time.day_boundary_hour, 3);
    }

    #[test]
    fn test_view_mode_from_str() {
        assert_eq!("Priority".parse::<ViewMode>(), Ok(ViewMode::Priority));
        assert!("calendar".parse::<ViewMode>().is_err());
    }
}
