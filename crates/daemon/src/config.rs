// Daemon configuration, read once from the environment

use anyhow::{anyhow, Result};
use pictor_core::domain::Priority;
use std::path::PathBuf;

pub const DEFAULT_LIBRARY_PATH: &str = "~/Pictures";
pub const DEFAULT_LOG_FILTER: &str = "pictor=info";
const LOG_FILE_PREFIX: &str = "pictor-jobd.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub library_path: PathBuf,
    pub log_format: LogFormat,
    /// Daily rolling log files go here when set
    pub log_dir: Option<PathBuf>,
    pub log_file_prefix: String,
    pub start_paused: bool,
    pub scan_priority: Priority,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key -> value source (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let library_path = lookup("PICTOR_LIBRARY_PATH")
            .unwrap_or_else(|| DEFAULT_LIBRARY_PATH.to_string());
        let library_path = PathBuf::from(shellexpand::tilde(&library_path).into_owned());

        let log_format = match lookup("PICTOR_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let log_dir = lookup("PICTOR_LOG_DIR")
            .filter(|dir| !dir.is_empty())
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        let start_paused = lookup("PICTOR_START_PAUSED")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        let scan_priority = match lookup("PICTOR_SCAN_PRIORITY") {
            Some(name) => parse_priority(&name)?,
            None => Priority::BackgroundInfo,
        };

        Ok(Self {
            library_path,
            log_format,
            log_dir,
            log_file_prefix: LOG_FILE_PREFIX.to_string(),
            start_paused,
            scan_priority,
        })
    }
}

impl DaemonConfig {
    /// Paused start with a scan the pause holds back: nothing will run
    pub fn scan_held_by_pause(&self) -> bool {
        self.start_paused && !self.scan_priority.is_foreground()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_priority(name: &str) -> Result<Priority> {
    serde_json::from_value(serde_json::Value::String(name.trim().to_ascii_uppercase()))
        .map_err(|_| anyhow!("PICTOR_SCAN_PRIORITY: unknown priority '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.log_dir, None);
        assert!(!config.start_paused);
        assert_eq!(config.scan_priority, Priority::BackgroundInfo);
        assert!(!config.library_path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PICTOR_LIBRARY_PATH", "/srv/photos"),
            ("PICTOR_LOG_FORMAT", "json"),
            ("PICTOR_LOG_DIR", "/var/log/pictor"),
            ("PICTOR_START_PAUSED", "1"),
            ("PICTOR_SCAN_PRIORITY", "background_preview"),
        ])
        .unwrap();

        assert_eq!(config.library_path, PathBuf::from("/srv/photos"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/pictor")));
        assert!(config.start_paused);
        assert_eq!(config.scan_priority, Priority::BackgroundPreview);
    }

    #[test]
    fn test_unknown_priority_is_rejected() {
        let err = config(&[("PICTOR_SCAN_PRIORITY", "urgent")]).unwrap_err();
        assert!(err.to_string().contains("urgent"));
    }

    #[test]
    fn test_paused_background_scan_is_flagged() {
        let held = config(&[("PICTOR_START_PAUSED", "true")]).unwrap();
        assert!(held.scan_held_by_pause());

        let foreground = config(&[
            ("PICTOR_START_PAUSED", "true"),
            ("PICTOR_SCAN_PRIORITY", "FOREGROUND_THUMBNAIL"),
        ])
        .unwrap();
        assert!(!foreground.scan_held_by_pause());

        assert!(!config(&[]).unwrap().scan_held_by_pause());
    }

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }
}
