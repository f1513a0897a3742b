use serde::{Deserialize, Serialize};

pub const DEFAULT_LEVEL: &str = "info";
pub const DEFAULT_KEEP_DAYS: u64 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `info` or `info,wifi=debug`.
    pub level: String,
    pub keep_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: DEFAULT_LEVEL.to_string(),
            keep_days: DEFAULT_KEEP_DAYS,
        }
    }
}

impl LoggingConfig {
    /// Replaces the level directive when one is given on the command line.
    pub fn with_level(mut self, level: Option<&str>) -> Self {
        if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
            self.level = level.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"level":"debug"}"#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.keep_days, DEFAULT_KEEP_DAYS);
    }

    #[test]
    fn blank_override_keeps_level() {
        let cfg = LoggingConfig::default().with_level(Some("  "));
        assert_eq!(cfg.level, DEFAULT_LEVEL);
        let cfg = cfg.with_level(Some("wifi=trace"));
        assert_eq!(cfg.level, "wifi=trace");
    }
}
