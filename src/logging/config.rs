use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Logging settings read from ENVIRONMENT, LOG_LEVEL and LOG_DIR.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub production: bool,
    pub level: LogLevel,
    pub dir: PathBuf,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("ENVIRONMENT").ok().as_deref(),
            std::env::var("LOG_LEVEL").ok().as_deref(),
            std::env::var("LOG_DIR").ok().as_deref(),
        )
    }

    /// Unknown levels fall back to `info` in production and `debug` elsewhere.
    pub fn from_values(environment: Option<&str>, level: Option<&str>, dir: Option<&str>) -> Self {
        let production = environment == Some("production");
        let default_level = if production {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        Self {
            production,
            level: level.and_then(LogLevel::parse).unwrap_or(default_level),
            dir: PathBuf::from(dir.filter(|d| !d.is_empty()).unwrap_or("logs")),
        }
    }

    /// Default `EnvFilter` directive when RUST_LOG is unset.
    pub fn filter_directive(&self) -> String {
        format!("portfolio_cms={},tower_http=debug,axum=debug", self.level)
    }

    pub fn environment(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_depend_on_environment() {
        let dev = LogSettings::from_values(None, None, None);
        assert_eq!(dev.level, LogLevel::Debug);
        assert_eq!(dev.dir, PathBuf::from("logs"));

        let prod = LogSettings::from_values(Some("production"), Some("nonsense"), Some("/var/log/cms"));
        assert!(prod.production);
        assert_eq!(prod.level, LogLevel::Info);
        assert_eq!(prod.dir, PathBuf::from("/var/log/cms"));
    }

    #[test]
    fn test_filter_directive_targets_crate() {
        let settings = LogSettings::from_values(None, Some("WARN"), None);
        assert_eq!(
            settings.filter_directive(),
            "portfolio_cms=warn,tower_http=debug,axum=debug"
        );
    }
}
