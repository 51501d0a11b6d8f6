// RUNTIME PREFERENCES (User Experience)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::sync::OnceLock;

/// Runtime log level preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Convert to events::LogLevel for compatibility
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables)
fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

/// User-tunable engine preferences
///
/// Defaults come from `STENCIL_*` environment variables; explicit values can
/// be loaded from a TOML file instead. Compile-time limits in
/// [`super::constants`] always win over anything configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginePreferences {
    /// Whether to use structured JSON logging (user preference)
    pub use_structured_logging: bool,

    /// User preferred minimum log level
    pub min_log_level: LogLevel,

    /// Whether to log per-render success metrics (token/node counts, timing)
    pub log_render_metrics: bool,

    /// Whether sandbox policy checks are applied to attribute access
    pub enable_sandbox: bool,

    /// Whether resolved attribute accessors are cached across renders
    pub cache_attributes: bool,
}

impl Default for EnginePreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env::var(env_vars::STRUCTURED_LOGGING)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            min_log_level: env::var(env_vars::LOG_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Warning),
            log_render_metrics: env::var(env_vars::LOG_RENDER_METRICS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            enable_sandbox: env::var(env_vars::ENABLE_SANDBOX)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            cache_attributes: env::var(env_vars::CACHE_ATTRIBUTES)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

impl EnginePreferences {
    /// Load preferences from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read preferences file: {}", e))?;
        toml::from_str(&contents).map_err(|e| format!("Failed to parse preferences file: {}", e))
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    pub const STRUCTURED_LOGGING: &str = "STENCIL_STRUCTURED_LOGGING";
    pub const LOG_LEVEL: &str = "STENCIL_LOG_LEVEL";
    pub const LOG_RENDER_METRICS: &str = "STENCIL_LOG_RENDER_METRICS";
    pub const ENABLE_SANDBOX: &str = "STENCIL_ENABLE_SANDBOX";
    pub const CACHE_ATTRIBUTES: &str = "STENCIL_CACHE_ATTRIBUTES";
}

static PREFERENCES: OnceLock<EnginePreferences> = OnceLock::new();

/// Install explicit preferences for the process
///
/// Fails if preferences were already installed or read.
pub fn init_preferences(preferences: EnginePreferences) -> Result<(), String> {
    PREFERENCES
        .set(preferences)
        .map_err(|_| "Engine preferences already initialized".to_string())
}

/// Get the active preferences, falling back to environment defaults
pub fn preferences() -> EnginePreferences {
    PREFERENCES.get_or_init(EnginePreferences::default).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("ERROR"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("0"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("warn"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("warning"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("info"), Some(LogLevel::Info));
        assert_eq!(parse_log_level("debug"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("invalid"), None);
    }

    #[test]
    fn test_preferences_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "use_structured_logging = true\nmin_log_level = \"debug\"\nenable_sandbox = false"
        )
        .unwrap();

        let prefs = EnginePreferences::from_toml_file(file.path()).unwrap();
        assert!(prefs.use_structured_logging);
        assert_eq!(prefs.min_log_level, LogLevel::Debug);
        assert!(!prefs.enable_sandbox);
        // Unspecified fields fall back to defaults
        assert!(prefs.cache_attributes);
    }

    #[test]
    fn test_preferences_from_missing_file() {
        let result = EnginePreferences::from_toml_file("/nonexistent/prefs.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_names_exist() {
        assert!(!env_vars::LOG_LEVEL.is_empty());
        assert!(!env_vars::ENABLE_SANDBOX.is_empty());
    }
}
