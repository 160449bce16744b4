//! Runtime settings carried by a [`Configuration`](crate::Configuration).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ParseError, ParseResult};

/// How sessions prepare and reuse statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExecutorType {
    /// A fresh statement per call
    #[default]
    Simple,
    /// Prepared statements are cached and reused
    Reuse,
    /// Updates are queued and flushed together
    Batch,
}

impl ExecutorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Reuse => "reuse",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for ExecutorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "reuse" => Ok(Self::Reuse),
            "batch" => Ok(Self::Batch),
            other => Err(format!("unknown executor type `{}`", other)),
        }
    }
}

/// Global runtime settings.
///
/// # Example
///
/// ```rust
/// use sqlsession::{ExecutorType, Settings};
/// use std::time::Duration;
///
/// let settings = Settings::new()
///     .with_default_executor_type(ExecutorType::Reuse)
///     .with_default_statement_timeout(Duration::from_secs(30));
///
/// assert_eq!(settings.default_executor_type, ExecutorType::Reuse);
/// assert!(settings.cache_enabled);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Second-level cache switch
    pub cache_enabled: bool,
    /// Lazy loading of nested results
    pub lazy_loading_enabled: bool,
    /// Executor used when a session does not ask for one
    pub default_executor_type: ExecutorType,
    /// Statement timeout applied when a statement sets none
    pub default_statement_timeout: Option<Duration>,
    /// Fetch size hint applied when a statement sets none
    pub default_fetch_size: Option<u32>,
    /// Map `snake_case` columns onto `camelCase` properties
    pub map_underscore_to_camel_case: bool,
    /// Use driver-generated keys for inserts
    pub use_generated_keys: bool,
    /// Prefix added to statement logger names
    pub log_prefix: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            lazy_loading_enabled: false,
            default_executor_type: ExecutorType::Simple,
            default_statement_timeout: None,
            default_fetch_size: None,
            map_underscore_to_camel_case: false,
            use_generated_keys: false,
            log_prefix: None,
        }
    }
}

impl Settings {
    /// Create settings with every default.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_lazy_loading(mut self, enabled: bool) -> Self {
        self.lazy_loading_enabled = enabled;
        self
    }

    pub fn with_default_executor_type(mut self, executor: ExecutorType) -> Self {
        self.default_executor_type = executor;
        self
    }

    pub fn with_default_statement_timeout(mut self, timeout: Duration) -> Self {
        self.default_statement_timeout = Some(timeout);
        self
    }

    pub fn with_default_fetch_size(mut self, size: u32) -> Self {
        self.default_fetch_size = Some(size);
        self
    }

    pub fn with_log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = Some(prefix.into());
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_fetch_size == Some(0) {
            return Err("default_fetch_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Apply one document setting by name.
    ///
    /// String values are accepted wherever a boolean or number is expected,
    /// so placeholders can feed any setting.
    pub(crate) fn apply(&mut self, name: &str, value: &toml::Value) -> ParseResult<()> {
        match name {
            "cache_enabled" => self.cache_enabled = bool_setting(name, value)?,
            "lazy_loading_enabled" => self.lazy_loading_enabled = bool_setting(name, value)?,
            "default_executor_type" => {
                self.default_executor_type = string_setting(name, value)?
                    .parse::<ExecutorType>()
                    .map_err(|reason| invalid(name, reason))?
            }
            "default_statement_timeout" => {
                self.default_statement_timeout =
                    Some(Duration::from_secs(u64_setting(name, value)?))
            }
            "default_fetch_size" => {
                let size = u64_setting(name, value)?;
                let size = u32::try_from(size).map_err(|_| invalid(name, "value is too large"))?;
                self.default_fetch_size = Some(size);
            }
            "map_underscore_to_camel_case" => {
                self.map_underscore_to_camel_case = bool_setting(name, value)?
            }
            "use_generated_keys" => self.use_generated_keys = bool_setting(name, value)?,
            "log_prefix" => self.log_prefix = Some(string_setting(name, value)?),
            _ => return Err(ParseError::UnknownSetting(name.to_string())),
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidSetting {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn bool_setting(name: &str, value: &toml::Value) -> ParseResult<bool> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(name, format!("expected true or false, got `{}`", s))),
        other => Err(invalid(name, format!("expected a boolean, got {}", other.type_str()))),
    }
}

fn u64_setting(name: &str, value: &toml::Value) -> ParseResult<u64> {
    match value {
        toml::Value::Integer(i) => {
            u64::try_from(*i).map_err(|_| invalid(name, "value must not be negative"))
        }
        toml::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(name, format!("expected a non-negative integer, got `{}`", s))),
        other => Err(invalid(name, format!("expected an integer, got {}", other.type_str()))),
    }
}

fn string_setting(name: &str, value: &toml::Value) -> ParseResult<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        other => Err(invalid(name, format!("expected a string, got {}", other.type_str()))),
    }
}
