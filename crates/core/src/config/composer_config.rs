use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::config::sources::ConfigSource;
use crate::config::validation::{parse_flag, validate_log_level, ConfigError};
use crate::logging::{LogFormat, LoggingConfig};

pub const ROUTE_COLLISIONS_VAR: &str = "MODGRAPH_ROUTE_COLLISIONS";
pub const STRICT_EXPORTS_VAR: &str = "MODGRAPH_STRICT_EXPORTS";
pub const LOG_LEVEL_VAR: &str = "MODGRAPH_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "MODGRAPH_LOG_FORMAT";

/// Configuration loaded from the environment
pub trait EnvConfig: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// What the root does when two pipelines share a route key
///
/// Entries are always kept; the policy only controls diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteCollisions {
    #[default]
    Allow,
    Warn,
    Reject,
}

impl FromStr for RouteCollisions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(RouteCollisions::Allow),
            "warn" => Ok(RouteCollisions::Warn),
            "reject" | "error" => Ok(RouteCollisions::Reject),
            _ => Err(ConfigError::invalid_value(
                "route_collisions",
                s,
                "allow, warn or reject",
            )),
        }
    }
}

impl std::fmt::Display for RouteCollisions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let policy = match self {
            RouteCollisions::Allow => "allow",
            RouteCollisions::Warn => "warn",
            RouteCollisions::Reject => "reject",
        };
        write!(f, "{}", policy)
    }
}

/// Settings of a composition context
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub route_collisions: RouteCollisions,
    /// Exporting an identity the module neither declares nor imports is an
    /// error when set, a warning otherwise
    pub strict_exports: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    sources: HashMap<String, ConfigSource>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            route_collisions: RouteCollisions::Allow,
            strict_exports: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            sources: HashMap::new(),
        }
    }
}

impl ComposerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route_collisions(mut self, policy: RouteCollisions) -> Self {
        self.route_collisions = policy;
        self.sources
            .insert("route_collisions".to_string(), ConfigSource::Programmatic);
        self
    }

    pub fn with_strict_exports(mut self, strict: bool) -> Self {
        self.strict_exports = strict;
        self.sources
            .insert("strict_exports".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Logging settings derived from this configuration
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            ..LoggingConfig::default()
        }
    }

    fn read_var(
        name: &str,
        field: &str,
        default: &str,
        sources: &mut HashMap<String, ConfigSource>,
    ) -> Result<String, ConfigError> {
        match env::var(name) {
            Ok(value) => {
                sources.insert(field.to_string(), ConfigSource::EnvVar(name.to_string()));
                Ok(value)
            }
            Err(env::VarError::NotPresent) => {
                sources.insert(field.to_string(), ConfigSource::Default(default.to_string()));
                Ok(default.to_string())
            }
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::environment_error(format!(
                "{} is not valid unicode",
                name
            ))),
        }
    }
}

impl EnvConfig for ComposerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut sources = HashMap::new();

        let route_collisions =
            Self::read_var(ROUTE_COLLISIONS_VAR, "route_collisions", "allow", &mut sources)?
                .parse()?;
        let strict_exports = parse_flag(
            "strict_exports",
            &Self::read_var(STRICT_EXPORTS_VAR, "strict_exports", "true", &mut sources)?,
        )?;
        let log_level = Self::read_var(LOG_LEVEL_VAR, "log_level", "info", &mut sources)?;
        let log_format =
            Self::read_var(LOG_FORMAT_VAR, "log_format", "text", &mut sources)?.parse()?;

        let config = Self {
            route_collisions,
            strict_exports,
            log_level,
            log_format,
            sources,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::validation_failed("log level must not be empty"));
        }
        validate_log_level("log_level", &self.log_level)
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = self.sources.clone();
        for field in ["route_collisions", "strict_exports", "log_level", "log_format"] {
            sources
                .entry(field.to_string())
                .or_insert(ConfigSource::Programmatic);
        }
        sources
    }
}
