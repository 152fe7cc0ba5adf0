/// Provenance of a `ComposerConfig` field, as reported by `config_sources()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the named `MODGRAPH_*` variable
    EnvVar(String),
    /// Variable unset; the composer's built-in default applied
    Default(String),
    /// Set through a `ComposerConfig::with_*` call
    Programmatic,
}

impl ConfigSource {
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }

    /// Short label used when the composer logs its effective settings
    pub fn description(&self) -> String {
        match self {
            ConfigSource::EnvVar(var) => format!("from {}", var),
            ConfigSource::Default(value) => format!("default ({})", value),
            ConfigSource::Programmatic => "set by builder".to_string(),
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_labels() {
        let env = ConfigSource::EnvVar("MODGRAPH_LOG_LEVEL".to_string());
        assert!(env.is_env_var());
        assert_eq!(env.to_string(), "from MODGRAPH_LOG_LEVEL");

        let default = ConfigSource::Default("allow".to_string());
        assert!(default.is_default());
        assert_eq!(default.to_string(), "default (allow)");

        assert_eq!(ConfigSource::Programmatic.to_string(), "set by builder");
    }
}
