use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Opaque configuration handle bound to a service at `init`.
///
/// The lifecycle driver never interprets the contents; the owning component's
/// hooks read whatever properties they need. Immutable once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Configuration profile name, for diagnostics only.
    #[serde(default)]
    pub profile: String,

    /// Free-form properties interpreted by the owning component.
    #[serde(default)]
    properties: HashMap<String, String>,
}

impl ServiceConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Load from a TOML file, with `SERVITOR_`-prefixed environment variables
    /// layered on top.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading service configuration from {}", path.display());

        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("SERVITOR").separator("__"))
            .build()?;

        let config: ServiceConfig = settings.try_deserialize()?;
        debug!(
            "Loaded configuration profile '{}' with {} properties",
            config.profile,
            config.properties.len()
        );
        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render the effective configuration as TOML, for dumping and debugging.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Builder for in-process configuration, mostly used by tests and embedders
/// that do not load from a file.
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    profile: String,
    properties: HashMap<String, String>,
}

impl ServiceConfigBuilder {
    pub fn profile<S: Into<String>>(mut self, profile: S) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn set<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ServiceConfig {
        ServiceConfig {
            profile: self.profile,
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_properties() {
        let config = ServiceConfig::builder()
            .profile("test")
            .set("listen.port", "8080")
            .set("workers", "4")
            .build();

        assert_eq!(config.profile, "test");
        assert_eq!(config.get("listen.port"), Some("8080"));
        assert_eq!(config.get("workers"), Some("4"));
        assert_eq!(config.get("missing"), None);
        assert_eq!(config.len(), 2);

        let mut keys: Vec<&str> = config.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["listen.port", "workers"]);
    }

    #[test]
    fn test_empty_config() {
        let config = ServiceConfig::new();
        assert!(config.is_empty());
        assert_eq!(config.profile, "");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ServiceConfig::builder()
            .profile("roundtrip")
            .set("key", "value")
            .build();

        let rendered = config.to_toml_string().unwrap();
        let parsed: ServiceConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("servitor-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "profile = \"filetest\"\n\n[properties]\nendpoint = \"localhost:9000\"\n",
        )
        .unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.profile, "filetest");
        assert_eq!(config.get("endpoint"), Some("localhost:9000"));
    }
}
