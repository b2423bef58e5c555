use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where the pipeline reads raw sources from and writes artifacts to. Paths
/// are resolved here once, at pipeline start, rather than per stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_path: String,
    pub output_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_path: "data/raw".into(),
            output_path: "data/processed".into(),
        }
    }
}

impl Config {
    /// Resolve a raw-source filename against the base directory.
    pub fn source_path(&self, filename: &str) -> PathBuf {
        Path::new(&self.base_path).join(filename)
    }

    /// Resolve an artifact filename against the output directory.
    pub fn output_file(&self, filename: &str) -> PathBuf {
        Path::new(&self.output_path).join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrips_through_toml() {
        let config = Config {
            base_path: "/srv/data/raw".into(),
            output_path: "/srv/data/processed".into(),
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("base_path = \"elsewhere\"").unwrap();
        assert_eq!(config.base_path, "elsewhere");
        assert_eq!(config.output_path, Config::default().output_path);
    }
}
