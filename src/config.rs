use std::fs;
use std::path::Path;

use serde::Deserialize;

// Missing file yields defaults; only a malformed one is an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub show_volume_label: bool,
    pub confirm_destructive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            show_volume_label: true,
            confirm_destructive: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/fat12ed.toml")).unwrap();
        assert_eq!(config.log_level, "info");
        assert!(config.show_volume_label);
        assert!(!config.confirm_destructive);
    }

    #[test]
    fn parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fat12ed.toml");
        fs::write(&path, "show_volume_label = false\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert!(!config.show_volume_label);
        assert_eq!(config.log_level, "info");
    }
}
