use std::env;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::personality::Personality;

pub const CONFIG_ENV: &str = "HONEYCLIENT_CONFIG";
const CONFIG_FILE: &str = "honeyclient.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown personality `{0}`")]
    UnknownPersonality(String),
}

/// Run options shared by every browsing context of an analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    pub personality: String,
    /// DOM events handled in addition to `load` and `mousemove`.
    pub events: Vec<String>,
    pub java_plugin: String,
    pub follow_meta_refresh: bool,
    pub follow_frames: bool,
    pub follow_links: bool,
    pub inspect_font_faces: bool,
    pub max_navigation_depth: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            personality: "winxpie60".to_string(),
            events: Vec::new(),
            java_plugin: "1.6.0.32".to_string(),
            follow_meta_refresh: false,
            follow_frames: false,
            follow_links: false,
            inspect_font_faces: false,
            max_navigation_depth: 8,
            fetch_timeout_secs: 10,
        }
    }
}

impl Options {
    /// Load options from `config_path`, then `$HONEYCLIENT_CONFIG`, then the
    /// platform config directory. Missing files yield the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);
        let options = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Self::from_yaml(&contents)?
            }
            _ => Self::default(),
        };
        options.personality()?;
        Ok(options)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn personality(&self) -> Result<&'static Personality, ConfigError> {
        Personality::lookup(&self.personality)
            .ok_or_else(|| ConfigError::UnknownPersonality(self.personality.clone()))
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "honeyclient", "honeyclient")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_when_file_missing() {
        let options = Options::load(Some(PathBuf::from("/nonexistent/honeyclient.yaml"))).unwrap();
        assert_eq!(options.personality, "winxpie60");
        assert_eq!(options.max_navigation_depth, 8);
        assert!(!options.follow_meta_refresh);
        assert!(options.events.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "personality: win7ie90\nevents:\n  - click\n  - mouseover\nfollow_frames: true"
        )
        .unwrap();
        let options = Options::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(options.personality, "win7ie90");
        assert_eq!(options.events, vec!["click", "mouseover"]);
        assert!(options.follow_frames);
        assert!(!options.follow_links);
        assert_eq!(options.java_plugin, "1.6.0.32");
    }

    #[test]
    fn rejects_unknown_personality() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "personality: mosaic1").unwrap();
        let err = Options::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPersonality(name) if name == "mosaic1"));
    }
}
