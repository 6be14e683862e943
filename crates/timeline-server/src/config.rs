use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use timeline_core::TimelineConfig;
use timeline_llm::openai_compat::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const CONFIG_FILE_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub model: Option<String>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub timeline: TimelineConfig,
}

fn forking_paths_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".forking-paths")
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl ServerConfig {
    /// `~/.forking-paths/config.json`, else `./config.toml`, then the
    /// environment.
    pub fn load() -> Self {
        let mut config = Self::from_files(
            &forking_paths_dir().join("config.json"),
            Path::new(CONFIG_FILE_PATH),
        );
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_files(json_path: &Path, toml_path: &Path) -> Self {
        if json_path.exists() {
            match std::fs::read_to_string(json_path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
            {
                Ok(config) => return config,
                Err(e) => log::warn!("Ignoring unreadable config {:?}: {}", json_path, e),
            }
        }

        if toml_path.exists() {
            match std::fs::read_to_string(toml_path)
                .map_err(|e| e.to_string())
                .and_then(|content| toml::from_str(&content).map_err(|e| e.to_string()))
            {
                Ok(config) => return config,
                Err(e) => log::warn!("Ignoring unreadable config {:?}: {}", toml_path, e),
            }
        }

        Self::default()
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            self.llm_base_url = Some(base_url);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.model = Some(model);
        }
        if let Some(site_url) = lookup("SITE_URL") {
            self.site_url = Some(site_url);
        }
        if let Some(site_name) = lookup("SITE_NAME") {
            self.site_name = Some(site_name);
        }
        if let Some(allow) = lookup("TIMELINE_ALLOW_ROOT_BRANCH") {
            self.timeline.allow_root_branch = parse_bool_env(&allow);
        }
    }

    pub fn llm_base_url(&self) -> &str {
        self.llm_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| forking_paths_dir().join("sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_bool_env_true_values() {
        for value in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
    }

    #[test]
    fn parse_bool_env_false_values() {
        for value in ["0", "false", "no", "off", "", "  "] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn json_config_wins_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("config.json");
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&json_path, r#"{"model": "from-json"}"#).unwrap();
        std::fs::write(&toml_path, "model = \"from-toml\"\n").unwrap();

        let config = ServerConfig::from_files(&json_path, &toml_path);

        assert_eq!(config.model(), "from-json");
        assert_eq!(config.llm_base_url(), "https://api.x.ai/v1");
    }

    #[test]
    fn toml_config_reads_nested_timeline_settings() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("config.toml");
        std::fs::write(
            &toml_path,
            "site_name = \"Forking Paths\"\n\n[timeline]\nprompt_lock_threshold = 4\n\n[timeline.layout]\nbase_x = 100.0\n",
        )
        .unwrap();

        let config = ServerConfig::from_files(&dir.path().join("missing.json"), &toml_path);

        assert_eq!(config.site_name.as_deref(), Some("Forking Paths"));
        assert_eq!(config.timeline.prompt_lock_threshold, 4);
        assert_eq!(config.timeline.layout.base_x, 100.0);
        assert_eq!(config.timeline.layout.base_y, 300.0);
        assert_eq!(config.model(), "grok-beta");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ServerConfig {
            model: Some("from-file".to_string()),
            ..Default::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            ("LLM_MODEL", "from-env"),
            ("LLM_API_KEY", "sk-env"),
            ("TIMELINE_ALLOW_ROOT_BRANCH", "yes"),
        ]);

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.model(), "from-env");
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert!(config.timeline.allow_root_branch);
        assert!(config.site_url.is_none());
    }
}
