use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration as StdDuration;

use crate::core::state::Language;

const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub script: ScriptConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// Falls back to GEMINI_API_KEY, then API_KEY.
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Unset means poll until the job finishes.
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScriptConfig {
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_scene_duration")]
    pub scene_duration_seconds: u32,
    #[serde(default)]
    pub suppress_narration: bool,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_video_model() -> String {
    "veo-2.0-generate-001".to_string()
}
fn default_poll_interval() -> u64 {
    10
}
fn default_aspect_ratio() -> String {
    "9:16".to_string()
}
fn default_scene_duration() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            llm: LlmConfig::default(),
            video: VideoConfig::default(),
            script: ScriptConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            text_model: default_text_model(),
            video_model: default_video_model(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            max_poll_attempts: None,
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            scene_duration_seconds: default_scene_duration(),
            suppress_narration: false,
        }
    }
}

impl LlmConfig {
    /// The configured key, or the first non-empty one found in the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
            .or_else(|| std::env::var("API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}

impl VideoConfig {
    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.poll_interval_seconds)
    }
}

impl Config {
    /// Reads `config.yml` from the working directory, or defaults if it is absent.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            log::info!("{} not found, using defaults", CONFIG_FILE);
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
