//! Application settings storage
//!
//! Stores configuration like the Ollama endpoint and the category catalog in a
//! JSON file in the app data directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::classify;

/// Global settings instance
static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

/// Path to config file (set during init)
static CONFIG_PATH: RwLock<Option<PathBuf>> = RwLock::new(None);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Ollama endpoint (default: "http://localhost:11434")
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
    /// Ollama model name (default: "qwen2.5:7b")
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Page fetch timeout in seconds (default: 10)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Per-call model timeout in seconds (default: 20)
    #[serde(default = "default_classify_timeout")]
    pub classify_timeout_secs: u64,
    /// Ordered category catalog used by the response parser
    #[serde(default = "classify::default_catalog")]
    pub catalog: Vec<String>,
    #[serde(default)]
    pub custom_db_path: Option<String>,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_classify_timeout() -> u64 {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_base_url: default_ollama_base_url(),
            ollama_model: default_ollama_model(),
            fetch_timeout_secs: 10,
            classify_timeout_secs: 20,
            catalog: classify::default_catalog(),
            custom_db_path: None,
        }
    }
}

impl Settings {
    /// Load settings from disk or create default
    fn load(path: &PathBuf) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => settings,
                    Err(e) => {
                        eprintln!("[Settings] Failed to parse {}: {}", path.display(), e);
                        Settings::default()
                    }
                },
                Err(e) => {
                    eprintln!("[Settings] Failed to read {}: {}", path.display(), e);
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        }
    }

    /// Save settings to disk
    fn save(&self, path: &PathBuf) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }
        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
    }
}

/// Initialize settings from the app data directory. Call once at startup.
pub fn init(app_data_dir: PathBuf) {
    let config_path = app_data_dir.join("settings.json");
    let settings = Settings::load(&config_path);

    *SETTINGS.write().unwrap() = Some(settings);
    *CONFIG_PATH.write().unwrap() = Some(config_path);
}

/// Get a snapshot of the current settings (defaults if init was never called).
pub fn current() -> Settings {
    SETTINGS.read().unwrap().clone().unwrap_or_default()
}

pub fn get_ollama_base_url() -> String {
    current().ollama_base_url
}

pub fn get_ollama_model() -> String {
    current().ollama_model
}

pub fn get_fetch_timeout_secs() -> u64 {
    current().fetch_timeout_secs
}

pub fn get_classify_timeout_secs() -> u64 {
    current().classify_timeout_secs
}

/// The ordered category catalog for the response parser.
pub fn get_catalog() -> Vec<String> {
    current().catalog
}

pub fn get_custom_db_path() -> Option<String> {
    current().custom_db_path
}

/// Set the Ollama model name and persist.
pub fn set_ollama_model(model: &str) -> Result<(), String> {
    if model.trim().is_empty() {
        return Err("Ollama model name cannot be empty".to_string());
    }
    update(|s| s.ollama_model = model.trim().to_string())
}

/// Set the Ollama endpoint and persist.
pub fn set_ollama_base_url(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        return Err("Ollama base URL cannot be empty".to_string());
    }
    update(|s| s.ollama_base_url = url.trim().trim_end_matches('/').to_string())
}

fn update(f: impl FnOnce(&mut Settings)) -> Result<(), String> {
    let mut guard = SETTINGS.write().unwrap();
    let mut settings = guard.clone().unwrap_or_default();
    f(&mut settings);

    if let Some(path) = CONFIG_PATH.read().unwrap().as_ref() {
        settings.save(path)?;
    }
    *guard = Some(settings);
    Ok(())
}
