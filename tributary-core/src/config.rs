use std::path::PathBuf;
use std::sync::RwLock;

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::display;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

/// Process-wide runtime switches, set once at dispatch.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Answer prompts without asking: confirmations become yes, deletion
    /// review becomes keep-all.
    pub assume_yes: bool,
}

pub fn set_config(new_config: Config) {
    *CONFIG.write().unwrap() = new_config;
}

pub fn get_config() -> Config {
    CONFIG.read().unwrap().clone()
}

pub const DEFAULT_ORACLE_MODEL: &str = "openai/gpt-4o-mini";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const MODEL_ENV: &str = "OPENROUTER_MODEL";

/// Shape of `config.toml` in the user's config home.
#[derive(Clone, Debug, Default, Deserialize)]
struct FileSettings {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// Resolved OpenRouter credentials for the merge oracle.
#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
}

fn config_home() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TRIBUTARY_CONFIG_HOME") {
        return Some(PathBuf::from(dir));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("tributary"))
}

fn load_file_settings() -> FileSettings {
    let Some(path) = config_home().map(|dir| dir.join("config.toml")) else {
        return FileSettings::default();
    };
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return FileSettings::default(),
    };
    match toml::from_str(&raw) {
        Ok(settings) => settings,
        Err(err) => {
            display::warn(format!("ignoring malformed {}: {err}", path.display()));
            FileSettings::default()
        }
    }
}

/// Credential/model layering, highest precedence first: the task's own
/// configuration, then the environment, then the config file.
pub fn resolve_oracle_config(
    task_model: Option<&str>,
    task_api_key_env: Option<&str>,
) -> Result<OracleConfig, Box<dyn std::error::Error>> {
    let file = load_file_settings();

    let api_key = task_api_key_env
        .and_then(|name| std::env::var(name).ok())
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .or(file.api_key)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            format!(
                "no OpenRouter API key configured; set {API_KEY_ENV} or add api_key to the tributary config file"
            )
        })?;

    let model = task_model
        .map(str::to_string)
        .or_else(|| std::env::var(MODEL_ENV).ok())
        .or(file.model)
        .filter(|model| !model.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string());

    Ok(OracleConfig { api_key, model })
}
