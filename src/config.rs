//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the file named by `VILUX_CONFIG`) relative
//! to the current working directory, then applies the `VILUX_LOG_LEVEL`
//! override. The model API key comes from `API_KEY` and is never read from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Knowledge base sources and local-answer behaviour.
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    /// Mandatory dataset: a filesystem path or an `http(s)://` URL.
    pub builtin: String,
    /// Optional user overlay, searched before the builtin entries.
    pub overlay: Option<String>,
    /// Pause applied before returning a local answer, in milliseconds.
    pub local_reply_delay_ms: u64,
}

/// Gemini provider configuration.
/// Populated from `[llm.gemini]` in the TOML.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API root, without the `/models/...` suffix.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"gemini"` or `"dummy"`).
    pub provider: String,
    /// File holding the system instruction. Falls back to the built-in text
    /// when unreadable.
    pub system_prompt: PathBuf,
    pub gemini: GeminiConfig,
}

/// Axum HTTP channel configuration.
#[derive(Debug, Clone)]
pub struct AxumChannelConfig {
    pub enabled: bool,
    pub bind: String,
    /// Largest accepted `/api/chat` request body. Images travel base64-encoded
    /// inside it.
    pub max_body_bytes: usize,
}

/// Comms configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub axum: AxumChannelConfig,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub log_level: String,
    pub knowledge: KnowledgeConfig,
    pub llm: LlmConfig,
    pub comms: CommsConfig,
    /// API key from the `API_KEY` env var. `None` is allowed at startup; the
    /// remote provider refuses to open a session without it.
    pub llm_api_key: Option<String>,
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    app: RawApp,
    #[serde(default)]
    knowledge: RawKnowledge,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    comms: RawComms,
}

#[derive(Deserialize)]
struct RawApp {
    #[serde(default = "default_app_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawApp {
    fn default() -> Self {
        Self { name: default_app_name(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawKnowledge {
    #[serde(default = "default_builtin_dataset")]
    builtin: String,
    /// Empty string disables the overlay.
    #[serde(default = "default_overlay_dataset")]
    overlay: String,
    #[serde(default)]
    local_reply_delay_ms: u64,
}

impl Default for RawKnowledge {
    fn default() -> Self {
        Self {
            builtin: default_builtin_dataset(),
            overlay: default_overlay_dataset(),
            local_reply_delay_ms: 0,
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_system_prompt")]
    system_prompt: String,
    #[serde(default)]
    gemini: RawGeminiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            system_prompt: default_system_prompt(),
            gemini: RawGeminiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawGeminiConfig {
    #[serde(default = "default_gemini_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_gemini_model")]
    model: String,
    #[serde(default = "default_gemini_temperature")]
    temperature: f32,
    #[serde(default = "default_gemini_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawGeminiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api_base_url(),
            model: default_gemini_model(),
            temperature: default_gemini_temperature(),
            timeout_seconds: default_gemini_timeout_seconds(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    axum: RawAxum,
}

#[derive(Deserialize)]
struct RawAxum {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_max_body_bytes")]
    max_body_bytes: usize,
}

impl Default for RawAxum {
    fn default() -> Self {
        Self { enabled: true, bind: default_bind(), max_body_bytes: default_max_body_bytes() }
    }
}

fn default_app_name() -> String { "vilux-care".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_builtin_dataset() -> String { "data/default-database.json".to_string() }
fn default_overlay_dataset() -> String { "data/user-database.json".to_string() }
fn default_llm_provider() -> String { "gemini".to_string() }
fn default_system_prompt() -> String { "config/prompts/system.md".to_string() }
fn default_gemini_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String { "gemini-2.5-flash".to_string() }
fn default_gemini_temperature() -> f32 { 0.7 }
fn default_gemini_timeout_seconds() -> u64 { 60 }
fn default_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_true() -> bool { true }
/// Gemini caps a request with inline data at 20 MB.
fn default_max_body_bytes() -> usize { 20 * 1024 * 1024 }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `VILUX_CONFIG` or `config/default.toml`, then apply
/// env-var overrides. A missing default file yields built-in defaults; a
/// missing explicitly named file is an error.
pub fn load() -> Result<Config, AppError> {
    let log_level_override = env::var("VILUX_LOG_LEVEL").ok();
    let api_key = env::var("API_KEY").ok().filter(|k| !k.trim().is_empty());

    if let Ok(path) = env::var("VILUX_CONFIG") {
        return load_from(Path::new(&path), log_level_override.as_deref(), api_key);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, log_level_override.as_deref(), api_key)
    } else {
        Ok(resolve(RawConfig::default(), log_level_override.as_deref(), api_key))
    }
}

/// Internal loader: accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    api_key: Option<String>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    Ok(resolve(parsed, log_level_override, api_key))
}

fn resolve(parsed: RawConfig, log_level_override: Option<&str>, api_key: Option<String>) -> Config {
    let overlay = Some(parsed.knowledge.overlay).filter(|o| !o.trim().is_empty());

    Config {
        app_name: parsed.app.name,
        log_level: log_level_override.unwrap_or(&parsed.app.log_level).to_string(),
        knowledge: KnowledgeConfig {
            builtin: expand_source(&parsed.knowledge.builtin),
            overlay: overlay.as_deref().map(expand_source),
            local_reply_delay_ms: parsed.knowledge.local_reply_delay_ms,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            system_prompt: expand_home(&parsed.llm.system_prompt),
            gemini: GeminiConfig {
                api_base_url: parsed.llm.gemini.api_base_url,
                model: parsed.llm.gemini.model,
                temperature: parsed.llm.gemini.temperature,
                timeout_seconds: parsed.llm.gemini.timeout_seconds,
            },
        },
        comms: CommsConfig {
            axum: AxumChannelConfig {
                enabled: parsed.comms.axum.enabled,
                bind: parsed.comms.axum.bind,
                max_body_bytes: parsed.comms.axum.max_body_bytes,
            },
        },
        llm_api_key: api_key,
    }
}

/// URLs pass through; filesystem paths get `~` expansion.
fn expand_source(source: &str) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        source.to_string()
    } else {
        expand_home(source).to_string_lossy().into_owned()
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests: dummy LLM, no API key, no network, datasets
    /// rooted at `data_dir`.
    pub fn test_default(data_dir: &Path) -> Self {
        Self {
            app_name: "test".into(),
            log_level: "info".into(),
            knowledge: KnowledgeConfig {
                builtin: data_dir.join("default-database.json").to_string_lossy().into_owned(),
                overlay: Some(data_dir.join("user-database.json").to_string_lossy().into_owned()),
                local_reply_delay_ms: 0,
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                system_prompt: data_dir.join("system.md"),
                gemini: GeminiConfig {
                    api_base_url: "http://localhost:0/v1beta".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            comms: CommsConfig {
                axum: AxumChannelConfig {
                    enabled: false,
                    bind: default_bind(),
                    max_body_bytes: default_max_body_bytes(),
                },
            },
            llm_api_key: None,
        }
    }
}
