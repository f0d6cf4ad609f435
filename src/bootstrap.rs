//! Wiring from a resolved [`Config`] to the shared comms state.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::comms::CommsState;
use crate::config::Config;
use crate::error::AppError;
use crate::knowledge::KnowledgeLookup;
use crate::llm::{prompt, providers};

/// Build the provider, knowledge lookup and system instruction described by
/// `config`. An unknown provider name is a configuration error; a missing
/// API key is not, it only makes delegated turns fall back.
pub fn build_state(config: &Config) -> Result<CommsState, AppError> {
    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Config(format!("llm: {e}")))?;

    if !provider.is_ready() {
        warn!(provider = provider.name(), "API_KEY is not set; model replies will fall back");
    }

    let knowledge = Arc::new(KnowledgeLookup::from_config(&config.knowledge));
    let system_instruction = prompt::system_instruction(&config.llm.system_prompt, &config.app_name);

    info!(
        provider = provider.name(),
        builtin = %config.knowledge.builtin,
        overlay = config.knowledge.overlay.as_deref().unwrap_or("-"),
        "state ready"
    );

    Ok(CommsState::new(
        config.app_name.clone(),
        knowledge,
        provider,
        system_instruction,
        Duration::from_millis(config.knowledge.local_reply_delay_ms),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_from_test_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default-database.json"),
            r#"[{"keywords":["fever"],"response":"R1"}]"#,
        )
        .unwrap();
        let state = build_state(&Config::test_default(dir.path())).unwrap();
        assert_eq!(state.provider().name(), "dummy");
        assert_eq!(state.knowledge().load().await, 1);
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp"));
        cfg.llm.provider = "nope".into();
        assert!(matches!(build_state(&cfg), Err(AppError::Config(_))));
    }
}
