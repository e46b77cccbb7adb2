//! API key lookup.

use crate::config::ConfigError;
use crate::operator::Operator;
use crate::perception::VisionProvider;
use tracing::{info, instrument, warn};

/// API key for `provider`: the environment first, then the operator.
///
/// An empty or missing answer is a configuration error.
#[instrument(skip(operator))]
pub async fn resolve_api_key(provider: VisionProvider, operator: &dyn Operator) -> Result<String, ConfigError> {
    let var = provider.env_var();
    if let Ok(key) = std::env::var(var)
        && !key.trim().is_empty()
    {
        info!(var, "API key found in environment");
        return Ok(key.trim().to_string());
    }

    warn!(var, "API key not set in environment");
    let answer = operator
        .ask(&format!("Please enter your {} API key: ", provider))
        .await
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if answer.is_empty() {
        return Err(ConfigError::new(format!("no {} API key supplied ({} unset)", provider, var)));
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::ScriptedOperator;

    // Both tests rely on ANTHROPIC_API_KEY being unset in the test environment.
    #[tokio::test]
    async fn test_prompts_when_env_missing() {
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        let op = ScriptedOperator::new(["  sk-test  "]);
        assert_eq!(resolve_api_key(VisionProvider::Anthropic, &op).await.unwrap(), "sk-test");
        assert!(op.transcript()[0].contains("Anthropic API key"));
    }

    #[tokio::test]
    async fn test_empty_answer_is_config_error() {
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        let op = ScriptedOperator::new([""]);
        assert!(resolve_api_key(VisionProvider::Anthropic, &op).await.is_err());
    }
}
