//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the workflow engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HMAC secret for signing-link tokens. At least 32 characters.
    pub token_secret: String,

    /// Signing-link time-to-live in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,

    /// Font used for text placements when the signer names none.
    #[serde(default = "default_signature_font")]
    pub default_signature_font: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            default_signature_font: default_signature_font(),
        }
    }
}

fn default_token_ttl_hours() -> u64 {
    signflow_token::DEFAULT_TTL_HOURS
}

fn default_signature_font() -> String {
    "cursive".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.token_ttl_hours, 72);
        assert_eq!(config.default_signature_font, "cursive");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"token_secret": "secret-secret-secret-secret-1234"}"#)
                .unwrap();
        assert_eq!(config.token_ttl_hours, 72);
        assert_eq!(config.default_signature_font, "cursive");
    }
}
