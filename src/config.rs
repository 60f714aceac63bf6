use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,

    // Storage
    pub database_path: String,

    // Server
    pub host: String,
    pub port: u16,

    // Access control: (token, owner) pairs. Empty means open access.
    pub auth_tokens: Vec<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // OpenAI
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY not set")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),

            // Storage
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "arabicwriter.db".to_string()),

            // Server
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),

            auth_tokens: match std::env::var("AUTH_TOKENS") {
                Ok(raw) => parse_auth_tokens(&raw).context("AUTH_TOKENS is malformed")?,
                Err(_) => Vec::new(),
            },
        })
    }

    /// Whether callers must present a bearer token
    pub fn auth_enabled(&self) -> bool {
        !self.auth_tokens.is_empty()
    }
}

/// Parse `token=owner` pairs separated by commas
fn parse_auth_tokens(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (token, owner) = pair
                .split_once('=')
                .with_context(|| format!("expected token=owner, got '{}'", pair))?;
            let (token, owner) = (token.trim(), owner.trim());
            if token.is_empty() || owner.is_empty() {
                anyhow::bail!("token and owner must both be non-empty in '{}'", pair);
            }
            Ok((token.to_string(), owner.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_API_URL",
        "DATABASE_PATH",
        "HOST",
        "PORT",
        "AUTH_TOKENS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    // ==================== from_env Tests ====================

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-test");

        let config = Config::from_env().expect("Should load config");
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(
            config.openai_api_url,
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(config.database_path, "arabicwriter.db");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert!(!config.auth_enabled());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_api_key() {
        clear_env();

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("OPENAI_MODEL", "gpt-4o");
        std::env::set_var("DATABASE_PATH", "/data/words.db");
        std::env::set_var("PORT", "8080");
        std::env::set_var("AUTH_TOKENS", "abc=alice, def=bob");

        let config = Config::from_env().expect("Should load config");
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.database_path, "/data/words.db");
        assert_eq!(config.port, 8080);
        assert!(config.auth_enabled());
        assert_eq!(
            config.auth_tokens,
            vec![
                ("abc".to_string(), "alice".to_string()),
                ("def".to_string(), "bob".to_string()),
            ]
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port_falls_back() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("PORT", "not-a-port");

        let config = Config::from_env().expect("Should load config");
        assert_eq!(config.port, 5000);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_malformed_auth_tokens() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("AUTH_TOKENS", "missing-separator");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    // ==================== parse_auth_tokens Tests ====================

    #[test]
    fn test_parse_auth_tokens_skips_blank_pairs() {
        let tokens = parse_auth_tokens("a=1,, ,b=2,").expect("Should parse");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_parse_auth_tokens_rejects_empty_owner() {
        assert!(parse_auth_tokens("token=").is_err());
        assert!(parse_auth_tokens("=owner").is_err());
    }
}
