//! Configuration module
//!
//! Resolved settings shared by every subcommand.

use anyhow::{Result, bail};
use signed_pipeline_client::SecretSource;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the shared secret comes from
    pub secret_source: SecretSource,
    /// Build-scope token mixed into every signature
    pub build_id: String,
    /// Names this tool answers to, used by the unsigned-command allow list
    pub tool_names: Vec<String>,
}

impl Config {
    /// Build a configuration from the global flags
    ///
    /// At least one of `shared_secret` and `aws_sm_secret_id` must be set;
    /// when both are, the Secrets Manager id wins. Empty values count as
    /// unset, since both flags can arrive through environment variables that
    /// are present but blank.
    pub fn from_flags(
        shared_secret: Option<String>,
        aws_sm_secret_id: Option<String>,
        build_id: String,
        tool_names: Vec<String>,
    ) -> Result<Self> {
        let shared_secret = shared_secret.filter(|s| !s.is_empty());
        let aws_sm_secret_id = aws_sm_secret_id.filter(|s| !s.is_empty());

        let secret_source = match (shared_secret, aws_sm_secret_id) {
            (_, Some(secret_id)) => SecretSource::Stored(secret_id),
            (Some(secret), None) => SecretSource::Literal(secret),
            (None, None) => {
                bail!("One of --shared-secret or --aws-sm-shared-secret-id must be provided")
            }
        };

        let config = Self {
            secret_source,
            build_id,
            tool_names,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.tool_names.is_empty() {
            bail!("Could not determine the name of this executable");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> Vec<String> {
        vec!["buildkite-signed-pipeline".to_string()]
    }

    #[test]
    fn test_literal_secret() {
        let config =
            Config::from_flags(Some("llamas".to_string()), None, "b1".to_string(), tools())
                .unwrap();

        assert_eq!(config.secret_source, SecretSource::Literal("llamas".to_string()));
        assert_eq!(config.build_id, "b1");
    }

    #[test]
    fn test_stored_secret() {
        let config = Config::from_flags(
            None,
            Some("arn:aws:secretsmanager:us-east-1:1:secret:s".to_string()),
            String::new(),
            tools(),
        )
        .unwrap();

        assert!(matches!(config.secret_source, SecretSource::Stored(_)));
    }

    #[test]
    fn test_missing_secret_rejected() {
        assert!(Config::from_flags(None, None, String::new(), tools()).is_err());
        assert!(
            Config::from_flags(Some(String::new()), Some(String::new()), String::new(), tools())
                .is_err()
        );
    }

    #[test]
    fn test_stored_secret_wins_over_literal() {
        let config = Config::from_flags(
            Some("llamas".to_string()),
            Some("secret-id".to_string()),
            String::new(),
            tools(),
        )
        .unwrap();

        assert_eq!(config.secret_source, SecretSource::Stored("secret-id".to_string()));
    }

    #[test]
    fn test_blank_flag_ignored() {
        let config = Config::from_flags(
            Some(String::new()),
            Some("secret-id".to_string()),
            String::new(),
            tools(),
        )
        .unwrap();

        assert_eq!(config.secret_source, SecretSource::Stored("secret-id".to_string()));
    }

    #[test]
    fn test_tool_names_required() {
        assert!(Config::from_flags(Some("x".to_string()), None, String::new(), vec![]).is_err());
    }
}
