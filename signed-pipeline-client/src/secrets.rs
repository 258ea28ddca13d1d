//! Shared secret acquisition
//!
//! The secret is either passed directly or looked up by identifier in AWS
//! Secrets Manager. When the identifier is an ARN its region is used for the
//! lookup; the region of a secret ARN means nothing to the default credential
//! chain otherwise.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

use crate::error::{ClientError, Result};

static SECRET_ARN_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws:secretsmanager:([^:]+):").expect("invalid secret ARN pattern")
});

/// Region encoded in a Secrets Manager ARN, if the identifier is one
///
/// # Example
/// ```
/// use signed_pipeline_client::secrets::secret_region;
///
/// assert_eq!(
///     secret_region("arn:aws:secretsmanager:ap-southeast-2:1234567:secret:my-secret"),
///     Some("ap-southeast-2")
/// );
/// assert_eq!(secret_region("my-secret"), None);
/// ```
pub fn secret_region(secret_id: &str) -> Option<&str> {
    SECRET_ARN_REGION
        .captures(secret_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A store that maps secret identifiers to values
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the string value of a secret
    async fn get_secret(&self, secret_id: &str) -> Result<String>;
}

/// AWS Secrets Manager, configured from the default credential chain
#[derive(Debug, Clone, Default)]
pub struct AwsSecretsManager;

impl AwsSecretsManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn get_secret(&self, secret_id: &str) -> Result<String> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = secret_region(secret_id) {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        let client = aws_sdk_secretsmanager::Client::new(&config);

        let output = client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| ClientError::SecretStore {
                secret_id: secret_id.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| ClientError::SecretNotFound(secret_id.to_string()))
    }
}

/// Where the shared secret comes from
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// The secret itself
    Literal(String),
    /// Identifier (name or ARN) of a secret in a [`SecretStore`]
    Stored(String),
}

impl SecretSource {
    /// Resolve the secret value
    ///
    /// # Arguments
    /// * `store` - Store consulted for [`SecretSource::Stored`]
    pub async fn resolve(&self, store: &dyn SecretStore) -> Result<String> {
        match self {
            SecretSource::Literal(secret) => Ok(secret.clone()),
            SecretSource::Stored(secret_id) => {
                info!("Using secret from AWS SM {}", secret_id);
                store.get_secret(secret_id).await
            }
        }
    }
}

impl std::fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::Literal(_) => f.write_str("Literal(<redacted>)"),
            SecretSource::Stored(id) => f.debug_tuple("Stored").field(id).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct InMemoryStore {
        secrets: HashMap<String, String>,
        lookups: Mutex<Vec<String>>,
    }

    impl InMemoryStore {
        fn with(id: &str, value: &str) -> Self {
            Self {
                secrets: HashMap::from([(id.to_string(), value.to_string())]),
                lookups: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SecretStore for InMemoryStore {
        async fn get_secret(&self, secret_id: &str) -> Result<String> {
            self.lookups.lock().unwrap().push(secret_id.to_string());
            self.secrets
                .get(secret_id)
                .cloned()
                .ok_or_else(|| ClientError::SecretNotFound(secret_id.to_string()))
        }
    }

    #[test]
    fn test_parse_region_from_arn() {
        assert_eq!(
            secret_region("arn:aws:secretsmanager:ap-southeast-2:1234567:secret:my-global-secret"),
            Some("ap-southeast-2")
        );
    }

    #[test]
    fn test_parse_region_from_plain_id() {
        assert_eq!(secret_region("just-an-id"), None);
        assert_eq!(secret_region("arn:aws:s3:::bucket"), None);
    }

    #[tokio::test]
    async fn test_literal_secret_skips_store() {
        let store = InMemoryStore::with("id", "stored");

        let secret = SecretSource::Literal("llamas".to_string())
            .resolve(&store)
            .await
            .unwrap();

        assert_eq!(secret, "llamas");
        assert!(store.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_secret_looked_up() {
        let store = InMemoryStore::with("pipeline-secret", "alpacas");

        let secret = SecretSource::Stored("pipeline-secret".to_string())
            .resolve(&store)
            .await
            .unwrap();

        assert_eq!(secret, "alpacas");
        assert_eq!(*store.lookups.lock().unwrap(), vec!["pipeline-secret"]);
    }

    #[tokio::test]
    async fn test_missing_stored_secret() {
        let store = InMemoryStore::with("other", "x");

        let err = SecretSource::Stored("pipeline-secret".to_string())
            .resolve(&store)
            .await
            .unwrap_err();

        assert!(err.is_secret_error());
    }

    #[test]
    fn test_debug_redacts_literal() {
        let source = SecretSource::Literal("llamas".to_string());
        assert!(!format!("{source:?}").contains("llamas"));
    }
}
