//! A minimal seam for attaching a bearer token to outgoing remote requests.
//! The OAuth2 interactive login flow and token persistence live outside this
//! crate; this just yields whatever token the caller already obtained.

use anyhow::Result;
use async_trait::async_trait;

/// Yields a bearer token for outgoing Remote Client requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A credential provider backed by a fixed token, e.g. read once from an
/// environment variable or config file by the Control Plane at startup.
pub struct StaticCredentialProvider {
    token: String,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_fixed_token() {
        let provider = StaticCredentialProvider::new("abc123");
        assert_eq!(provider.token().await.unwrap(), "abc123");
    }
}
