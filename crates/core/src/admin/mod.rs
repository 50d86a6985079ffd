//! Admin API module
//!
//! The policy operations the store exposes only through its administrative
//! endpoint, outside the standard S3 API.

mod policy;

pub use policy::Policy;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Canned policy management
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyApi: Send + Sync {
    /// Create or replace a canned policy with the literal document
    async fn create_policy(&self, name: &str, document: &str) -> Result<()>;

    /// Fetch a canned policy
    ///
    /// Fails with `Error::PolicyNotFound` when the store has no such policy.
    async fn get_policy(&self, name: &str) -> Result<Policy>;

    /// Whether a canned policy exists
    ///
    /// Failures other than "not found" are returned as errors, since existence
    /// cannot be decided from them.
    async fn policy_exists(&self, name: &str) -> Result<bool> {
        match self.get_policy(name).await {
            Ok(_) => Ok(true),
            Err(Error::PolicyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_policy_api_mock_not_found() {
        let mut api = MockPolicyApi::new();
        api.expect_get_policy()
            .returning(|name| Err(Error::PolicyNotFound(name.to_string())));

        let err = api.get_policy("missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Policy missing does not exist");
    }
}
