//! Mock identity provider for testing and `--mock` runs.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{IdentityProvider, Tokens};
use crate::error::{AuthFailure, Result, SentraError};

/// Identity provider with a fixed set of accounts.
#[derive(Debug, Clone, Default)]
pub struct MockIdentityProvider {
    /// username -> (password, confirmed)
    accounts: HashMap<String, (String, bool)>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a confirmed account.
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(username.into(), (password.into(), true));
        self
    }

    /// Adds an account that has not been confirmed yet.
    pub fn with_unconfirmed_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.accounts.insert(username.into(), (password.into(), false));
        self
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn login(&self, username: &str, password: &str) -> Result<Tokens> {
        match self.accounts.get(username) {
            Some((expected, _)) if expected != password => Err(SentraError::auth(
                AuthFailure::NotAuthorized,
                "Incorrect username or password.",
            )),
            Some((_, false)) => Err(SentraError::auth(
                AuthFailure::NotConfirmed,
                "User is not confirmed.",
            )),
            Some((_, true)) => Ok(Tokens {
                id_token: format!("mock-id-{username}"),
                access_token: format!("mock-access-{username}"),
                refresh_token: format!("mock-refresh-{username}"),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
            }),
            None => Err(SentraError::auth(
                AuthFailure::NotAuthorized,
                "Incorrect username or password.",
            )),
        }
    }
}
