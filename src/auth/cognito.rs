//! Cognito user pool login.

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
use aws_sdk_cognitoidentityprovider::operation::initiate_auth::InitiateAuthError;
use aws_sdk_cognitoidentityprovider::types::{AuthFlowType, AuthenticationResultType};
use aws_sdk_cognitoidentityprovider::Client;
use tracing::{info, warn};

use super::{secret_hash, IdentityProvider, Tokens};
use crate::error::{AuthFailure, Result, SentraError};

/// Identity provider backed by a Cognito app client with a client secret.
pub struct CognitoIdentityProvider {
    client: Client,
    client_id: String,
    client_secret: String,
}

impl CognitoIdentityProvider {
    pub fn new(client: Client, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn login(&self, username: &str, password: &str) -> Result<Tokens> {
        let hash = secret_hash(username, &self.client_id, &self.client_secret)?;

        let response = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .auth_parameters("SECRET_HASH", hash)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                let kind = failure_kind(&e.into_service_error());
                warn!(username, kind = %kind, "Login rejected");
                SentraError::auth(kind, message)
            })?;

        let Some(result) = response.authentication_result() else {
            let challenge = response
                .challenge_name()
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(SentraError::auth(
                AuthFailure::Other,
                format!("Login requires an additional challenge: {challenge}"),
            ));
        };

        info!(username, "Login succeeded");
        Ok(tokens_from_result(result))
    }
}

fn failure_kind(error: &InitiateAuthError) -> AuthFailure {
    match error {
        InitiateAuthError::NotAuthorizedException(_) => AuthFailure::NotAuthorized,
        InitiateAuthError::UserNotConfirmedException(_) => AuthFailure::NotConfirmed,
        _ => AuthFailure::Other,
    }
}

fn tokens_from_result(result: &AuthenticationResultType) -> Tokens {
    Tokens {
        id_token: result.id_token().unwrap_or_default().to_string(),
        access_token: result.access_token().unwrap_or_default().to_string(),
        refresh_token: result.refresh_token().unwrap_or_default().to_string(),
        token_type: result.token_type().unwrap_or_default().to_string(),
        expires_in: result.expires_in(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_cognitoidentityprovider::types::error::{
        NotAuthorizedException, UserNotConfirmedException,
    };

    #[test]
    fn test_failure_kind_mapping() {
        let not_authorized =
            InitiateAuthError::NotAuthorizedException(NotAuthorizedException::builder().build());
        assert_eq!(failure_kind(&not_authorized), AuthFailure::NotAuthorized);

        let not_confirmed = InitiateAuthError::UserNotConfirmedException(
            UserNotConfirmedException::builder().build(),
        );
        assert_eq!(failure_kind(&not_confirmed), AuthFailure::NotConfirmed);
    }

    #[test]
    fn test_tokens_from_result() {
        let result = AuthenticationResultType::builder()
            .id_token("id")
            .access_token("access")
            .refresh_token("refresh")
            .token_type("Bearer")
            .expires_in(3600)
            .build();

        let tokens = tokens_from_result(&result);

        assert_eq!(tokens.id_token, "id");
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 3600);
    }
}
