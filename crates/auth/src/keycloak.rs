//! Keycloak direct-access (password) grant authenticator.
//!
//! Async HTTP client using `reqwest` against a realm's OIDC token endpoint.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::token::TokenResponse;
use crate::{AuthError, Credential, TokenAuthenticator, TokenSet};

/// Location of a realm's token endpoint.
#[derive(Debug, Clone)]
pub struct KeycloakEndpoint {
    auth_server_url: String,
    realm: String,
    client_id: String,
}

impl KeycloakEndpoint {
    pub fn new(
        auth_server_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            auth_server_url: auth_server_url.into().trim_end_matches('/').to_string(),
            realm: realm.into(),
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Full URL of the OIDC token endpoint.
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.auth_server_url, self.realm
        )
    }

    /// Full URL of the OIDC logout endpoint.
    pub fn logout_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/logout",
            self.auth_server_url, self.realm
        )
    }
}

/// Password-grant authenticator holding the one live [`TokenSet`].
///
/// Single-attempt by design: a failed grant is reported immediately, retry
/// policy belongs to the caller (see [`crate::authenticate_with_retry`]).
pub struct DirectGrantAuthenticator {
    http: reqwest::Client,
    endpoint: KeycloakEndpoint,
    tokens: Option<TokenSet>,
}

impl DirectGrantAuthenticator {
    pub fn new(endpoint: KeycloakEndpoint) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            tokens: None,
        }
    }

    /// Adopts an externally obtained token set.
    ///
    /// Token-passthrough variant: the caller already holds tokens (for
    /// example from a browser flow) and only needs refresh handling.
    pub fn with_tokens(endpoint: KeycloakEndpoint, tokens: TokenSet) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            tokens: Some(tokens),
        }
    }

    pub fn endpoint(&self) -> &KeycloakEndpoint {
        &self.endpoint
    }

    pub fn token_set(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    /// Revokes the current session at the realm's logout endpoint.
    ///
    /// Invalidates the refresh token server-side and drops the local token
    /// set on success. A rejected revocation keeps the tokens in place so
    /// the caller can retry.
    pub async fn revoke(&mut self) -> Result<(), AuthError> {
        let refresh_token = self
            .tokens
            .as_ref()
            .map(|t| t.refresh_token().to_string())
            .ok_or(AuthError::NotAuthenticated)?;

        let form = [
            ("client_id", self.endpoint.client_id()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let resp = self
            .http
            .post(self.endpoint.logout_url())
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            warn!(status = status.as_u16(), "logout endpoint rejected revocation");
            return Err(AuthError::AuthenticationFailed {
                status: status.as_u16(),
                body,
            });
        }

        debug!("tokens revoked");
        self.tokens = None;
        Ok(())
    }

    /// Posts a grant request and parses the token response.
    ///
    /// Any non-200 status, or a 200 whose body is not a token response,
    /// is an [`AuthError::AuthenticationFailed`] carrying status and body.
    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenSet, AuthError> {
        let url = self.endpoint.token_url();
        let resp = self.http.post(&url).form(form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "token endpoint rejected grant");
            return Err(AuthError::AuthenticationFailed {
                status: status.as_u16(),
                body,
            });
        }

        let issued_at = Utc::now();
        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(parsed) => Ok(TokenSet::from_response(parsed, issued_at)),
            Err(_) => Err(AuthError::AuthenticationFailed {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

impl TokenAuthenticator for DirectGrantAuthenticator {
    async fn authenticate(&mut self, credential: Credential) -> Result<(), AuthError> {
        let Credential { username, password } = credential;
        let form = [
            ("client_id", self.endpoint.client_id()),
            ("grant_type", "password"),
            ("username", username.as_str()),
            ("password", password.as_str()),
        ];

        let tokens = self.request_tokens(&form).await?;
        debug!(username = %username, "password grant succeeded");
        self.tokens = Some(tokens);
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), AuthError> {
        let refresh_token = self
            .tokens
            .as_ref()
            .map(|t| t.refresh_token().to_string())
            .ok_or(AuthError::NotAuthenticated)?;

        let form = [
            ("client_id", self.endpoint.client_id()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        // The previous token set stays in place until the new one is parsed,
        // so a failed refresh never leaves a half-replaced state.
        let tokens = self.request_tokens(&form).await?;
        debug!("refresh grant succeeded");
        self.tokens = Some(tokens);
        Ok(())
    }

    fn access_token(&self) -> Result<&str, AuthError> {
        self.tokens
            .as_ref()
            .map(TokenSet::access_token)
            .ok_or(AuthError::NotAuthenticated)
    }

    fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        self.tokens
            .as_ref()
            .map(TokenSet::expires_at)
            .ok_or(AuthError::NotAuthenticated)
    }
}
