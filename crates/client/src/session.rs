//! Authenticated GraphQL session against a catalog environment.

use std::time::Duration;

use chrono::TimeDelta;
use geodex_auth::{
    AuthError, Credential, DirectGrantAuthenticator, KeycloakEndpoint, SessionExpiryPolicy,
    TokenAuthenticator, TokenSet,
};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::ClientError;

/// Catalog deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Beta,
    Dev,
}

impl Environment {
    /// OIDC client id used by the file tooling.
    pub const CLIENT_ID: &str = "geodex-files";

    pub fn graphql_url(self) -> &'static str {
        match self {
            Environment::Production => "https://api.geodex.io/graphql",
            Environment::Beta => "https://api-beta.staging.geodex.io/graphql",
            Environment::Dev => "http://localhost:4000/graphql",
        }
    }

    pub fn auth_server_url(self) -> &'static str {
        match self {
            Environment::Production => "https://auth.geodex.io/auth",
            Environment::Beta | Environment::Dev => "https://auth-beta.staging.geodex.io/auth",
        }
    }

    pub fn realm(self) -> &'static str {
        match self {
            Environment::Production => "Geodex",
            Environment::Beta | Environment::Dev => "Geodex-B",
        }
    }

    pub fn keycloak_endpoint(self) -> KeycloakEndpoint {
        KeycloakEndpoint::new(self.auth_server_url(), self.realm(), Self::CLIENT_ID)
    }
}

/// A logged-in (or about-to-log-in) connection to the catalog GraphQL API.
///
/// Owns the authenticator exclusively: token state is mutated only through
/// [`login`](Self::login) and the expiry policy, never shared across
/// sessions.
pub struct CatalogSession<A = DirectGrantAuthenticator> {
    http: reqwest::Client,
    graphql_url: String,
    username: Option<String>,
    authenticator: A,
    expiry: SessionExpiryPolicy,
}

impl CatalogSession<DirectGrantAuthenticator> {
    /// Creates a session for a well-known environment.
    pub fn new(env: Environment) -> Self {
        Self::with_authenticator(
            env.graphql_url(),
            DirectGrantAuthenticator::new(env.keycloak_endpoint()),
        )
    }

    /// Creates a session from externally obtained tokens (for example from a
    /// browser login flow). Refresh still works through the refresh token.
    pub fn from_tokens(env: Environment, tokens: TokenSet) -> Self {
        Self::with_authenticator(
            env.graphql_url(),
            DirectGrantAuthenticator::with_tokens(env.keycloak_endpoint(), tokens),
        )
    }

    /// Revokes the session's tokens at the auth server and forgets the
    /// acting username. The session can be logged in again afterwards.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        self.authenticator.revoke().await?;
        self.username = None;
        Ok(())
    }
}

impl<A: TokenAuthenticator> CatalogSession<A> {
    /// Creates a session against an explicit GraphQL URL with a caller-chosen
    /// authentication strategy.
    pub fn with_authenticator(graphql_url: impl Into<String>, authenticator: A) -> Self {
        Self {
            http: reqwest::Client::new(),
            graphql_url: graphql_url.into(),
            username: None,
            authenticator,
            expiry: SessionExpiryPolicy::default(),
        }
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    /// Acting username, recorded at login time.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    /// The shared HTTP client, also used for direct object-storage PUTs.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Logs in with the password grant.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        let credential = Credential::new(username, password);
        if let Err(err) = self.authenticator.authenticate(credential).await {
            error!(username, error = %err, "catalog login failed");
            return Err(err);
        }
        self.username = Some(username.to_string());
        Ok(())
    }

    /// Whether the current refresh token can still be refreshed.
    ///
    /// Probes by performing a refresh; a failure means the session is over.
    pub async fn is_logged_in(&mut self) -> bool {
        self.authenticator.refresh().await.is_ok()
    }

    pub fn access_token(&self) -> Result<&str, AuthError> {
        self.authenticator.access_token()
    }

    /// Refreshes the tokens when they would expire within `lookahead`
    /// (the policy default when `None`). Returns whether a refresh ran.
    pub async fn refresh_if_expiring_within(
        &mut self,
        lookahead: Option<Duration>,
    ) -> Result<bool, AuthError> {
        self.expiry
            .refresh_if_expiring_within(&mut self.authenticator, lookahead)
            .await
    }

    /// Time left before the tokens fall inside the lookahead window.
    /// Diagnostic only.
    pub fn time_remaining(&self, lookahead: Option<Duration>) -> Result<TimeDelta, AuthError> {
        self.expiry.time_remaining(&self.authenticator, lookahead)
    }

    /// Posts a GraphQL query with the current bearer token.
    ///
    /// Non-2xx responses become [`ClientError::Api`] with the body retained;
    /// a 2xx body carrying a GraphQL `errors` array becomes
    /// [`ClientError::GraphQl`].
    pub async fn graphql(&self, query: &str) -> Result<Value, ClientError> {
        let token = self.authenticator.access_token()?;
        let resp = self
            .http
            .post(&self.graphql_url)
            .header("accept", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            error!(status = status.as_u16(), "GraphQL request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        if let Some(errors) = value.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            let message = if message.is_empty() {
                errors.iter().map(Value::to_string).collect::<Vec<_>>().join("; ")
            } else {
                message
            };
            return Err(ClientError::GraphQl { message });
        }

        debug!("GraphQL request succeeded");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResponse, authed_session, scripted_server};

    #[test]
    fn environment_urls() {
        assert_eq!(
            Environment::Production.graphql_url(),
            "https://api.geodex.io/graphql"
        );
        assert_eq!(Environment::Production.realm(), "Geodex");
        assert_eq!(Environment::Beta.realm(), "Geodex-B");
        assert_eq!(
            Environment::Dev.graphql_url(),
            "http://localhost:4000/graphql"
        );
        assert!(
            Environment::Production
                .keycloak_endpoint()
                .token_url()
                .contains("/realms/Geodex/")
        );
    }

    #[tokio::test]
    async fn graphql_sends_bearer_and_query() {
        let (url, requests) = scripted_server(vec![MockResponse::json(
            200,
            r#"{"data":{"ping":"pong"}}"#,
        )])
        .await;
        let session = authed_session(&url, "tok-123");

        let value = session.graphql("query { ping }").await.unwrap();
        assert_eq!(value["data"]["ping"], "pong");

        let recorded = requests.lock().unwrap();
        assert!(recorded[0].contains("Bearer tok-123") || recorded[0].contains("bearer tok-123"));
        assert!(recorded[0].contains(r#""query":"query { ping }""#));
    }

    #[tokio::test]
    async fn graphql_non_200_carries_status_and_body() {
        let (url, _) =
            scripted_server(vec![MockResponse::json(503, r#"{"detail":"down"}"#)]).await;
        let session = authed_session(&url, "tok");

        let err = session.graphql("query { ping }").await.unwrap_err();
        match err {
            ClientError::Api { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn graphql_errors_array_is_failure() {
        let (url, _) = scripted_server(vec![MockResponse::json(
            200,
            r#"{"data":null,"errors":[{"message":"denied"}]}"#,
        )])
        .await;
        let session = authed_session(&url, "tok");

        let err = session.graphql("query { ping }").await.unwrap_err();
        match err {
            ClientError::GraphQl { message } => assert!(message.contains("denied")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn logout_revokes_and_clears_username() {
        let (auth_url, requests) = scripted_server(vec![MockResponse::json(204, "")]).await;
        let endpoint = KeycloakEndpoint::new(&auth_url, "test", "files-ui");
        let tokens = TokenSet::new("tok", "refresh-1", 3600, 3600, chrono::Utc::now());
        let mut session = CatalogSession::with_authenticator(
            "http://127.0.0.1:1/graphql",
            DirectGrantAuthenticator::with_tokens(endpoint, tokens),
        );
        session.set_username("tester");

        session.logout().await.unwrap();
        assert!(session.username().is_none());
        assert!(matches!(
            session.access_token(),
            Err(AuthError::NotAuthenticated)
        ));

        let recorded = requests.lock().unwrap();
        assert!(recorded[0].contains("/realms/test/protocol/openid-connect/logout"));
        assert!(recorded[0].contains("refresh_token=refresh-1"));
    }

    #[tokio::test]
    async fn graphql_without_login_fails_fast() {
        let session = CatalogSession::new(Environment::Dev);
        let err = session.graphql("query { ping }").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(AuthError::NotAuthenticated)));
    }
}
