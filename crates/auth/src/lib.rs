//! Token authentication against the Geodex Keycloak realm.
//!
//! Provides the password-grant and refresh-grant flows, a wholesale-replaced
//! [`TokenSet`], and the [`SessionExpiryPolicy`] used to keep a bearer token
//! alive across long-running transfers.

mod expiry;
mod keycloak;
mod retry;
mod token;

pub use expiry::SessionExpiryPolicy;
pub use keycloak::{DirectGrantAuthenticator, KeycloakEndpoint};
pub use retry::authenticate_with_retry;
pub use token::{Credential, TokenSet};

use chrono::{DateTime, Utc};

/// Errors produced by the auth crate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token endpoint rejected the grant, or returned a body that is not
    /// a token response. Carries the server's status and body for diagnostics.
    #[error("authentication failed (status {status}): {body}")]
    AuthenticationFailed { status: u16, body: String },

    /// An operation that needs tokens was called before any successful
    /// authentication.
    #[error("not authenticated: no token set is present")]
    NotAuthenticated,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Capability of obtaining and renewing a bearer token.
///
/// The upload coordinator and the catalog session depend on this trait, never
/// on a concrete grant strategy.
pub trait TokenAuthenticator {
    /// Exchanges a credential for a fresh [`TokenSet`].
    fn authenticate(
        &mut self,
        credential: Credential,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Renews the current token set using the stored refresh token.
    ///
    /// On failure the previous token set is left in place, but callers must
    /// treat it as presumptively invalid and re-authenticate.
    fn refresh(&mut self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Returns the current access token.
    fn access_token(&self) -> Result<&str, AuthError>;

    /// Returns the instant at which the current token set expires.
    fn expires_at(&self) -> Result<DateTime<Utc>, AuthError>;
}
