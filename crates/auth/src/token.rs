use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// A username/password pair, consumed by value when authenticating.
///
/// The secret is never retained after the grant request is built.
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Wire shape of a Keycloak token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub refresh_expires_in: u64,
    #[serde(default)]
    #[allow(dead_code)]
    pub token_type: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub scope: Option<String>,
}

/// One authenticated identity's tokens.
///
/// Created whole on a successful grant and replaced whole on every refresh;
/// never partially mutated.
#[derive(Clone)]
pub struct TokenSet {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    refresh_expires_in: u64,
    issued_at: DateTime<Utc>,
}

impl TokenSet {
    /// Builds a token set with an explicit issue instant and TTLs in seconds.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: u64,
        refresh_expires_in: u64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in,
            refresh_expires_in,
            issued_at,
        }
    }

    pub(crate) fn from_response(resp: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_in: resp.expires_in,
            refresh_expires_in: resp.refresh_expires_in,
            issued_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// The instant the token set stops being usable.
    ///
    /// A session is only as alive as its ability to refresh, so the shorter
    /// of the access and refresh TTLs wins.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = self.expires_in.min(self.refresh_expires_in);
        self.issued_at + Duration::seconds(ttl as i64)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
