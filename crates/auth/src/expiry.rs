//! Proactive token refresh ahead of expiry.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tracing::debug;

use crate::{AuthError, TokenAuthenticator};

/// Decides when a token must be refreshed, given a lookahead window.
///
/// A long transfer must never let its token expire mid-flight, so callers
/// check before every unit of work, not once up front. The lookahead is
/// configurable because per-unit duration is network-dependent.
#[derive(Debug, Clone)]
pub struct SessionExpiryPolicy {
    default_lookahead: Duration,
}

impl SessionExpiryPolicy {
    /// Default lookahead: 5 minutes.
    pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_secs(300);

    /// Creates a policy with the given default lookahead.
    ///
    /// If `lookahead` is `None`, defaults to 5 minutes.
    pub fn new(lookahead: Option<Duration>) -> Self {
        Self {
            default_lookahead: lookahead.unwrap_or(Self::DEFAULT_LOOKAHEAD),
        }
    }

    pub fn default_lookahead(&self) -> Duration {
        self.default_lookahead
    }

    /// Refreshes when the token will have expired `lookahead` from now.
    ///
    /// Returns `true` when a refresh was performed, `false` when the token is
    /// still comfortably valid (no network call in that case).
    pub async fn refresh_if_expiring_within<A: TokenAuthenticator>(
        &self,
        auth: &mut A,
        lookahead: Option<Duration>,
    ) -> Result<bool, AuthError> {
        let lookahead = lookahead.unwrap_or(self.default_lookahead);
        let deadline = Utc::now() + to_delta(lookahead);

        if auth.expires_at()? <= deadline {
            debug!(lookahead_secs = lookahead.as_secs(), "token expiring, refreshing");
            auth.refresh().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Time left before the token falls inside the lookahead window.
    ///
    /// Diagnostic only; negative once a refresh is due. Performs no network
    /// call and never mutates token state.
    pub fn time_remaining<A: TokenAuthenticator>(
        &self,
        auth: &A,
        lookahead: Option<Duration>,
    ) -> Result<TimeDelta, AuthError> {
        let lookahead = lookahead.unwrap_or(self.default_lookahead);
        let expires_at = auth.expires_at()?;
        Ok(expires_at - (Utc::now() + to_delta(lookahead)))
    }
}

impl Default for SessionExpiryPolicy {
    fn default() -> Self {
        Self::new(None)
    }
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
