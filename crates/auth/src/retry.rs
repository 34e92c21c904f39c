//! Bounded retry around a single-attempt authenticator.

use tracing::warn;

use crate::{AuthError, Credential, TokenAuthenticator};

/// Attempts `authenticate` up to `max_attempts` times.
///
/// `credentials` is invoked once per attempt with the 1-based attempt number,
/// so interactive callers can re-prompt. Only rejected grants are retried;
/// transport errors and everything else propagate immediately. The wrapped
/// authenticator stays single-attempt and side-effect-predictable.
pub async fn authenticate_with_retry<A, F>(
    auth: &mut A,
    max_attempts: u32,
    mut credentials: F,
) -> Result<(), AuthError>
where
    A: TokenAuthenticator,
    F: FnMut(u32) -> Credential,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        match auth.authenticate(credentials(attempt)).await {
            Ok(()) => return Ok(()),
            Err(err @ AuthError::AuthenticationFailed { .. }) if attempt < attempts => {
                warn!(attempt, error = %err, "authentication attempt failed");
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("final attempt either returns Ok or Err")
}
