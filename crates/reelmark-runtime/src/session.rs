use chrono::{DateTime, Duration, Utc};

use reelmark_api::traits::AuthService;
use reelmark_core::models::Session;

/// Refresh this long before the access token expires.
pub const REFRESH_LEEWAY_SECS: i64 = 60;

/// Outcome of checking a stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// Still valid; nothing changed.
    Valid(Session),
    /// Refreshed; the new session should be stored.
    Refreshed(Session),
    /// Expired and not refreshable; the stored session should be dropped.
    Expired,
}

/// Refresh `session` if it expires within the leeway.
///
/// A session without an expiry is kept as is. A failed refresh of an
/// already-expired token means the user has to sign in again; a failed
/// refresh of a token that is still valid keeps the old token.
pub async fn ensure_fresh<A: AuthService>(
    auth: &A,
    session: Session,
    now: DateTime<Utc>,
) -> SessionCheck {
    if !session.expires_within(now, Duration::seconds(REFRESH_LEEWAY_SECS)) {
        return SessionCheck::Valid(session);
    }
    let expired = session.expires_at.is_some_and(|at| at <= now);

    let Some(refresh_token) = session.refresh_token.as_deref() else {
        return if expired {
            SessionCheck::Expired
        } else {
            SessionCheck::Valid(session)
        };
    };

    match auth.refresh(refresh_token).await {
        Ok(fresh) => {
            tracing::debug!(user_id = %fresh.user_id, "Session refreshed");
            SessionCheck::Refreshed(fresh)
        }
        Err(e) if expired => {
            tracing::warn!(error = %e, "Session refresh failed; signing out");
            SessionCheck::Expired
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session refresh failed; keeping current token");
            SessionCheck::Valid(session)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reelmark_api::traits::SignUpOutcome;
    use reelmark_core::models::{Profile, ProfilePatch};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("refresh rejected")]
    struct Rejected;

    struct FakeAuth {
        accept: bool,
        refreshes: AtomicUsize,
    }

    impl FakeAuth {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                refreshes: AtomicUsize::new(0),
            }
        }
    }

    impl AuthService for FakeAuth {
        type Error = Rejected;

        async fn sign_up(&self, _: &str, _: &str) -> Result<SignUpOutcome, Rejected> {
            Err(Rejected)
        }

        async fn sign_in(&self, _: &str, _: &str) -> Result<Session, Rejected> {
            Err(Rejected)
        }

        async fn refresh(&self, refresh_token: &str) -> Result<Session, Rejected> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if !self.accept {
                return Err(Rejected);
            }
            Ok(Session {
                user_id: "u-1".into(),
                email: None,
                access_token: format!("fresh-from-{refresh_token}"),
                refresh_token: Some("r2".into()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            })
        }

        async fn user(&self, _: &str) -> Result<Profile, Rejected> {
            Err(Rejected)
        }

        async fn sign_out(&self, _: &str) -> Result<(), Rejected> {
            Ok(())
        }

        async fn update_profile(&self, _: &str, _: &ProfilePatch) -> Result<Profile, Rejected> {
            Err(Rejected)
        }
    }

    fn session(expires_in_secs: i64, now: DateTime<Utc>) -> Session {
        Session {
            user_id: "u-1".into(),
            email: None,
            access_token: "old".into(),
            refresh_token: Some("r1".into()),
            expires_at: Some(now + Duration::seconds(expires_in_secs)),
        }
    }

    #[tokio::test]
    async fn test_valid_session_untouched() {
        let auth = FakeAuth::new(true);
        let now = Utc::now();
        let check = ensure_fresh(&auth, session(3600, now), now).await;
        assert_eq!(check, SessionCheck::Valid(session(3600, now)));
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_within_leeway() {
        let auth = FakeAuth::new(true);
        let now = Utc::now();
        match ensure_fresh(&auth, session(30, now), now).await {
            SessionCheck::Refreshed(s) => assert_eq!(s.access_token, "fresh-from-r1"),
            other => panic!("expected refresh, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_refresh() {
        let auth = FakeAuth::new(false);
        let now = Utc::now();
        assert_eq!(
            ensure_fresh(&auth, session(-10, now), now).await,
            SessionCheck::Expired
        );
        // Not yet expired: keep using the current token.
        assert_eq!(
            ensure_fresh(&auth, session(30, now), now).await,
            SessionCheck::Valid(session(30, now))
        );
    }
}
