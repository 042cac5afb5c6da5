//! Remote API session ownership.
//!
//! One session is shared by every call. Refreshes happen under the cell lock, so
//! concurrent callers that find the session missing, expired or rejected wait
//! for a single in-flight authentication instead of issuing their own.

use std::{fmt, future::Future};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn info(&self, language: &str) -> SessionInfo {
        SessionInfo {
            authenticated: true,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            language: language.to_string(),
        }
    }
}

/// Session metadata that may leave the client. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub language: String,
}

#[derive(Debug, Default)]
pub struct SessionCell {
    slot: Mutex<Option<Session>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current session, authenticating first when it is absent or expired.
    pub async fn get_or_refresh<F, Fut, E>(&self, now: DateTime<Utc>, refresh: F) -> Result<Session, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref().filter(|session| !session.is_expired(now)) {
            return Ok(session.clone());
        }

        *slot = None;
        let session = refresh().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Replaces a session the remote API rejected. When another caller already
    /// swapped in a live session, that one is reused and `refresh` is not run.
    pub async fn refresh_rejected<F, Fut, E>(
        &self,
        rejected_token: &str,
        now: DateTime<Utc>,
        refresh: F,
    ) -> Result<Session, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot
            .as_ref()
            .filter(|session| session.token != rejected_token && !session.is_expired(now))
        {
            return Ok(session.clone());
        }

        *slot = None;
        let session = refresh().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Authenticates unconditionally and stores the new session.
    pub async fn renew<F, Fut, E>(&self, refresh: F) -> Result<Session, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, E>>,
    {
        let mut slot = self.slot.lock().await;
        *slot = None;
        let session = refresh().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    pub async fn snapshot(&self) -> Option<Session> {
        self.slot.lock().await.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    };

    use chrono::TimeZone;

    use super::*;

    pub(crate) struct ManualClock {
        now: StdMutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: StdMutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn issue(counter: &AtomicUsize, now: DateTime<Utc>) -> Session {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Session::new(format!("token-{n}"), now, Duration::minutes(15))
    }

    #[test]
    fn session_expires_at_ttl_boundary() {
        let clock = ManualClock::new();
        let session = Session::new("t", clock.now(), Duration::seconds(60));

        assert!(!session.is_expired(clock.now() + Duration::seconds(59)));
        assert!(session.is_expired(clock.now() + Duration::seconds(60)));
    }

    #[test]
    fn debug_output_hides_token() {
        let session = Session::new("very-secret", Utc::now(), Duration::seconds(60));
        assert!(!format!("{session:?}").contains("very-secret"));
    }

    #[tokio::test]
    async fn live_session_is_reused() {
        let cell = SessionCell::new();
        let clock = ManualClock::new();
        let counter = AtomicUsize::new(0);
        let (counter_ref, clock_ref) = (&counter, &clock);
        let refresh = move || async move { Ok::<_, ()>(issue(counter_ref, clock_ref.now())) };

        for _ in 0..3 {
            let session = cell
                .get_or_refresh(clock.now(), refresh)
                .await
                .expect("session");
            assert_eq!(session.token, "token-1");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_session_triggers_exactly_one_refresh() {
        let cell = SessionCell::new();
        let clock = ManualClock::new();
        let counter = AtomicUsize::new(0);
        let (counter_ref, clock_ref) = (&counter, &clock);
        let refresh = move || async move { Ok::<_, ()>(issue(counter_ref, clock_ref.now())) };

        cell.get_or_refresh(clock.now(), refresh).await.expect("first");
        clock.advance(Duration::minutes(16));
        let session = cell.get_or_refresh(clock.now(), refresh).await.expect("second");
        let again = cell.get_or_refresh(clock.now(), refresh).await.expect("third");

        assert_eq!(session.token, "token-2");
        assert_eq!(again.token, "token-2");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_leaves_cell_empty() {
        let cell = SessionCell::new();
        let result = cell
            .get_or_refresh(Utc::now(), || async { Err::<Session, _>("rejected") })
            .await;

        assert_eq!(result, Err("rejected"));
        assert!(cell.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let cell = Arc::new(SessionCell::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            let counter = Arc::clone(&counter);
            tasks.spawn(async move {
                cell.get_or_refresh(Utc::now(), move || async move {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    Ok::<_, ()>(issue(&counter, Utc::now()))
                })
                .await
            });
        }

        while let Some(result) = tasks.join_next().await {
            let session = result.expect("task").expect("session");
            assert_eq!(session.token, "token-1");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_once_across_callers() {
        let cell = SessionCell::new();
        let clock = ManualClock::new();
        let counter = AtomicUsize::new(0);
        let (counter_ref, clock_ref) = (&counter, &clock);
        let refresh = move || async move { Ok::<_, ()>(issue(counter_ref, clock_ref.now())) };

        let stale = cell.get_or_refresh(clock.now(), refresh).await.expect("first");
        let first = cell
            .refresh_rejected(&stale.token, clock.now(), refresh)
            .await
            .expect("refresh");
        let second = cell
            .refresh_rejected(&stale.token, clock.now(), refresh)
            .await
            .expect("reuse");

        assert_eq!(first.token, "token-2");
        assert_eq!(second.token, "token-2");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn renew_always_authenticates() {
        let cell = SessionCell::new();
        let counter = AtomicUsize::new(0);
        let counter_ref = &counter;
        let refresh = move || async move { Ok::<_, ()>(issue(counter_ref, Utc::now())) };

        cell.renew(refresh).await.expect("first");
        let session = cell.renew(refresh).await.expect("second");

        assert_eq!(session.token, "token-2");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
