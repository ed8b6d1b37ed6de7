//! Session coordinator: bearer injection, 401 detection and single-flight token refresh

use crate::auth_state::AuthState;
use crate::config::{ClientConfig, REFRESH_PATH};
use crate::credential_store::{CredentialKeys, CredentialStore};
use crate::error::{ClientError, RefreshError, Result};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::{ApiEnvelope, RefreshRequest, RefreshResponse, Session, User};
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type RefreshOutcome = std::result::Result<String, RefreshError>;
type Waiter = oneshot::Sender<RefreshOutcome>;

enum Flight {
    Idle,
    /// One refresh is outstanding; requests that hit 401 meanwhile wait here in FIFO order
    Refreshing(Vec<Waiter>),
}

/// One logical request and whether it has already been replayed after a refresh
///
/// A replayed attempt that gets another 401 fails instead of refreshing again.
#[derive(Clone)]
pub struct RequestAttempt {
    request: HttpRequest,
    retry_token: Option<String>,
}

impl RequestAttempt {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            retry_token: None,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn has_retried(&self) -> bool {
        self.retry_token.is_some()
    }

    fn retried_with(self, token: String) -> Self {
        Self {
            request: self.request,
            retry_token: Some(token),
        }
    }
}

impl fmt::Debug for RequestAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAttempt")
            .field("request", &self.request)
            .field("has_retried", &self.has_retried())
            .finish()
    }
}

/// Owns the session lifecycle and every authenticated request
///
/// At most one refresh call is outstanding at any time. The flip from idle to
/// refreshing and the drain back to idle each happen under a single lock, so
/// a burst of 401s elects exactly one refresher and everybody else queues.
///
/// Every session write happens under the `epoch` lock. Establishing or tearing
/// down a session bumps the epoch, and a refresh only commits its tokens if the
/// epoch is still the one it started from.
pub struct SessionCoordinator<T: Transport> {
    config: ClientConfig,
    transport: Arc<T>,
    store: Arc<dyn CredentialStore>,
    auth_state: Arc<AuthState>,
    flight: Mutex<Flight>,
    epoch: Mutex<u64>,
}

impl<T: Transport> SessionCoordinator<T> {
    pub fn new(
        config: ClientConfig,
        transport: Arc<T>,
        store: Arc<dyn CredentialStore>,
        auth_state: Arc<AuthState>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            auth_state,
            flight: Mutex::new(Flight::Idle),
            epoch: Mutex::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth_state(&self) -> &Arc<AuthState> {
        &self.auth_state
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn stored_refresh_token(&self) -> Result<Option<String>> {
        self.store.get(CredentialKeys::REFRESH_TOKEN)
    }

    /// Send a request with the current bearer token, refreshing and replaying once on 401
    ///
    /// Responses other than 401 are returned untouched, error statuses included.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut attempt = RequestAttempt::new(request);

        loop {
            let mut request = attempt.request().clone();
            let bearer = match &attempt.retry_token {
                Some(token) => Some(token.clone()),
                None => self.auth_state.access_token(),
            };
            if let Some(token) = bearer {
                request.set_bearer(token);
            }

            let response = self.transport.send(request).await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }

            if attempt.has_retried() || self.is_refresh_request(attempt.request()) {
                warn!(
                    method = %attempt.request().method,
                    url = %attempt.request().url,
                    retried = attempt.has_retried(),
                    "Request unauthorized, giving up"
                );
                return Err(ClientError::Unauthorized);
            }

            debug!(url = %attempt.request().url, "Request unauthorized, renewing access token");
            let token = self.fresh_token().await?;
            attempt = attempt.retried_with(token);
        }
    }

    /// Force a token refresh, joining one already in flight
    pub async fn refresh_session(&self) -> Result<String> {
        self.fresh_token().await
    }

    fn is_refresh_request(&self, request: &HttpRequest) -> bool {
        request.path().ends_with(REFRESH_PATH)
    }

    async fn fresh_token(&self) -> Result<String> {
        let started = {
            let mut flight = self.flight.lock();
            match &mut *flight {
                Flight::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    debug!(waiters = waiters.len(), "Refresh in flight, queued behind it");
                    Err(rx)
                }
                Flight::Idle => {
                    *flight = Flight::Refreshing(Vec::new());
                    Ok(*self.epoch.lock())
                }
            }
        };

        let started = match started {
            Ok(epoch) => epoch,
            Err(rx) => {
                return match rx.await {
                    Ok(outcome) => outcome.map_err(ClientError::from),
                    Err(_) => Err(ClientError::RefreshFailed("refresh was abandoned".to_string())),
                };
            }
        };

        let guard = FlightGuard::new(&self.flight);
        let outcome = self.refresh(started).await;
        guard.complete(&outcome);
        outcome.map_err(ClientError::from)
    }

    /// Exchange the stored refresh token for a new access token
    ///
    /// Any failure tears the session down before returning. If the session was
    /// replaced or cleared while the call was out, the result is discarded and
    /// the current session is left alone.
    async fn refresh(&self, started: u64) -> RefreshOutcome {
        let fetched = self.fetch_tokens().await;

        let mut epoch = self.epoch.lock();
        if *epoch != started {
            info!("Session changed while refreshing, discarding refreshed tokens");
            return Err(RefreshError::Failed("session ended while refreshing".to_string()));
        }

        let outcome = fetched.and_then(|tokens| self.commit_tokens(tokens));
        if let Err(err) = &outcome {
            warn!(error = %err, "Token refresh failed, clearing session");
            self.clear_session(&mut epoch);
        }
        outcome
    }

    async fn fetch_tokens(&self) -> std::result::Result<RefreshResponse, RefreshError> {
        // Read from the store rather than the in-memory state
        let refresh_token = match self.store.get(CredentialKeys::REFRESH_TOKEN) {
            Ok(Some(token)) => token,
            Ok(None) => return Err(RefreshError::SessionExpired),
            Err(e) => return Err(RefreshError::Failed(format!("reading refresh token: {e}"))),
        };

        let request = HttpRequest::post(self.config.url(REFRESH_PATH))
            .with_json(&RefreshRequest {
                refresh_token: &refresh_token,
                device_info: &self.config.device_info,
            })
            .map_err(|e| RefreshError::Failed(e.to_string()))?;

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RefreshError::Failed(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshError::Failed(format!(
                "refresh endpoint returned status {}",
                response.status
            )));
        }

        Ok(response
            .json::<ApiEnvelope<RefreshResponse>>()
            .map_err(|e| RefreshError::Failed(format!("malformed refresh response: {e}")))?
            .data)
    }

    /// Callers hold the epoch lock
    fn commit_tokens(&self, tokens: RefreshResponse) -> RefreshOutcome {
        self.store
            .set(CredentialKeys::AUTH_TOKEN, &tokens.access_token)
            .map_err(|e| RefreshError::Failed(format!("persisting access token: {e}")))?;
        if let Some(rotated) = &tokens.refresh_token {
            self.store
                .set(CredentialKeys::REFRESH_TOKEN, rotated)
                .map_err(|e| RefreshError::Failed(format!("persisting refresh token: {e}")))?;
        }
        self.auth_state
            .set_tokens(&tokens.access_token, tokens.refresh_token.as_deref());

        info!(rotated = tokens.refresh_token.is_some(), "Access token refreshed successfully");

        Ok(tokens.access_token)
    }

    /// Persist a freshly issued session, then publish it to the auth state
    pub fn establish(&self, session: &Session) -> Result<()> {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        if let Err(err) = self.persist(session) {
            warn!(error = %err, "Failed to persist session");
            self.clear_session(&mut epoch);
            return Err(err);
        }
        self.auth_state.set_session(session);
        info!(user_id = %session.user.id, "Session established");
        Ok(())
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user)?;
        self.store.set(CredentialKeys::AUTH_TOKEN, &session.access_token)?;
        match &session.refresh_token {
            Some(token) => self.store.set(CredentialKeys::REFRESH_TOKEN, token)?,
            None => self.store.delete(CredentialKeys::REFRESH_TOKEN)?,
        }
        self.store.set(CredentialKeys::AUTH_USER, &user)?;
        Ok(())
    }

    /// Load a persisted session into the auth state
    ///
    /// Returns the user when a complete session was found. A partial or corrupt
    /// session is cleared.
    pub fn restore(&self) -> Result<Option<User>> {
        let mut epoch = self.epoch.lock();
        let access_token = self.store.get(CredentialKeys::AUTH_TOKEN)?;
        let user = self.store.get(CredentialKeys::AUTH_USER)?;
        let refresh_token = self.store.get(CredentialKeys::REFRESH_TOKEN)?;

        let (access_token, user) = match (access_token, user) {
            (Some(access_token), Some(user)) => (access_token, user),
            (None, None) if refresh_token.is_none() => return Ok(None),
            _ => {
                warn!("Stored session is incomplete, clearing it");
                self.clear_session(&mut epoch);
                return Ok(None);
            }
        };

        let user: User = match serde_json::from_str(&user) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Stored user is unreadable, clearing session");
                self.clear_session(&mut epoch);
                return Ok(None);
            }
        };

        *epoch += 1;
        self.auth_state.set_session(&Session {
            access_token,
            refresh_token,
            user: user.clone(),
        });
        debug!(user_id = %user.id, "Session restored from storage");

        Ok(Some(user))
    }

    /// Clear every persisted credential and reset the auth state
    ///
    /// Storage failures are logged; the in-memory state is cleared regardless.
    ///
    /// A refresh still in flight is invalidated and will not bring the session back.
    pub fn teardown(&self) {
        let mut epoch = self.epoch.lock();
        self.clear_session(&mut epoch);
    }

    fn clear_session(&self, epoch: &mut u64) {
        *epoch += 1;
        for key in CredentialKeys::ALL {
            if let Err(e) = self.store.delete(key) {
                warn!(key = key, error = %e, "Failed to delete credential");
            }
        }
        self.auth_state.clear();
        info!("Session cleared");
    }
}

/// Returns the coordinator to idle even if the refreshing future is dropped
///
/// Dropping the queued senders rejects their waiters.
struct FlightGuard<'a> {
    flight: &'a Mutex<Flight>,
    completed: bool,
}

impl<'a> FlightGuard<'a> {
    fn new(flight: &'a Mutex<Flight>) -> Self {
        Self {
            flight,
            completed: false,
        }
    }

    fn take_waiters(&self) -> Vec<Waiter> {
        match mem::replace(&mut *self.flight.lock(), Flight::Idle) {
            Flight::Refreshing(waiters) => waiters,
            Flight::Idle => Vec::new(),
        }
    }

    fn complete(mut self, outcome: &RefreshOutcome) {
        self.completed = true;
        let waiters = self.take_waiters();
        debug!(waiters = waiters.len(), success = outcome.is_ok(), "Draining refresh waiters");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            let abandoned = self.take_waiters();
            warn!(waiters = abandoned.len(), "Token refresh abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential_store::MemoryCredentialStore;
    use crate::test_support::{json, FakeTransport, Reply};
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::JoinSet;

    const BASE: &str = "http://api.test";

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            name: Some("Ana".to_string()),
            tax_id: None,
        }
    }

    fn session(refresh_token: Option<&str>) -> Session {
        Session {
            access_token: "a1".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            user: user(),
        }
    }

    fn coordinator(
        transport: FakeTransport,
    ) -> (Arc<SessionCoordinator<FakeTransport>>, MemoryCredentialStore) {
        let store = MemoryCredentialStore::new();
        let coordinator = SessionCoordinator::new(
            ClientConfig::new(BASE).with_device_info("test-device"),
            Arc::new(transport),
            Arc::new(store.clone()),
            Arc::new(AuthState::new()),
        );
        (Arc::new(coordinator), store)
    }

    /// Resources accept only "a2"; refresh hands out "a2" after a short delay
    fn rotating_backend(req: &HttpRequest) -> Reply {
        match req.path() {
            "/auth/refresh" => Reply::After(
                Duration::from_millis(50),
                json(200, json!({"data": {"accessToken": "a2", "refreshToken": "r2"}})),
            ),
            _ if req.bearer() == Some("a2") => Reply::Now(json(200, json!({"data": "ok"}))),
            _ => Reply::Now(json(401, json!({"message": "token expired"}))),
        }
    }

    fn assert_logged_out(coordinator: &SessionCoordinator<FakeTransport>, store: &MemoryCredentialStore) {
        for key in CredentialKeys::ALL {
            assert_eq!(store.get(key).unwrap(), None, "{key} should be cleared");
        }
        assert!(!coordinator.auth_state().is_authenticated());
        assert_eq!(coordinator.auth_state().snapshot(), Default::default());
    }

    #[tokio::test]
    async fn test_attaches_current_access_token() {
        let (coordinator, _store) =
            coordinator(FakeTransport::new(|_| Reply::Now(json(200, json!({"data": []})))));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let response = coordinator.send(HttpRequest::get(format!("{BASE}/boletos"))).await.unwrap();
        assert!(response.is_success());

        let sent = coordinator.transport().requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer(), Some("a1"));
    }

    #[tokio::test]
    async fn test_non_401_errors_pass_through() {
        let (coordinator, _store) =
            coordinator(FakeTransport::new(|_| Reply::Now(json(404, json!({"message": "missing"})))));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let response = coordinator.send(HttpRequest::get(format!("{BASE}/boletos/9"))).await.unwrap();
        assert_eq!(response.status.as_u16(), 404);
        assert_eq!(coordinator.transport().calls_to("/auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let (coordinator, store) = coordinator(FakeTransport::new(rotating_backend));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..10 {
            let coordinator = Arc::clone(&coordinator);
            tasks.spawn(async move { coordinator.send(HttpRequest::get(format!("{BASE}/boletos"))).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().unwrap().is_success());
        }

        let transport = coordinator.transport();
        assert_eq!(transport.calls_to("/auth/refresh"), 1);
        let retries: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.path() == "/boletos" && r.bearer() == Some("a2"))
            .collect();
        assert_eq!(retries.len(), 10);

        assert_eq!(store.get(CredentialKeys::AUTH_TOKEN).unwrap().as_deref(), Some("a2"));
        assert_eq!(store.get(CredentialKeys::REFRESH_TOKEN).unwrap().as_deref(), Some("r2"));
        let snapshot = coordinator.auth_state().snapshot();
        assert_eq!(snapshot.access_token.as_deref(), Some("a2"));
        assert_eq!(snapshot.user, Some(user()));
    }

    #[tokio::test]
    async fn test_refresh_sends_stored_token_and_device_info() {
        let (coordinator, _store) = coordinator(FakeTransport::new(rotating_backend));
        coordinator.establish(&session(Some("r1"))).unwrap();

        coordinator.send(HttpRequest::get(format!("{BASE}/categories"))).await.unwrap();

        let refresh = coordinator
            .transport()
            .requests()
            .into_iter()
            .find(|r| r.path() == "/auth/refresh")
            .unwrap();
        assert_eq!(
            refresh.body,
            crate::transport::RequestBody::Json(json!({"refreshToken": "r1", "deviceInfo": "test-device"}))
        );
    }

    #[tokio::test]
    async fn test_second_401_after_retry_is_terminal() {
        let (coordinator, store) = coordinator(FakeTransport::new(|req| match req.path() {
            "/auth/refresh" => Reply::Now(json(200, json!({"data": {"accessToken": "a2"}}))),
            _ => Reply::Now(json(401, json!({}))),
        }));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let err = coordinator
            .send(HttpRequest::get(format!("{BASE}/boletos")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));

        let transport = coordinator.transport();
        assert_eq!(transport.calls_to("/auth/refresh"), 1);
        assert_eq!(transport.calls_to("/boletos"), 2);
        // Refresh without rotation keeps the old refresh token
        assert_eq!(store.get(CredentialKeys::REFRESH_TOKEN).unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_401_from_refresh_endpoint_never_refreshes() {
        let (coordinator, _store) =
            coordinator(FakeTransport::new(|_| Reply::Now(json(401, json!({})))));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let err = coordinator
            .send(HttpRequest::post(format!("{BASE}/auth/refresh")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        assert_eq!(coordinator.transport().calls_to("/auth/refresh"), 1);
        assert!(coordinator.auth_state().is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_expires_session() {
        let (coordinator, store) = coordinator(FakeTransport::new(rotating_backend));
        coordinator.establish(&session(None)).unwrap();

        let err = coordinator
            .send(HttpRequest::get(format!("{BASE}/boletos")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(coordinator.transport().calls_to("/auth/refresh"), 0);
        assert_logged_out(&coordinator, &store);
    }

    #[tokio::test]
    async fn test_failed_refresh_rejects_all_waiters_and_clears_session() {
        let (coordinator, store) = coordinator(FakeTransport::new(|req| match req.path() {
            "/auth/refresh" => Reply::After(Duration::from_millis(50), json(500, json!({}))),
            _ => Reply::Now(json(401, json!({}))),
        }));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..3 {
            let coordinator = Arc::clone(&coordinator);
            tasks.spawn(async move { coordinator.send(HttpRequest::get(format!("{BASE}/boletos"))).await });
        }
        while let Some(result) = tasks.join_next().await {
            let err = result.unwrap().unwrap_err();
            assert!(matches!(err, ClientError::RefreshFailed(_)), "got {err:?}");
        }

        assert_eq!(coordinator.transport().calls_to("/auth/refresh"), 1);
        assert_eq!(coordinator.transport().calls_to("/boletos"), 3);
        assert_logged_out(&coordinator, &store);
    }

    #[tokio::test]
    async fn test_malformed_refresh_body_fails() {
        let (coordinator, store) = coordinator(FakeTransport::new(|req| match req.path() {
            "/auth/refresh" => Reply::Now(json(200, json!({"data": {"token": "nope"}}))),
            _ => Reply::Now(json(401, json!({}))),
        }));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let err = coordinator.refresh_session().await.unwrap_err();
        assert!(matches!(err, ClientError::RefreshFailed(_)));
        assert_logged_out(&coordinator, &store);
    }

    #[tokio::test]
    async fn test_abandoned_refresh_releases_waiters() {
        let (coordinator, _store) = coordinator(FakeTransport::new(|req| match req.path() {
            "/auth/refresh" => Reply::After(
                Duration::from_millis(200),
                json(200, json!({"data": {"accessToken": "a2"}})),
            ),
            _ => Reply::Now(json(401, json!({}))),
        }));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.refresh_session().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.refresh_session().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        let err = follower.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::RefreshFailed(_)));

        // The coordinator is idle again, so the next refresh goes out on the wire
        assert_eq!(coordinator.refresh_session().await.unwrap(), "a2");
        assert_eq!(coordinator.transport().calls_to("/auth/refresh"), 2);
    }

    #[tokio::test]
    async fn test_teardown_during_refresh_stays_logged_out() {
        let (coordinator, store) = coordinator(FakeTransport::new(rotating_backend));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let request = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.send(HttpRequest::get(format!("{BASE}/categories"))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.teardown();

        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::RefreshFailed(_)), "got {err:?}");
        assert_eq!(coordinator.transport().calls_to("/auth/refresh"), 1);
        // The request is not replayed once the session is gone
        assert_eq!(coordinator.transport().calls_to("/categories"), 1);
        assert_logged_out(&coordinator, &store);
    }

    #[tokio::test]
    async fn test_login_during_refresh_keeps_new_session() {
        let (coordinator, store) = coordinator(FakeTransport::new(rotating_backend));
        coordinator.establish(&session(Some("r1"))).unwrap();

        let request = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.send(HttpRequest::get(format!("{BASE}/boletos"))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fresh = Session {
            access_token: "a9".to_string(),
            refresh_token: Some("r9".to_string()),
            user: user(),
        };
        coordinator.establish(&fresh).unwrap();

        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::RefreshFailed(_)), "got {err:?}");

        assert_eq!(store.get(CredentialKeys::AUTH_TOKEN).unwrap().as_deref(), Some("a9"));
        assert_eq!(store.get(CredentialKeys::REFRESH_TOKEN).unwrap().as_deref(), Some("r9"));
        let snapshot = coordinator.auth_state().snapshot();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.access_token.as_deref(), Some("a9"));
    }

    #[tokio::test]
    async fn test_restore_hydrates_auth_state() {
        let (coordinator, store) = coordinator(FakeTransport::new(rotating_backend));
        store.set(CredentialKeys::AUTH_TOKEN, "a1").unwrap();
        store.set(CredentialKeys::REFRESH_TOKEN, "r1").unwrap();
        store
            .set(CredentialKeys::AUTH_USER, &serde_json::to_string(&user()).unwrap())
            .unwrap();

        assert_eq!(coordinator.restore().unwrap(), Some(user()));
        let snapshot = coordinator.auth_state().snapshot();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.access_token.as_deref(), Some("a1"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_restore_clears_corrupt_session() {
        let (coordinator, store) = coordinator(FakeTransport::new(rotating_backend));
        store.set(CredentialKeys::AUTH_TOKEN, "a1").unwrap();
        store.set(CredentialKeys::AUTH_USER, "{not json").unwrap();

        assert_eq!(coordinator.restore().unwrap(), None);
        assert_logged_out(&coordinator, &store);
    }

    #[tokio::test]
    async fn test_restore_without_session() {
        let (coordinator, _store) = coordinator(FakeTransport::new(rotating_backend));
        assert_eq!(coordinator.restore().unwrap(), None);
        assert!(!coordinator.auth_state().is_authenticated());
    }
}
