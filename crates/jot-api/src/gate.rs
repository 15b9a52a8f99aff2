use jot_core::{JotError, JotResult, now_millis};
use jot_store::LocalState;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_THRESHOLD_MS: i64 = 5 * 60 * 1000;

/// Exchanges the current (possibly expired) token for a fresh one.
pub trait TokenRefresher: Send + Sync {
    fn refresh_token(&self, current: &str) -> JotResult<String>;
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(String),
    Rejected(JotError),
    Failed(JotError),
}

#[derive(Debug, Default)]
struct GateState {
    token: Option<String>,
    last_refresh_at: i64,
    refreshing: bool,
    generation: u64,
    outcome: Option<RefreshOutcome>,
}

/// Owns the bearer token and allows at most one refresh call in flight.
///
/// Callers arriving while a refresh is running park on the condvar and all
/// receive the outcome of that same refresh.
pub struct TokenRefreshGate {
    state: LocalState,
    refresher: Arc<dyn TokenRefresher>,
    threshold_ms: i64,
    inner: Mutex<GateState>,
    settled: Condvar,
}

impl std::fmt::Debug for TokenRefreshGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshGate")
            .field("threshold_ms", &self.threshold_ms)
            .finish_non_exhaustive()
    }
}

impl TokenRefreshGate {
    pub fn new(state: LocalState, refresher: Arc<dyn TokenRefresher>, threshold_ms: i64) -> Self {
        let inner = GateState {
            token: state.token(),
            last_refresh_at: state.last_token_refresh().unwrap_or_default(),
            ..GateState::default()
        };

        Self {
            state,
            refresher,
            threshold_ms,
            inner: Mutex::new(inner),
            settled: Condvar::new(),
        }
    }

    /// The in-memory token, else whatever the durable store holds.
    pub fn get_token(&self) -> Option<String> {
        let mut inner = self.lock();
        if inner.token.is_none() {
            inner.token = self.state.token();
        }
        inner.token.clone()
    }

    /// Installs a token obtained outside the refresh path (e.g. login).
    pub fn set_token(&self, token: &str, now_ms: i64) {
        let mut inner = self.lock();
        inner.token = Some(token.to_string());
        inner.last_refresh_at = now_ms;
        self.state.set_token(token);
        self.state.set_last_token_refresh(now_ms);
    }

    /// Drops the in-memory token. Durable auth keys are the caller's business.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.token = None;
        inner.last_refresh_at = 0;
    }

    pub fn last_refresh_at(&self) -> i64 {
        self.lock().last_refresh_at
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub fn refresh(&self) -> JotResult<Option<String>> {
        self.refresh_at(now_millis())
    }

    /// Refreshes the token, coalescing with any refresh already in flight.
    ///
    /// The caller that performs the network call gets `Ok(None)` when the
    /// server rejected the token (it has been cleared) and the unchanged
    /// token when the call failed for any other reason. Coalesced callers get
    /// the new token or the error that ended the shared refresh.
    pub fn refresh_at(&self, now_ms: i64) -> JotResult<Option<String>> {
        let mut inner = self.lock();

        if inner.refreshing {
            let generation = inner.generation;
            debug!(generation, "token refresh in flight; waiting for its outcome");
            while inner.generation == generation {
                inner = self
                    .settled
                    .wait(inner)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }

            return match inner.outcome.clone() {
                Some(RefreshOutcome::Refreshed(token)) => Ok(Some(token)),
                Some(RefreshOutcome::Rejected(err)) | Some(RefreshOutcome::Failed(err)) => Err(err),
                None => Err(JotError::auth("token refresh finished without an outcome")),
            };
        }

        if inner.last_refresh_at > 0
            && now_ms.saturating_sub(inner.last_refresh_at) < self.threshold_ms
        {
            debug!("token refreshed recently; reusing current token");
            if inner.token.is_none() {
                inner.token = self.state.token();
            }
            return Ok(inner.token.clone());
        }

        let current = inner.token.clone().or_else(|| self.state.token());
        let Some(current) = current else {
            let err = JotError::session_expired("no token available to refresh");
            self.settle(&mut inner, RefreshOutcome::Rejected(err));
            return Ok(None);
        };

        inner.refreshing = true;
        drop(inner);

        info!("refreshing bearer token");
        let result = self.refresher.refresh_token(&current);

        let mut inner = self.lock();
        match result {
            Ok(token) => {
                inner.token = Some(token.clone());
                inner.last_refresh_at = now_ms;
                self.state.set_token(&token);
                self.state.set_last_token_refresh(now_ms);
                self.settle(&mut inner, RefreshOutcome::Refreshed(token.clone()));
                Ok(Some(token))
            }
            Err(err) if matches!(err.status, Some(401) | Some(403)) => {
                warn!(status = ?err.status, "token refresh rejected; clearing token");
                inner.token = None;
                self.state.clear_token();
                let rejected = JotError::session_expired(format!(
                    "token refresh rejected, authentication expired: {}",
                    err.message
                ));
                let rejected = match err.status {
                    Some(status) => rejected.with_status(status),
                    None => rejected,
                };
                self.settle(&mut inner, RefreshOutcome::Rejected(rejected));
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; keeping current token");
                self.settle(&mut inner, RefreshOutcome::Failed(err));
                Ok(inner.token.clone())
            }
        }
    }

    fn settle(&self, inner: &mut GateState, outcome: RefreshOutcome) {
        inner.refreshing = false;
        inner.generation = inner.generation.wrapping_add(1);
        inner.outcome = Some(outcome);
        self.settled.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
