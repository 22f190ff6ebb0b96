//! Per-backend auth session lifecycle.
//!
//! Cloud tokens live about an hour and are refreshed five minutes early.
//! On-prem session keys live about ten minutes and are additionally
//! force-refreshed every N sub-requests so they cannot expire in the middle
//! of a multi-day collection loop. Refresh runs behind a mutex: concurrent
//! callers wait for one auth exchange instead of racing their own.

use crate::types::BackendKind;
use crate::utils::{Logger, RestoResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Token plus its advertised lifetime, as returned by an auth exchange.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub ttl: Duration,
}

/// A live session against one backend.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub backend: BackendKind,
}

/// The backend-specific credential exchange. Production impls live in the
/// backend clients; tests substitute fakes.
#[async_trait]
pub trait AuthExchange: Send + Sync {
    async fn authenticate(&self) -> RestoResult<IssuedToken>;
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Refresh this long before the advertised expiry.
    pub refresh_margin: Duration,
    /// Re-auth after this many `ensure_valid` calls even if the token still
    /// looks fresh. 0 disables the cadence.
    pub force_refresh_every: u32,
}

impl AuthConfig {
    /// Cloud tokens: ~60 min lifetime, 5 min margin, no forced cadence.
    pub fn cloud() -> Self {
        Self {
            refresh_margin: Duration::minutes(5),
            force_refresh_every: 0,
        }
    }

    /// On-prem session keys: ~10 min lifetime, 1 min margin, forced
    /// re-auth every 40 sub-requests during batch loops.
    pub fn on_prem() -> Self {
        Self {
            refresh_margin: Duration::minutes(1),
            force_refresh_every: 40,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<AuthSession>,
    requests_since_refresh: u32,
}

pub struct TokenManager {
    backend: BackendKind,
    config: AuthConfig,
    state: Mutex<SessionState>,
    logger: Logger,
}

impl TokenManager {
    pub fn new(backend: BackendKind, config: AuthConfig) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(SessionState::default()),
            logger: Logger::named(&format!("auth:{}", backend.as_str())),
        }
    }

    /// Returns a valid token, authenticating or refreshing as needed.
    pub async fn ensure_valid(&self, exchange: &dyn AuthExchange) -> RestoResult<String> {
        let mut state = self.state.lock().await;
        state.requests_since_refresh += 1;

        let cadence_hit = self.config.force_refresh_every > 0
            && state.requests_since_refresh >= self.config.force_refresh_every;

        if !cadence_hit {
            if let Some(session) = &state.session {
                if Utc::now() < session.expires_at - self.config.refresh_margin {
                    return Ok(session.token.clone());
                }
            }
        }

        self.refresh_locked(&mut state, exchange).await
    }

    /// Drops the current session. The next `ensure_valid` re-authenticates.
    /// Called by clients on any auth-rejection response.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.session = None;
        self.logger.info("session invalidated");
    }

    /// Unconditional re-auth, regardless of apparent freshness.
    pub async fn force_refresh(&self, exchange: &dyn AuthExchange) -> RestoResult<String> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state, exchange).await
    }

    pub async fn current_session(&self) -> Option<AuthSession> {
        self.state.lock().await.session.clone()
    }

    async fn refresh_locked(
        &self,
        state: &mut SessionState,
        exchange: &dyn AuthExchange,
    ) -> RestoResult<String> {
        let issued = exchange.authenticate().await?;
        let session = AuthSession {
            token: issued.token.clone(),
            expires_at: Utc::now() + issued.ttl,
            backend: self.backend,
        };
        self.logger.info(&format!(
            "token refreshed, valid until {}",
            session.expires_at.format("%H:%M:%S")
        ));
        state.session = Some(session);
        state.requests_since_refresh = 0;
        Ok(issued.token)
    }
}
