use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

use rifa_types::api::LoginResponse;
use rifa_types::models::{Profile, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// What the UI renders from: who is signed in and their profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.role == Role::Admin)
    }
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn { session: Session, profile: Profile },
    SignedOut,
    ProfileUpdated(Profile),
}

impl AuthEvent {
    pub fn from_login(resp: LoginResponse) -> Self {
        Self::SignedIn {
            session: Session {
                user_id: resp.user_id,
                email: resp.profile.email.clone(),
                token: resp.token,
            },
            profile: resp.profile,
        }
    }
}

/// Shared session holder. Clones point at the same state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: RwLock<SessionState>,
    changes: broadcast::Sender<SessionState>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(SessionState::default()),
                changes,
            }),
        }
    }

    pub async fn current(&self) -> SessionState {
        self.inner.state.read().await.clone()
    }

    /// Bearer token for authenticated calls, if signed in.
    pub async fn token(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Fold an auth event into the state and notify subscribers. Returns
    /// whether the state changed.
    pub async fn apply(&self, event: AuthEvent) -> bool {
        let mut state = self.inner.state.write().await;
        let next = match event {
            AuthEvent::SignedIn { session, profile } => SessionState {
                session: Some(session),
                profile: Some(profile),
            },
            AuthEvent::SignedOut => SessionState::default(),
            AuthEvent::ProfileUpdated(profile) => {
                let Some(session) = &state.session else {
                    debug!("Ignoring profile update while signed out");
                    return false;
                };
                if session.user_id != profile.id {
                    warn!("Ignoring profile update for {} while {} is signed in", profile.id, session.user_id);
                    return false;
                }
                SessionState {
                    session: state.session.clone(),
                    profile: Some(profile),
                }
            }
        };

        if *state == next {
            return false;
        }
        *state = next.clone();
        drop(state);

        // No subscribers is fine.
        let _ = self.inner.changes.send(next);
        true
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.inner.changes.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}

/// Receives every session change made after it was created. Dropping it
/// unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<SessionState>,
}

impl Subscription {
    /// Next change, or `None` once the context is gone. A subscriber that
    /// falls behind skips to the oldest change still buffered.
    pub async fn recv(&mut self) -> Option<SessionState> {
        loop {
            match self.rx.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Session subscriber lagged by {} changes", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}
