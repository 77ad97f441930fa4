//! Session service.
//!
//! One authoritative session state per process, initialized lazily from a
//! loader on first read. Interested parts of the application subscribe for
//! changes and unsubscribe when they go away; [`SessionManager::teardown`]
//! drops every subscriber and the cached state.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::store::{StoreError, StoreResult};

/// A signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session state as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedIn(Session),
    SignedOut,
}

impl SessionState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionState::SignedIn(session) => Some(&session.user_id),
            SessionState::SignedOut => None,
        }
    }
}

/// Handle returned by [`SessionManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&SessionState) + Send>;
type Loader = Box<dyn Fn() -> Option<Session> + Send + Sync>;

struct Inner {
    state: Option<SessionState>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

/// Injectable session service with explicit subscribe/unsubscribe.
pub struct SessionManager {
    loader: Loader,
    inner: Mutex<Inner>,
}

impl SessionManager {
    /// Create a manager that restores the session with `loader` on first use.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Option<Session> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            inner: Mutex::new(Inner {
                state: None,
                listeners: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// A manager with a fixed user, for daemons and tests.
    pub fn with_user(user_id: impl Into<String>) -> Self {
        let session = Session {
            user_id: user_id.into(),
            email: None,
        };
        Self::new(move || Some(session.clone()))
    }

    /// Current state, loading it on first call.
    pub fn current(&self) -> StoreResult<SessionState> {
        let mut inner = self.lock()?;
        if let Some(state) = &inner.state {
            return Ok(state.clone());
        }
        let state = match (self.loader)() {
            Some(session) => SessionState::SignedIn(session),
            None => SessionState::SignedOut,
        };
        inner.state = Some(state.clone());
        Ok(state)
    }

    /// The signed-in user's ID, if any.
    pub fn user_id(&self) -> StoreResult<Option<String>> {
        Ok(self.current()?.user_id().map(str::to_string))
    }

    /// Register a listener for sign-in and sign-out.
    ///
    /// Listeners run with the manager locked and must not call back into it.
    pub fn subscribe<F>(&self, listener: F) -> StoreResult<SubscriptionId>
    where
        F: Fn(&SessionState) + Send + 'static,
    {
        let mut inner = self.lock()?;
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        Ok(id)
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.listeners.len();
        inner.listeners.retain(|(existing, _)| *existing != id);
        Ok(inner.listeners.len() != before)
    }

    pub fn sign_in(&self, session: Session) -> StoreResult<()> {
        self.set_state(SessionState::SignedIn(session))
    }

    pub fn sign_out(&self) -> StoreResult<()> {
        self.set_state(SessionState::SignedOut)
    }

    /// Drop all subscribers and forget the cached state.
    pub fn teardown(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.listeners.clear();
        inner.state = None;
        Ok(())
    }

    pub fn subscriber_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.listeners.len())
    }

    fn set_state(&self, state: SessionState) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.state.as_ref() == Some(&state) {
            return Ok(());
        }
        tracing::debug!(user = ?state.user_id(), "session changed");
        inner.state = Some(state.clone());
        for (_, listener) in &inner.listeners {
            listener(&state);
        }
        Ok(())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}
