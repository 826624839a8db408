use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use thiserror::Error;

use super::models::{Credential, Identity, SessionState, TenantPatch, UserPatch};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No active session")]
    NoActiveSession,
    #[error("No active tenant")]
    NoActiveTenant,
    #[error("User belongs to tenant {user_tenant_id:?}, not {tenant_id}")]
    TenantMismatch {
        tenant_id: String,
        user_tenant_id: Option<String>,
    },
}

/// Handle returned by [`SessionStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&SessionState) + Send + Sync>;

struct Inner {
    /// Serializes a mutation together with its notifications. Re-entrant so
    /// a subscriber may itself dispatch an action.
    commit: ReentrantMutex<()>,
    next_id: AtomicU64,
    state: RwLock<SessionState>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
}

/// Observable container for the authenticated identity.
///
/// Cloning yields another handle to the same state. Every action is
/// synchronous and atomic: it is applied to a copy of the state, committed
/// only if it succeeds, and all subscribers have seen the new snapshot by
/// the time the action returns.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.read())
            .field("subscribers", &self.inner.subscribers.lock().len())
            .finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                commit: ReentrantMutex::new(()),
                next_id: AtomicU64::new(1),
                state: RwLock::new(SessionState::default()),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_state(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_authenticated
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.state.read().credential.clone()
    }

    pub fn tenant_id(&self) -> Option<String> {
        self.inner.state.read().tenant_id.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.read().identity()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Replace the identity, and the credential when one is supplied.
    pub fn set_session(
        &self,
        identity: Identity,
        credential: Option<Credential>,
    ) -> Result<(), StoreError> {
        if let Some(tenant) = &identity.tenant {
            if !identity.is_consistent() {
                return Err(StoreError::TenantMismatch {
                    tenant_id: tenant.id.clone(),
                    user_tenant_id: identity.user.tenant_id.clone(),
                });
            }
        }

        let user_id = identity.user.id.clone();
        self.dispatch("set_session", move |state| {
            state.tenant_id = identity.tenant.as_ref().map(|t| t.id.clone());
            state.tenant = identity.tenant;
            state.user = Some(identity.user);
            if let Some(credential) = credential {
                state.credential = Some(credential);
            }
            Ok(())
        })?;

        tracing::info!(user_id = %user_id, "Session established");
        Ok(())
    }

    /// Reset to the empty state. Idempotent.
    pub fn clear_session(&self) {
        let was_authenticated = self.is_authenticated();
        // Cannot fail: the closure never returns an error.
        let _ = self.dispatch("clear_session", |state| {
            *state = SessionState::default();
            Ok(())
        });
        if was_authenticated {
            tracing::info!("Session cleared");
        }
    }

    /// Replace only the credential.
    pub fn update_credential(&self, credential: Credential) {
        let _ = self.dispatch("update_credential", |state| {
            state.credential = Some(credential);
            Ok(())
        });
    }

    pub fn patch_user(&self, patch: UserPatch) -> Result<(), StoreError> {
        self.dispatch("patch_user", |state| {
            let user = state.user.as_mut().ok_or(StoreError::NoActiveSession)?;
            patch.apply(user);
            Ok(())
        })
    }

    /// Merge into the active tenant. A changed tenant id is propagated to
    /// `tenant_id` and to the user so both keep naming the same tenant.
    pub fn patch_tenant(&self, patch: TenantPatch) -> Result<(), StoreError> {
        self.dispatch("patch_tenant", |state| {
            if state.user.is_none() {
                return Err(StoreError::NoActiveSession);
            }
            let tenant = state.tenant.as_mut().ok_or(StoreError::NoActiveTenant)?;
            patch.apply(tenant);

            let tenant_id = tenant.id.clone();
            if state.tenant_id.as_deref() != Some(tenant_id.as_str()) {
                if let Some(user) = state.user.as_mut() {
                    user.tenant_id = Some(tenant_id.clone());
                }
                state.tenant_id = Some(tenant_id);
            }
            Ok(())
        })
    }

    pub fn mark_email_verified(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.patch_user(UserPatch {
            email_verified_at: Some(Some(at)),
            ..Default::default()
        })
    }

    pub fn mark_phone_verified(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.patch_user(UserPatch {
            phone_verified_at: Some(Some(at)),
            ..Default::default()
        })
    }

    // ========================================================================
    // Subscribers
    // ========================================================================

    /// Register a callback invoked with the new snapshot after every action.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .lock()
            .push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Apply `action` to a copy of the state, commit it, then notify.
    fn dispatch<F>(&self, name: &'static str, action: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SessionState) -> Result<(), StoreError>,
    {
        let _commit = self.inner.commit.lock();

        let snapshot = {
            let mut state = self.inner.state.write();
            let mut next = state.clone();
            action(&mut next)?;
            next.is_authenticated = next.user.is_some();
            *state = next.clone();
            next
        };

        // Snapshot the list so subscribers may (un)subscribe while notified.
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        tracing::debug!(
            action = name,
            authenticated = snapshot.is_authenticated,
            subscribers = subscribers.len(),
            "Session store updated"
        );

        for subscriber in subscribers {
            subscriber(&snapshot);
        }
        Ok(())
    }
}
