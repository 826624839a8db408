//! Route guard for protected views.
//!
//! Each navigation attempt starts `Unknown` and settles exactly once into
//! `Authenticated` or `Unauthenticated`. There are no retries; an error
//! while checking counts as unauthenticated.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{AuthService, SessionCheck};
use crate::error::ClientError;

/// Where the host application routes the user.
pub trait Navigator: Send + Sync {
    /// Navigate to `to`, replacing the current location.
    fn redirect(&self, to: &str);

    /// A session check is in flight; show a placeholder.
    fn loading(&self) {}

    /// The HTTP adapter ended the session after the server rejected it.
    fn forced_sign_out(&self, login_path: &str) {
        self.redirect(login_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unknown,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Render the protected view.
    Admit,
    /// The user was sent to this path instead.
    Redirect(String),
}

impl GuardOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GuardOutcome::Admit)
    }
}

#[derive(Clone)]
pub struct RouteGuard {
    auth: AuthService,
    navigator: Arc<dyn Navigator>,
}

impl RouteGuard {
    pub fn new(auth: AuthService, navigator: Arc<dyn Navigator>) -> Self {
        Self { auth, navigator }
    }

    /// Start a navigation attempt.
    pub fn attempt(&self) -> Navigation<'_> {
        Navigation {
            guard: self,
            outcome: None,
        }
    }

    /// Run one navigation attempt to completion.
    pub async fn check(&self) -> GuardOutcome {
        self.attempt().resolve().await
    }

    fn login_path(&self) -> &str {
        self.auth.http().login_path()
    }

    async fn decide(&self) -> GuardOutcome {
        self.navigator.loading();

        match self.auth.validate_session().await {
            Ok(SessionCheck::Authenticated(identity)) => {
                if let Some(identity) = identity {
                    if let Err(e) = self.auth.store().set_session(identity, None) {
                        debug!(error = %e, "Session check returned an unusable identity");
                        return self.deny(true);
                    }
                }
                debug!("Navigation admitted");
                GuardOutcome::Admit
            }
            Ok(SessionCheck::Unauthenticated) => self.deny(true),
            // The adapter already cleared the store and redirected.
            Err(ClientError::ForcedSignOut) => self.deny(false),
            Err(e) => {
                debug!(error = %e, "Session check failed");
                self.deny(true)
            }
        }
    }

    fn deny(&self, redirect: bool) -> GuardOutcome {
        let login_path = self.login_path().to_string();
        self.auth.store().clear_session();
        if redirect {
            self.navigator.redirect(&login_path);
        }
        info!(to = %login_path, "Navigation denied");
        GuardOutcome::Redirect(login_path)
    }
}

/// A single navigation attempt.
pub struct Navigation<'a> {
    guard: &'a RouteGuard,
    outcome: Option<GuardOutcome>,
}

impl Navigation<'_> {
    pub fn state(&self) -> GuardState {
        match &self.outcome {
            None => GuardState::Unknown,
            Some(GuardOutcome::Admit) => GuardState::Authenticated,
            Some(GuardOutcome::Redirect(_)) => GuardState::Unauthenticated,
        }
    }

    /// Settle the attempt. Once settled, later calls return the same outcome
    /// without checking again.
    pub async fn resolve(&mut self) -> GuardOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let outcome = self.guard.decide().await;
        self.outcome = Some(outcome.clone());
        outcome
    }
}
