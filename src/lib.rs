//! session-client - Session and authentication kernel for a multi-tenant
//! administration front-end
//!
//! This crate provides:
//! - An observable session store holding the signed-in user and tenant
//! - An HTTP adapter that scopes every request to the active tenant and
//!   credential, and recovers or signs out when the server rejects it
//! - Bearer-token or cookie-based sessions, one per client
//! - Login, registration, password and profile flows
//! - A route guard deciding whether a protected view may render

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod session;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use auth::{AuthService, ProfileService};
use config::Config;
use guard::{Navigator, RouteGuard};
use http::HttpClient;
use session::SessionStore;

pub use error::{ClientError, Result};

/// Everything a front-end needs, wired around one store and one HTTP client.
#[derive(Clone)]
pub struct SessionClient {
    pub auth: AuthService,
    pub config: Config,
    pub guard: RouteGuard,
    pub http: HttpClient,
    pub profile: ProfileService,
    pub store: SessionStore,
}

impl SessionClient {
    pub fn new(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let store = SessionStore::new();
        let http = HttpClient::new(&config, store.clone(), Arc::clone(&navigator))?;
        let auth = AuthService::new(&config, http.clone());
        let guard = RouteGuard::new(auth.clone(), navigator);
        let profile = ProfileService::new(http.clone());

        Ok(Self {
            auth,
            config,
            guard,
            http,
            profile,
            store,
        })
    }
}
