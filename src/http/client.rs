//! HTTP adapter for the administration API.
//!
//! Wraps a `reqwest::Client` with the session rules: requests are scoped to
//! the active tenant and credential, responses are normalized into
//! [`ClientError`] variants, and a rejected session is either refreshed
//! once (bearer mode) or signed out (cookie mode).

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::auth::routes;
use crate::config::{Config, SessionMode};
use crate::error::{ClientError, Result};
use crate::guard::Navigator;
use crate::session::{Credential, SessionStore};

use super::interceptor::{self, Classified, XSRF_HEADER};
use super::xsrf::XsrfCache;

/// Per-request switches for the response interceptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Login, registration and password flows: a 400/401 means the
    /// submitted credentials were refused, not that a session expired.
    pub auth_attempt: bool,
    /// Hand a 401 back to the caller without refreshing or signing out.
    pub passive: bool,
}

impl RequestOptions {
    pub fn auth_attempt() -> Self {
        Self {
            auth_attempt: true,
            passive: false,
        }
    }

    pub fn passive() -> Self {
        Self {
            auth_attempt: false,
            passive: true,
        }
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Decoded JSON body; `Null` when the body was empty.
    pub body: Value,
    pub status: StatusCode,
}

impl HttpResponse {
    /// Decode the body into `T`. An empty body decodes as `{}` so message-only
    /// responses with all-default fields accept a 204.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = match self.body {
            Value::Null => Value::Object(Default::default()),
            body => body,
        };
        Ok(serde_json::from_value(body)?)
    }
}

/// Body of a successful `/auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Lifetime of the new token in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub token: String,
}

struct Inner {
    base: Url,
    client: Client,
    login_path: String,
    mode: SessionMode,
    navigator: Arc<dyn Navigator>,
    /// Serializes bearer refreshes so concurrent 401s share one.
    refresh: Mutex<()>,
    store: SessionStore,
    xsrf: Option<XsrfCache>,
    xsrf_cookie_url: String,
}

/// Cheap to clone; all clones share the connection pool, cookie jar and
/// anti-forgery cache.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl HttpClient {
    pub fn new(config: &Config, store: SessionStore, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let base = Url::parse(config.api.base_url.trim_end_matches('/')).map_err(|e| {
            ClientError::InvalidRequest(format!("invalid base URL {}: {e}", config.api.base_url))
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout());

        let xsrf = match config.session.mode {
            SessionMode::Cookie => {
                let jar = Arc::new(Jar::default());
                builder = builder.cookie_provider(Arc::clone(&jar));
                Some(XsrfCache::new(jar))
            }
            SessionMode::Bearer => None,
        };

        let client = builder.build()?;
        let xsrf_cookie_url = join(&base, &config.session.xsrf_cookie_path);

        tracing::debug!(
            base_url = %base,
            mode = ?config.session.mode,
            "HTTP client ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                base,
                client,
                login_path: config.session.login_path.clone(),
                mode: config.session.mode,
                navigator,
                refresh: Mutex::new(()),
                store,
                xsrf,
                xsrf_cookie_url,
            }),
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.mode
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    pub fn url(&self, path: &str) -> String {
        join(&self.inner.base, path)
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send a request through both interceptors.
    ///
    /// The request runs on its own task: dropping the returned future does
    /// not abort it, the result is simply discarded.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let this = self.clone();
        let path = path.to_string();
        let handle = tokio::spawn(async move { this.execute(method, &path, body, options).await });

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ClientError::InvalidRequest(format!("request task aborted: {e}"))),
        }
    }

    /// Send `body` as JSON and decode the response into `T`.
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        self.send(method, path, body, options).await?.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json::<Value, T>(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json::<Value, T>(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let sent = self.inner.store.get_state();
        let sent_credential = sent.credential;

        // Without a session there is nothing to recover or sign out of.
        let options = if sent.is_authenticated || sent_credential.is_some() {
            options
        } else {
            RequestOptions {
                passive: true,
                ..options
            }
        };

        let (status, payload) = self.dispatch(&method, path, body.as_ref()).await?;

        match interceptor::classify(status, payload, options) {
            Classified::Success(response) => Ok(response),
            Classified::Failure(err) => Err(err),
            Classified::Unauthorized => {
                self.recover(method, path, body, options, sent_credential)
                    .await
            }
        }
    }

    /// Handle a 401: at most one refresh-and-retry in bearer mode, a forced
    /// sign-out otherwise.
    async fn recover(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
        sent_credential: Option<Credential>,
    ) -> Result<HttpResponse> {
        if self.inner.mode == SessionMode::Cookie {
            return Err(self.force_sign_out(path, "server session rejected").await);
        }

        let Some(sent_credential) = sent_credential else {
            return Err(self.force_sign_out(path, "no credential to refresh").await);
        };

        if let Err(e) = self.refresh_after_rejection(&sent_credential).await {
            tracing::debug!(error = %e, "Credential refresh failed");
            return Err(self.force_sign_out(path, "credential refresh failed").await);
        }

        tracing::debug!(method = %method, path = %path, "Retrying with refreshed credential");
        let (status, payload) = self.dispatch(&method, path, body.as_ref()).await?;
        match interceptor::classify(status, payload, options) {
            Classified::Success(response) => Ok(response),
            Classified::Failure(err) => Err(err),
            Classified::Unauthorized => {
                Err(self.force_sign_out(path, "rejected after refresh").await)
            }
        }
    }

    /// Apply the request interceptor, send, and read the body.
    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = self.url(path);
        let state = self.inner.store.get_state();

        let mut request = self.inner.client.request(method.clone(), &url);
        request = interceptor::scope_request(request, &state, self.inner.mode);

        if let Some(xsrf) = &self.inner.xsrf {
            if interceptor::is_mutating(method) {
                let token = xsrf
                    .ensure(&self.inner.client, &self.inner.base, &self.inner.xsrf_cookie_url)
                    .await?;
                request = request.header(XSRF_HEADER, token);
            }
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        tracing::debug!(method = %method, path = %path, status = status.as_u16(), "API response");
        Ok((status, payload))
    }

    // ========================================================================
    // Credential lifecycle
    // ========================================================================

    /// Exchange the current bearer credential for a new one.
    ///
    /// Any failure signs the session out.
    pub async fn refresh_credential(&self) -> Result<RefreshResponse> {
        if self.inner.mode != SessionMode::Bearer {
            return Err(ClientError::InvalidRequest(
                "credential refresh is only available in bearer mode".to_string(),
            ));
        }

        let result = {
            let _refresh = self.inner.refresh.lock().await;
            self.request_refresh().await
        };
        match result {
            Ok(refreshed) => Ok(refreshed),
            Err(e) => {
                tracing::debug!(error = %e, "Credential refresh failed");
                Err(self.force_sign_out(routes::REFRESH, "credential refresh failed").await)
            }
        }
    }

    /// Refresh unless another request already replaced `rejected`.
    async fn refresh_after_rejection(&self, rejected: &Credential) -> Result<()> {
        let _refresh = self.inner.refresh.lock().await;

        match self.inner.store.credential() {
            Some(current) if current != *rejected => {
                tracing::debug!("Credential already refreshed by a concurrent request");
                Ok(())
            }
            Some(_) => self.request_refresh().await.map(|_| ()),
            None => Err(ClientError::ForcedSignOut),
        }
    }

    /// Call the refresh endpoint once and store the new credential.
    /// Callers hold the refresh lock.
    async fn request_refresh(&self) -> Result<RefreshResponse> {
        if self.inner.store.credential().is_none() {
            return Err(ClientError::ForcedSignOut);
        }

        let (status, payload) = self.dispatch(&Method::POST, routes::REFRESH, None).await?;
        let response = match interceptor::classify(status, payload, RequestOptions::passive()) {
            Classified::Success(response) => response,
            Classified::Failure(err) => return Err(err),
            Classified::Unauthorized => return Err(ClientError::ForcedSignOut),
        };

        let refreshed: RefreshResponse = response.json()?;
        self.inner
            .store
            .update_credential(Credential::bearer(refreshed.token.clone()));
        tracing::info!(expires_in = ?refreshed.expires_in, "Credential refreshed");
        Ok(refreshed)
    }

    /// Clear the session, drop cached anti-forgery state and tell the navigator.
    async fn force_sign_out(&self, path: &str, reason: &str) -> ClientError {
        tracing::warn!(path = %path, reason = %reason, "Forced sign-out");
        self.inner.store.clear_session();
        if let Some(xsrf) = &self.inner.xsrf {
            xsrf.clear().await;
        }
        self.inner.navigator.forced_sign_out(&self.inner.login_path);
        ClientError::ForcedSignOut
    }

    /// Forget cached anti-forgery state after an explicit logout.
    pub(crate) async fn reset_xsrf(&self) {
        if let Some(xsrf) = &self.inner.xsrf {
            xsrf.clear().await;
        }
    }
}

fn join(base: &Url, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.as_str().trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
