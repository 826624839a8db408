//! Anti-forgery token cache for cookie sessions.
//!
//! The server hands out the token as an `XSRF-TOKEN` cookie from a dedicated
//! endpoint and expects it back, URL-decoded, in the `X-XSRF-TOKEN` header.
//! The cookie jar always wins over the cached value because the server may
//! rotate the cookie on any response.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Url};
use tokio::sync::Mutex;

use crate::error::{ClientError, Result};

use super::interceptor::XSRF_COOKIE;

pub(crate) struct XsrfCache {
    /// Held across the fetch so concurrent callers share a single request.
    token: Mutex<Option<String>>,
    jar: Arc<Jar>,
}

impl XsrfCache {
    pub(crate) fn new(jar: Arc<Jar>) -> Self {
        Self {
            token: Mutex::new(None),
            jar,
        }
    }

    /// Return a token, fetching the cookie first if none is known yet.
    pub(crate) async fn ensure(&self, client: &Client, base: &Url, cookie_url: &str) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = read_cookie(&self.jar, base) {
            *cached = Some(token.clone());
            return Ok(token);
        }
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        tracing::debug!(url = %cookie_url, "Fetching anti-forgery cookie");
        let response = client.get(cookie_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                body: serde_json::Value::Null,
                message: format!("anti-forgery cookie endpoint returned {status}"),
                status,
            });
        }

        let token = read_cookie(&self.jar, base).ok_or_else(|| {
            ClientError::InvalidRequest(format!(
                "{cookie_url} did not set the {XSRF_COOKIE} cookie"
            ))
        })?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token. The next mutating request fetches a new one
    /// unless the jar already holds a fresh cookie.
    pub(crate) async fn clear(&self) {
        self.token.lock().await.take();
    }
}

/// Read and URL-decode the `XSRF-TOKEN` cookie the jar would send to `url`.
fn read_cookie(jar: &Jar, url: &Url) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == XSRF_COOKIE)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|value| !value.is_empty())
}
