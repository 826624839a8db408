//! Request augmentation and response normalization.
//!
//! Every request passes through [`scope_request`] before it is sent, and
//! every response through [`classify`] before the caller sees it. Both are
//! pure so the rules can be tested without a server.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::config::SessionMode;
use crate::error::{ClientError, ValidationErrors};
use crate::session::SessionState;

use super::client::{HttpResponse, RequestOptions};

pub const TENANT_HEADER: &str = "X-Tenant-ID";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

const DEFAULT_AUTH_MESSAGE: &str = "Invalid credentials";

/// Methods that change server state and need an anti-forgery token in cookie mode.
pub fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

/// Attach the tenant scope and, in bearer mode, the credential.
pub(crate) fn scope_request(
    mut builder: RequestBuilder,
    state: &SessionState,
    mode: SessionMode,
) -> RequestBuilder {
    if let Some(tenant_id) = &state.tenant_id {
        builder = builder.header(TENANT_HEADER, tenant_id.as_str());
    }
    if mode == SessionMode::Bearer {
        if let Some(credential) = &state.credential {
            builder = builder.bearer_auth(credential.token());
        }
    }
    builder
}

/// What the adapter should do with a response.
#[derive(Debug)]
pub(crate) enum Classified {
    Success(HttpResponse),
    /// A 401 the adapter must handle (refresh-and-retry or forced sign-out).
    Unauthorized,
    Failure(ClientError),
}

pub(crate) fn classify(status: StatusCode, body: Value, options: RequestOptions) -> Classified {
    if status.is_success() {
        return Classified::Success(HttpResponse { body, status });
    }

    if options.auth_attempt
        && (status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST)
    {
        return Classified::Failure(ClientError::Auth {
            message: body_message(&body).unwrap_or_else(|| DEFAULT_AUTH_MESSAGE.to_string()),
            status,
        });
    }

    if status == StatusCode::UNAUTHORIZED && !options.passive {
        return Classified::Unauthorized;
    }

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        if let Some(errors) = ValidationErrors::from_body(&body) {
            return Classified::Failure(ClientError::Validation(errors));
        }
    }

    let message = body_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });
    Classified::Failure(ClientError::Http {
        body,
        message,
        status,
    })
}

/// Human-readable message carried by an error body, if any.
pub(crate) fn body_message(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        Value::String(s) if !s.is_empty() && s.len() <= 200 => Some(s.clone()),
        _ => None,
    }
}
