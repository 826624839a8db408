use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::session::StoreError;

/// Summary used when a 422 carries neither field messages nor a `message`.
pub const DEFAULT_VALIDATION_MESSAGE: &str = "Validation error";

/// Errors surfaced by the HTTP adapter and the services built on it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad credentials or a refused auth flow (400/401 on an auth endpoint).
    /// Never clears an existing session.
    #[error("Authentication failed ({status}): {message}")]
    Auth { message: String, status: StatusCode },
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// A 401 on an authenticated request that could not be recovered.
    /// The session store has already been cleared.
    #[error("Session expired or revoked, signed out")]
    ForcedSignOut,
    #[error("HTTP error {status}: {message}")]
    Http {
        body: Value,
        message: String,
        status: StatusCode,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(ValidationErrors),
}

impl ClientError {
    /// HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Auth { status, .. } | ClientError::Http { status, .. } => Some(*status),
            ClientError::ForcedSignOut => Some(StatusCode::UNAUTHORIZED),
            ClientError::Validation(_) => Some(StatusCode::UNPROCESSABLE_ENTITY),
            ClientError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ClientError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_forced_sign_out(&self) -> bool {
        matches!(self, ClientError::ForcedSignOut)
    }
}

/// Field-scoped validation failures, in the order the server sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
    message: String,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`, keeping first-seen field order.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.fields.push((field, vec![message])),
        }
        if self.message.is_empty() {
            self.message = self.first_message().unwrap_or_default().to_string();
        }
    }

    /// Normalize a 422 body of the form `{message?, errors: {field: [msg, ...]}}`.
    ///
    /// Returns `None` when the body carries no `errors` object. The summary
    /// is the first message of the first field; failing that the body's
    /// `message`; failing that [`DEFAULT_VALIDATION_MESSAGE`].
    pub fn from_body(body: &Value) -> Option<Self> {
        let errors = body.get("errors")?.as_object()?;

        let mut fields = Vec::with_capacity(errors.len());
        for (field, value) in errors {
            let messages = match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect(),
                Value::String(s) => vec![s.clone()],
                _ => Vec::new(),
            };
            fields.push((field.clone(), messages));
        }

        let message = fields
            .first()
            .and_then(|(_, messages)| messages.first().cloned())
            .or_else(|| {
                body.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_VALIDATION_MESSAGE.to_string());

        Some(Self { fields, message })
    }

    /// Single human-readable summary for form-level display.
    pub fn message(&self) -> &str {
        if self.message.is_empty() {
            DEFAULT_VALIDATION_MESSAGE
        } else {
            &self.message
        }
    }

    fn first_message(&self) -> Option<&str> {
        self.fields
            .first()
            .and_then(|(_, messages)| messages.first())
            .map(String::as_str)
    }

    /// Messages attached to one field.
    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
