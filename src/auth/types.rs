use serde::{Deserialize, Serialize};

use crate::session::{Identity, Tenant, User};

// ============================================================================
// Secrets
// ============================================================================

/// A password or one-time secret. Serialized as a plain string, redacted in
/// `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// Email address or phone number
    pub credential: String,
    pub password: Secret,
}

impl LoginCredentials {
    pub fn new(credential: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            credential: credential.into(),
            password: password.into(),
        }
    }
}

/// Account registration, creating the user and its tenant in one call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_city: Option<String>,
    pub company_country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_employees_number: Option<String>,
    pub company_name: String,
    pub company_sector: String,
    pub company_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_zipcode: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Secret,
    pub password_confirmation: Secret,
    pub phone: String,
}

impl RegisterData {
    /// Trim free-text fields, lowercase the email and drop blank optionals.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.phone = self.phone.trim().to_string();
        self.company_name = self.company_name.trim().to_string();
        self.company_address = blank_to_none(self.company_address);
        self.company_city = blank_to_none(self.company_city);
        self.company_zipcode = blank_to_none(self.company_zipcode);
        self.company_employees_number = blank_to_none(self.company_employees_number);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordData {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeData {
    pub code: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordData {
    pub code: String,
    pub email: String,
    pub password: Secret,
    pub password_confirmation: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordData {
    pub current_password: Secret,
    pub new_password: Secret,
    pub new_password_confirmation: Secret,
}

/// A verification code on its own (email/phone verification, password change)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeData {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeWithCodeData {
    pub code: String,
    pub password: Secret,
    pub password_confirmation: Secret,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCompanyData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateAccountData {
    pub password: Secret,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Body of a successful login or registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Lifetime of `token` in seconds (bearer mode)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub tenant: Option<Tenant>,
    /// Present in bearer mode only
    #[serde(default)]
    pub token: Option<String>,
    pub user: User,
}

impl AuthResponse {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user.clone(), self.tenant.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSessionResponse {
    pub authenticated: bool,
    #[serde(default)]
    pub tenant: Option<Tenant>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub tenant: Option<Tenant>,
    pub user: User,
}

impl From<ProfileResponse> for Identity {
    fn from(profile: ProfileResponse) -> Self {
        Identity::new(profile.user, profile.tenant)
    }
}

/// `/auth/me` answers either `{user, tenant}` or the bare user.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MeResponse {
    Profile(ProfileResponse),
    User(User),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeValidity {
    pub valid: bool,
    /// Reset token handed out by some flows once the code is accepted
    #[serde(default)]
    pub token: Option<String>,
}

/// Outcome of a session re-validation
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCheck {
    /// The server recognizes the session; carries a fresh identity when it sent one.
    Authenticated(Option<Identity>),
    Unauthenticated,
}

impl SessionCheck {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionCheck::Authenticated(_))
    }
}
