use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The artifact proving an authenticated session.
///
/// Only bearer mode stores a value here. In cookie mode the server session
/// lives in the HTTP client's cookie jar and the store holds no credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credential::Bearer(token.into())
    }

    pub fn token(&self) -> &str {
        match self {
            Credential::Bearer(token) => token,
        }
    }
}

// Tokens never end up in logs through `{:?}`.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub first_name: String,
    pub id: String,
    pub is_active: bool,
    pub last_name: String,
    pub phone: String,
    pub phone_verified_at: Option<DateTime<Utc>>,
    /// The tenant this account belongs to
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The organization a user account belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub employees_number: Option<String>,
    pub id: String,
    pub is_active: bool,
    pub name: String,
    pub sector: String,
    /// Company type (legal form)
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub zipcode: Option<String>,
}

/// The authenticated identity: a user and the tenant it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub tenant: Option<Tenant>,
    pub user: User,
}

impl Identity {
    pub fn new(user: User, tenant: Option<Tenant>) -> Self {
        Self { tenant, user }
    }

    /// `user.tenant_id` must name the tenant whenever one is present.
    pub fn is_consistent(&self) -> bool {
        match &self.tenant {
            Some(tenant) => self.user.tenant_id.as_deref() == Some(tenant.id.as_str()),
            None => true,
        }
    }
}

/// Process-wide session snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub credential: Option<Credential>,
    /// True iff `user` is present. Derived, never set on its own.
    pub is_authenticated: bool,
    pub tenant: Option<Tenant>,
    pub tenant_id: Option<String>,
    pub user: Option<User>,
}

impl SessionState {
    pub fn identity(&self) -> Option<Identity> {
        self.user
            .as_ref()
            .map(|user| Identity::new(user.clone(), self.tenant.clone()))
    }
}

/// Shallow update for the active user. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub first_name: Option<String>,
    pub is_active: Option<bool>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub phone_verified_at: Option<Option<DateTime<Utc>>>,
}

impl UserPatch {
    pub(crate) fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(at) = self.email_verified_at {
            user.email_verified_at = at;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(at) = self.phone_verified_at {
            user.phone_verified_at = at;
        }
    }
}

impl From<User> for UserPatch {
    fn from(user: User) -> Self {
        Self {
            email: Some(user.email),
            email_verified_at: Some(user.email_verified_at),
            first_name: Some(user.first_name),
            is_active: Some(user.is_active),
            last_name: Some(user.last_name),
            phone: Some(user.phone),
            phone_verified_at: Some(user.phone_verified_at),
        }
    }
}

/// Shallow update for the active tenant. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantPatch {
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub country: Option<String>,
    pub employees_number: Option<Option<String>>,
    pub id: Option<String>,
    pub is_active: Option<bool>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub kind: Option<String>,
    pub zipcode: Option<Option<String>>,
}

impl TenantPatch {
    pub(crate) fn apply(self, tenant: &mut Tenant) {
        if let Some(address) = self.address {
            tenant.address = address;
        }
        if let Some(city) = self.city {
            tenant.city = city;
        }
        if let Some(country) = self.country {
            tenant.country = country;
        }
        if let Some(employees_number) = self.employees_number {
            tenant.employees_number = employees_number;
        }
        if let Some(id) = self.id {
            tenant.id = id;
        }
        if let Some(is_active) = self.is_active {
            tenant.is_active = is_active;
        }
        if let Some(name) = self.name {
            tenant.name = name;
        }
        if let Some(sector) = self.sector {
            tenant.sector = sector;
        }
        if let Some(kind) = self.kind {
            tenant.kind = kind;
        }
        if let Some(zipcode) = self.zipcode {
            tenant.zipcode = zipcode;
        }
    }
}

impl From<Tenant> for TenantPatch {
    fn from(tenant: Tenant) -> Self {
        Self {
            address: Some(tenant.address),
            city: Some(tenant.city),
            country: Some(tenant.country),
            employees_number: Some(tenant.employees_number),
            id: Some(tenant.id),
            is_active: Some(tenant.is_active),
            name: Some(tenant.name),
            sector: Some(tenant.sector),
            kind: Some(tenant.kind),
            zipcode: Some(tenant.zipcode),
        }
    }
}
