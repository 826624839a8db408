//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::guard::Navigator;
use crate::session::{Identity, Tenant, User};

/// Create an active, unverified `User` belonging to `tenant_id`.
pub fn make_user(id: &str, tenant_id: &str) -> User {
    User {
        created_at: Some(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()),
        email: format!("{id}@example.com"),
        email_verified_at: None,
        first_name: "Awa".to_string(),
        id: id.to_string(),
        is_active: true,
        last_name: "Diop".to_string(),
        phone: "+221700000000".to_string(),
        phone_verified_at: None,
        tenant_id: Some(tenant_id.to_string()),
        updated_at: None,
    }
}

/// Create an active `Tenant` with the given id.
pub fn make_tenant(id: &str) -> Tenant {
    Tenant {
        address: Some("12 avenue Cheikh Anta Diop".to_string()),
        city: Some("Dakar".to_string()),
        country: "SN".to_string(),
        created_at: None,
        employees_number: Some("10-49".to_string()),
        id: id.to_string(),
        is_active: true,
        name: format!("Tenant {id}"),
        sector: "retail".to_string(),
        kind: "SARL".to_string(),
        updated_at: None,
        zipcode: None,
    }
}

/// A consistent identity: the user belongs to the tenant.
pub fn make_identity(user_id: &str, tenant_id: &str) -> Identity {
    Identity::new(make_user(user_id, tenant_id), Some(make_tenant(tenant_id)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    ForcedSignOut(String),
    Loading,
    Redirect(String),
}

/// Navigator that records every call for later assertions.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<NavEvent>>,
}

impl RecordingNavigator {
    pub fn events(&self) -> Vec<NavEvent> {
        self.events.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, to: &str) {
        self.events.lock().push(NavEvent::Redirect(to.to_string()));
    }

    fn loading(&self) {
        self.events.lock().push(NavEvent::Loading);
    }

    fn forced_sign_out(&self, login_path: &str) {
        self.events
            .lock()
            .push(NavEvent::ForcedSignOut(login_path.to_string()));
    }
}
