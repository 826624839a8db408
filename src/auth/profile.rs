use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::http::{HttpClient, RequestOptions};
use crate::session::{Identity, SessionStore, StoreError, Tenant, TenantPatch, User, UserPatch};

use super::routes;
use super::types::{
    CodeData, DeactivateAccountData, MessageResponse, ProfileResponse, UpdateCompanyData,
    UpdateProfileData,
};

/// Profile and company endpoints for the signed-in user.
///
/// Successful calls are mirrored into the session store so views bound to
/// it pick up the change without a reload.
#[derive(Clone)]
pub struct ProfileService {
    http: HttpClient,
}

impl ProfileService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn store(&self) -> &SessionStore {
        self.http.store()
    }

    /// Reload the full identity. The credential is left as is.
    pub async fn profile(&self) -> Result<Identity> {
        let profile: ProfileResponse = self.http.get(routes::PROFILE).await?;
        let identity = Identity::from(profile);
        self.store().set_session(identity.clone(), None)?;
        Ok(identity)
    }

    pub async fn update_profile(&self, data: UpdateProfileData) -> Result<User> {
        let user: User = self.http.put(routes::PROFILE_UPDATE, &data).await?;
        self.store().patch_user(UserPatch::from(user.clone()))?;
        Ok(user)
    }

    pub async fn company(&self) -> Result<Tenant> {
        let tenant: Tenant = self.http.get(routes::PROFILE_COMPANY).await?;
        self.apply_tenant(&tenant)?;
        Ok(tenant)
    }

    pub async fn update_company(&self, data: UpdateCompanyData) -> Result<Tenant> {
        let tenant: Tenant = self.http.put(routes::PROFILE_COMPANY, &data).await?;
        self.apply_tenant(&tenant)?;
        Ok(tenant)
    }

    /// Deactivate the account. The session ends on success.
    pub async fn deactivate_account(&self, data: DeactivateAccountData) -> Result<MessageResponse> {
        let response: MessageResponse = self
            .http
            .send_json(
                Method::POST,
                routes::PROFILE_DEACTIVATE,
                Some(&data),
                RequestOptions::auth_attempt(),
            )
            .await?;
        self.store().clear_session();
        self.http.reset_xsrf().await;
        info!("Account deactivated");
        Ok(response)
    }

    // ========================================================================
    // Contact verification
    // ========================================================================

    pub async fn verify_email(&self, data: CodeData) -> Result<MessageResponse> {
        let response = self
            .http
            .send(
                Method::POST,
                routes::VERIFY_EMAIL,
                Some(serde_json::to_value(&data)?),
                RequestOptions::default(),
            )
            .await?;
        let at = verified_at(&response.body, "email_verified_at");
        if let Err(e) = self.store().mark_email_verified(at) {
            warn!(error = %e, "Email verified without an active session");
        }
        response.json()
    }

    pub async fn verify_phone(&self, data: CodeData) -> Result<MessageResponse> {
        let response = self
            .http
            .send(
                Method::POST,
                routes::VERIFY_PHONE,
                Some(serde_json::to_value(&data)?),
                RequestOptions::default(),
            )
            .await?;
        let at = verified_at(&response.body, "phone_verified_at");
        if let Err(e) = self.store().mark_phone_verified(at) {
            warn!(error = %e, "Phone verified without an active session");
        }
        response.json()
    }

    pub async fn resend_email_verification(&self) -> Result<MessageResponse> {
        self.http
            .send_json::<Value, _>(
                Method::POST,
                routes::RESEND_EMAIL_VERIFICATION,
                None,
                RequestOptions::default(),
            )
            .await
    }

    pub async fn resend_phone_verification(&self) -> Result<MessageResponse> {
        self.http
            .send_json::<Value, _>(
                Method::POST,
                routes::RESEND_PHONE_VERIFICATION,
                None,
                RequestOptions::default(),
            )
            .await
    }

    /// Merge a tenant into the store, attaching it when the session had none.
    fn apply_tenant(&self, tenant: &Tenant) -> Result<()> {
        match self.store().patch_tenant(TenantPatch::from(tenant.clone())) {
            Err(StoreError::NoActiveTenant) => {
                let Some(identity) = self.store().identity() else {
                    return Err(StoreError::NoActiveSession.into());
                };
                self.store()
                    .set_session(Identity::new(identity.user, Some(tenant.clone())), None)?;
                Ok(())
            }
            other => other.map_err(Into::into),
        }
    }
}

/// Verification time as the server recorded it, looked up as `field` at the
/// top level or on an embedded `user`. Falls back to the local clock.
fn verified_at(body: &Value, field: &str) -> DateTime<Utc> {
    body.get(field)
        .or_else(|| body.get("user").and_then(|user| user.get(field)))
        .or_else(|| body.get("verified_at"))
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_else(Utc::now)
}
