use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{Config, SessionMode};
use crate::error::{ClientError, Result};
use crate::http::{HttpClient, RequestOptions};
use crate::session::{Credential, Identity, RefreshScheduler, SessionStore, User};

use super::routes;
use super::types::{
    AuthResponse, ChangePasswordData, ChangeWithCodeData, CheckSessionResponse, CodeData,
    CodeValidity, ForgotPasswordData, LoginCredentials, MeResponse, MessageResponse,
    RegisterData, ResetPasswordData, SessionCheck, VerifyCodeData,
};
use super::validation::{validate_login, validate_new_password, validate_register};

/// Login, logout, session re-validation and the password flows.
///
/// Every call goes through the shared [`HttpClient`], so the session store
/// sees the same state the requests were scoped with.
#[derive(Clone)]
pub struct AuthService {
    http: HttpClient,
    password_min_length: usize,
    refresh: RefreshScheduler,
}

impl AuthService {
    pub fn new(config: &Config, http: HttpClient) -> Self {
        Self {
            http,
            password_min_length: config.session.password_min_length,
            refresh: RefreshScheduler::new(Duration::from_secs(
                config.session.refresh_margin_seconds,
            )),
        }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn store(&self) -> &SessionStore {
        self.http.store()
    }

    pub fn mode(&self) -> SessionMode {
        self.http.mode()
    }

    /// Whether a background credential refresh is armed.
    pub fn refresh_scheduled(&self) -> bool {
        self.refresh.is_scheduled()
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    pub async fn register(&self, data: RegisterData) -> Result<Identity> {
        let data = data.normalized();
        validate_register(&data, self.password_min_length)?;

        let response: AuthResponse = self
            .call(Method::POST, routes::REGISTER, Some(&data), RequestOptions::auth_attempt())
            .await?;
        self.establish(response)
    }

    pub async fn login(&self, credentials: LoginCredentials) -> Result<Identity> {
        validate_login(&credentials)?;
        let credentials = LoginCredentials {
            credential: credentials.credential.trim().to_string(),
            password: credentials.password,
        };

        let response: AuthResponse = self
            .call(
                Method::POST,
                routes::LOGIN,
                Some(&credentials),
                RequestOptions::auth_attempt(),
            )
            .await?;
        self.establish(response)
    }

    /// End the session on the server and locally.
    ///
    /// The local session is cleared whatever the server answers. A 401 means
    /// the server session was already gone and is not reported.
    pub async fn logout(&self) -> Result<()> {
        self.refresh.cancel();
        let result = self
            .http
            .send(Method::POST, routes::LOGOUT, None, RequestOptions::passive())
            .await;

        self.store().clear_session();
        self.http.reset_xsrf().await;

        match result {
            Ok(_) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) if e.status() == Some(reqwest::StatusCode::UNAUTHORIZED) => {
                debug!("Server session already ended");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the server whether the current session is still valid.
    ///
    /// Never fails: any error counts as unauthenticated.
    pub async fn check_session(&self) -> SessionCheck {
        match self.validate_session().await {
            Ok(check) => check,
            Err(e) => {
                debug!(error = %e, "Session check failed");
                SessionCheck::Unauthenticated
            }
        }
    }

    /// Session check that keeps the error for the route guard, which must
    /// not redirect a second time after a forced sign-out.
    pub(crate) async fn validate_session(&self) -> Result<SessionCheck> {
        match self.mode() {
            SessionMode::Cookie => {
                let response: CheckSessionResponse = self
                    .call::<Value, _>(
                        Method::GET,
                        routes::CHECK_SESSION,
                        None,
                        RequestOptions::passive(),
                    )
                    .await?;

                if !response.authenticated {
                    return Ok(SessionCheck::Unauthenticated);
                }
                let identity = response
                    .user
                    .map(|user| Identity::new(user, response.tenant));
                Ok(SessionCheck::Authenticated(identity))
            }
            SessionMode::Bearer => {
                if self.store().credential().is_none() {
                    return Ok(SessionCheck::Unauthenticated);
                }
                let me: MeResponse = self
                    .call::<Value, _>(Method::GET, routes::ME, None, RequestOptions::default())
                    .await?;
                Ok(SessionCheck::Authenticated(Some(self.me_identity(me))))
            }
        }
    }

    /// Exchange the bearer credential for a fresh one and re-arm the
    /// background refresh. Failure signs the session out.
    pub async fn refresh_credential(&self) -> Result<Credential> {
        let refreshed = self.http.refresh_credential().await?;
        if let Some(secs) = refreshed.expires_in {
            self.refresh
                .schedule(self.http.clone(), Duration::from_secs(secs));
        }
        Ok(Credential::bearer(refreshed.token))
    }

    pub async fn current_user(&self) -> Result<User> {
        let me: MeResponse = self
            .call::<Value, _>(Method::GET, routes::ME, None, RequestOptions::default())
            .await?;
        Ok(match me {
            MeResponse::Profile(profile) => profile.user,
            MeResponse::User(user) => user,
        })
    }

    // ========================================================================
    // Password flows
    // ========================================================================

    // A 400/401 is reported as a refused secret only where the caller
    // submits one the server checks. Flows that run inside a signed-in
    // session go through normal 401 recovery.

    pub async fn forgot_password(&self, data: ForgotPasswordData) -> Result<MessageResponse> {
        let data = ForgotPasswordData {
            email: data.email.trim().to_lowercase(),
        };
        if data.email.is_empty() {
            return Err(single_field_error("email", "Email is required"));
        }
        self.call(
            Method::POST,
            routes::FORGOT_PASSWORD,
            Some(&data),
            RequestOptions::auth_attempt(),
        )
        .await
    }

    pub async fn verify_code(&self, data: VerifyCodeData) -> Result<CodeValidity> {
        require_code(&data.code)?;
        self.call(
            Method::POST,
            routes::VERIFY_CODE,
            Some(&data),
            RequestOptions::auth_attempt(),
        )
        .await
    }

    pub async fn reset_password(&self, data: ResetPasswordData) -> Result<MessageResponse> {
        validate_new_password(
            ("password", &data.password),
            ("password_confirmation", &data.password_confirmation),
            self.password_min_length,
        )?;
        self.call(
            Method::POST,
            routes::RESET_PASSWORD,
            Some(&data),
            RequestOptions::auth_attempt(),
        )
        .await
    }

    /// Code check for the reset flow started from an authenticated area.
    pub async fn verify_auth_code(&self, data: VerifyCodeData) -> Result<CodeValidity> {
        require_code(&data.code)?;
        self.call(
            Method::POST,
            routes::VERIFY_AUTH_CODE,
            Some(&data),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn reset_auth_password(&self, data: ResetPasswordData) -> Result<MessageResponse> {
        validate_new_password(
            ("password", &data.password),
            ("password_confirmation", &data.password_confirmation),
            self.password_min_length,
        )?;
        self.call(
            Method::POST,
            routes::RESET_AUTH_PASSWORD,
            Some(&data),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn change_password(&self, data: ChangePasswordData) -> Result<MessageResponse> {
        if data.current_password.is_empty() {
            return Err(single_field_error(
                "current_password",
                "Current password is required",
            ));
        }
        validate_new_password(
            ("new_password", &data.new_password),
            ("new_password_confirmation", &data.new_password_confirmation),
            self.password_min_length,
        )?;
        self.call(
            Method::POST,
            routes::CHANGE_PASSWORD,
            Some(&data),
            RequestOptions::auth_attempt(),
        )
        .await
    }

    /// Send a verification code to the signed-in user before a password change.
    pub async fn request_password_change(&self) -> Result<MessageResponse> {
        self.call::<Value, _>(
            Method::POST,
            routes::PASSWORD_REQUEST_CHANGE,
            None,
            RequestOptions::default(),
        )
        .await
    }

    pub async fn verify_password_change_code(&self, data: CodeData) -> Result<CodeValidity> {
        require_code(&data.code)?;
        self.call(
            Method::POST,
            routes::PASSWORD_VERIFY_CODE,
            Some(&data),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn change_password_with_code(
        &self,
        data: ChangeWithCodeData,
    ) -> Result<MessageResponse> {
        require_code(&data.code)?;
        validate_new_password(
            ("password", &data.password),
            ("password_confirmation", &data.password_confirmation),
            self.password_min_length,
        )?;
        self.call(
            Method::POST,
            routes::PASSWORD_CHANGE_WITH_CODE,
            Some(&data),
            RequestOptions::default(),
        )
        .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn call<B, T>(
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
        self.http.send_json(method, path, body, options).await
    }

    /// Store the identity from a login or registration response.
    fn establish(&self, response: AuthResponse) -> Result<Identity> {
        let identity = response.identity();
        let credential = match self.mode() {
            SessionMode::Bearer => {
                let token = response.token.ok_or_else(|| {
                    ClientError::InvalidRequest(
                        "authentication response carried no token".to_string(),
                    )
                })?;
                Some(Credential::bearer(token))
            }
            SessionMode::Cookie => None,
        };
        let bearer = credential.is_some();

        self.store().set_session(identity.clone(), credential)?;

        if bearer {
            match response.expires_in {
                Some(secs) => self
                    .refresh
                    .schedule(self.http.clone(), Duration::from_secs(secs)),
                None => self.refresh.cancel(),
            }
        }

        info!(
            user_id = %identity.user.id,
            tenant_id = ?identity.tenant.as_ref().map(|t| t.id.as_str()),
            "Authenticated"
        );
        Ok(identity)
    }

    /// A bare user from `/auth/me` keeps the tenant already in the store
    /// when it still matches.
    fn me_identity(&self, me: MeResponse) -> Identity {
        match me {
            MeResponse::Profile(profile) => profile.into(),
            MeResponse::User(user) => {
                let tenant = self
                    .store()
                    .get_state()
                    .tenant
                    .filter(|tenant| user.tenant_id.as_deref() == Some(tenant.id.as_str()));
                Identity::new(user, tenant)
            }
        }
    }
}

fn single_field_error(field: &str, message: &str) -> ClientError {
    let mut errors = crate::error::ValidationErrors::new();
    errors.add(field, message);
    ClientError::Validation(errors)
}

fn require_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(single_field_error("code", "Code is required"));
    }
    Ok(())
}
