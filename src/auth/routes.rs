//! Endpoint paths of the remote API, relative to the configured base URL.

// Public
pub const REGISTER: &str = "/auth/register";
pub const LOGIN: &str = "/auth/login";
pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
pub const VERIFY_CODE: &str = "/auth/verify-code";
pub const RESET_PASSWORD: &str = "/auth/reset-password";

// Session
pub const LOGOUT: &str = "/auth/logout";
pub const ME: &str = "/auth/me";
pub const CHECK_SESSION: &str = "/auth/check-session";
pub const REFRESH: &str = "/auth/refresh";

// Password changes for a signed-in user
pub const VERIFY_AUTH_CODE: &str = "/auth/verify-auth-code";
pub const RESET_AUTH_PASSWORD: &str = "/auth/reset-auth-password";
pub const CHANGE_PASSWORD: &str = "/auth/change-password";
pub const PASSWORD_REQUEST_CHANGE: &str = "/auth/password/request-change";
pub const PASSWORD_VERIFY_CODE: &str = "/auth/password/verify-code";
pub const PASSWORD_CHANGE_WITH_CODE: &str = "/auth/password/change-with-code";

// Profile
pub const PROFILE: &str = "/auth/profile";
pub const PROFILE_UPDATE: &str = "/auth/profile/update";
pub const PROFILE_COMPANY: &str = "/auth/profile/company";
pub const PROFILE_DEACTIVATE: &str = "/auth/profile/deactivate";
pub const VERIFY_EMAIL: &str = "/auth/verify-email";
pub const VERIFY_PHONE: &str = "/auth/verify-phone";
pub const RESEND_EMAIL_VERIFICATION: &str = "/auth/resend-email-verification";
pub const RESEND_PHONE_VERIFICATION: &str = "/auth/resend-phone-verification";
