pub mod profile;
pub mod routes;
pub mod service;
pub mod types;
pub mod validation;

pub use profile::ProfileService;
pub use service::AuthService;
pub use types::{
    AuthResponse, ChangePasswordData, ChangeWithCodeData, CheckSessionResponse, CodeData,
    CodeValidity, DeactivateAccountData, ForgotPasswordData, LoginCredentials, MessageResponse,
    ProfileResponse, RegisterData, ResetPasswordData, Secret, SessionCheck, UpdateCompanyData,
    UpdateProfileData, VerifyCodeData,
};
