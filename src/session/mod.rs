pub mod models;
pub mod refresh;
pub mod store;

pub use models::{Credential, Identity, SessionState, Tenant, TenantPatch, User, UserPatch};
pub use refresh::RefreshScheduler;
pub use store::{SessionStore, StoreError, SubscriptionId};
