pub mod client;
pub mod interceptor;
mod xsrf;

pub use client::{HttpClient, HttpResponse, RefreshResponse, RequestOptions};
pub use interceptor::{is_mutating, TENANT_HEADER, XSRF_COOKIE, XSRF_HEADER};
