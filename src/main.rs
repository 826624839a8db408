use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_client::auth::LoginCredentials;
use session_client::config::Config;
use session_client::guard::Navigator;
use session_client::SessionClient;

/// Logs navigation requests instead of driving a UI.
struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, to: &str) {
        info!(to = %to, "Redirect");
    }

    fn loading(&self) {
        info!("Checking session");
    }

    fn forced_sign_out(&self, login_path: &str) {
        warn!(to = %login_path, "Signed out by the server");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "session-client starting");

    let config = Config::load()?;
    info!(
        base_url = %config.api.base_url,
        mode = ?config.session.mode,
        "Loaded configuration"
    );

    let client = SessionClient::new(config, Arc::new(LogNavigator))?;

    // Sign in first when credentials are supplied, otherwise only probe the
    // existing session.
    let logged_in = match (
        std::env::var("LOGIN_CREDENTIAL"),
        std::env::var("LOGIN_PASSWORD"),
    ) {
        (Ok(credential), Ok(password)) => {
            let identity = client
                .auth
                .login(LoginCredentials::new(credential, password))
                .await?;
            info!(user = %identity.user.full_name(), "Logged in");
            true
        }
        _ => false,
    };

    let outcome = client.guard.check().await;
    info!(admitted = outcome.is_admitted(), "Guard check complete");

    match client.store.identity() {
        Some(identity) => println!("{}", serde_json::to_string_pretty(&identity)?),
        None => println!("not authenticated"),
    }

    if logged_in {
        client.auth.logout().await?;
    }

    Ok(())
}
