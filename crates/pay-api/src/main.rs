//! # Payments API
//!
//! Stripe payments and auth backend.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export JWT_SECRET=<at least 32 bytes>
//! export DATABASE_URL=postgres://...
//!
//! # Run the server
//! payments-api
//! ```

use pay_api::{routes, state::AppConfig, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Print banner
    print_banner();

    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;
    let is_prod = config.is_production();

    info!("Environment: {}", config.environment);
    info!(
        "Stripe mode: {}",
        if config.stripe.is_live_mode() { "live" } else { "test" }
    );

    let state = AppState::build(config).await?;
    let app = routes::create_router(state);

    info!("Payments API starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Payment intent: POST http://{}/payments/create-payment-intent", addr);
        info!("Webhook: POST http://{}/payments/stripe-webhook", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_banner() {
    println!(
        r#"
  Stripe Payments API
  ━━━━━━━━━━━━━━━━━━━━━━━
  Payments, auth and webhooks
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
