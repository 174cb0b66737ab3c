//! # Offsite Pay API Server
//!
//! Main entry point for the payment API server.

use pay_api::{routes::create_router, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .with(fmt::layer())
        .init();

    print_banner();

    // Initialize application state
    let state = AppState::new()?;
    let addr = state.config.socket_addr();

    info!(
        environment = %state.config.environment,
        merchant_id = %state.engine.config().merchant_id,
        "starting offsite-pay API server"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ____  __  __      _ __           ____
  / __ \/ /_/ /_____(_) /____      / __ \____ ___  __
 / / / / __/ __/ ___/ / __/ _ \   / /_/ / __ `/ / / /
/ /_/ / /_/ /_(__  ) / /_/  __/  / ____/ /_/ / /_/ /
\____/\__/\__/____/_/\__/\___/  /_/    \__,_/\__, /
                                            /____/
  Offsite Payment Gateway API v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
