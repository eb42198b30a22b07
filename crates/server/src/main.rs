//! Trivion - real-time multiplayer quiz server

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trivion_net::{App, PubSub};

mod config;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(port = config.port, "Starting Trivion");

    // Optional pub/sub forwarder for horizontal scaling
    let forward = match &config.pubsub_url {
        Some(url) => match PubSub::connect(url).await {
            Ok(pubsub) => Some(pubsub.forwarder()),
            Err(e) => {
                tracing::warn!(error = %e, "Pub/sub unavailable, staying in-process");
                None
            }
        },
        None => None,
    };

    let app = App::new(forward);
    let router = trivion_net::router(app);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %addr, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %addr, "Listening");

    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
