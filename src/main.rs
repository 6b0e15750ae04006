use clap::Parser;
use huddle_relay::config::{RelayArgs, RelayConfig};
use huddle_relay::relay::RelayServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = RelayConfig::from_args(RelayArgs::parse());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let server = RelayServer::bind(&config.bind_addr()).await?;

    println!("   Relay server listening on port {}", config.port);
    println!("   Press Ctrl+C to stop\n");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
