//! Process configuration: CLI flags with environment fallbacks.

use crate::relay::DEFAULT_RELAY_PORT;

/// CLI arguments for the relay server.
#[derive(clap::Parser, Debug)]
#[command(version, about = "WebSocket room relay for encrypted chat")]
pub struct RelayArgs {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_RELAY_PORT)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "RELAY_LOG", default_value = "info")]
    pub log_level: String,
}

/// Resolved relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_RELAY_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_args(args: RelayArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            log_level: args.log_level,
        }
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
