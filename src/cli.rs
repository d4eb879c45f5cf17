//! Command Line Interface (CLI) arguments.

use clap::Parser;
use url::Url;

/// Horreum explorer command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the service should listen
    #[arg(long, default_value = "0.0.0.0", env = "HORREUM_EXPLORER_HOST")]
    pub host: String,
    /// The port to which the service should bind
    #[arg(long, default_value_t = 8081, env = "HORREUM_EXPLORER_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "HORREUM_EXPLORER_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/horreum-explorer/certs/cert.pem",
        env = "HORREUM_EXPLORER_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/horreum-explorer/certs/key.pem",
        env = "HORREUM_EXPLORER_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "HORREUM_EXPLORER_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// URL of the Horreum server whose API is queried
    #[arg(
        long,
        default_value = "http://localhost:8080",
        env = "HORREUM_EXPLORER_HORREUM_URL"
    )]
    pub horreum_url: Url,
    /// Timeout in seconds of each request to Horreum
    #[arg(long, default_value_t = 30, env = "HORREUM_EXPLORER_BACKEND_TIMEOUT")]
    pub backend_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "HORREUM_EXPLORER_ENABLE_JAEGER")]
    pub enable_jaeger: bool,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
