//! Serves the demo services until Ctrl-C.

mod services;

use clap::Parser;
use tracing::info;
use waymark_core::BodyPolicy;
use waymark_server::logging::{init_tracing, LogFormat, DEFAULT_FILTER};
use waymark_server::{ServerConfig, ServerModule};

use crate::services::{EntityService, MessageService};

#[derive(Parser)]
#[command(name = "demo-server")]
#[command(about = "Serves the waymark demo services", long_about = None)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "WAYMARK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on; 0 picks a free port.
    #[arg(short, long, env = "WAYMARK_PORT", default_value_t = 3000)]
    port: u16,

    /// Allowed CORS origin; repeat for several. Defaults to any origin.
    #[arg(long = "cors-origin", env = "WAYMARK_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[arg(long, env = "WAYMARK_BODY_LIMIT")]
    body_limit: Option<usize>,

    /// Pass `false`, `0` and `""` bodies to handlers instead of dropping them.
    #[arg(long, env = "WAYMARK_KEEP_FALSY_BODIES")]
    keep_falsy_bodies: bool,

    #[arg(long, value_enum, env = "WAYMARK_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: self.host,
            port: self.port,
            cors_origins: if self.cors_origins.is_empty() {
                defaults.cors_origins
            } else {
                self.cors_origins
            },
            body_limit_bytes: self.body_limit.unwrap_or(defaults.body_limit_bytes),
            body_policy: if self.keep_falsy_bodies {
                BodyPolicy::KeepFalsy
            } else {
                BodyPolicy::DropFalsy
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, DEFAULT_FILTER);
    let config = cli.into_config();

    info!(
        bind_address = %config.bind_address(),
        body_policy = ?config.body_policy,
        "Configuration loaded"
    );

    let mut handle = ServerModule::new(config)
        .service(EntityService::default())
        .service(MessageService::default())
        .start()
        .await?;

    info!(address = %handle.local_addr(), "Demo server ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.stop().await?;
    Ok(())
}
