use clap::Parser;
use std::io;
use std::path::PathBuf;

use timeline_server::logging::{init_logging, init_logging_with_filter};
use timeline_server::{run_server, ServerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "timeline-server")]
#[command(about = "Branching conversation timeline HTTP server")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8081")]
    port: u16,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// Model name
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// API key
    #[arg(long, env = "LLM_API_KEY")]
    api_key: Option<String>,

    /// Sent as HTTP-Referer
    #[arg(long, env = "SITE_URL")]
    site_url: Option<String>,

    /// Sent as X-Title
    #[arg(long, env = "SITE_NAME")]
    site_name: Option<String>,

    /// Where session snapshots and event logs live
    #[arg(long, env = "TIMELINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (overrides debug flag)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

impl Cli {
    fn apply_to(&self, config: &mut ServerConfig) {
        let overrides = [
            (&mut config.llm_base_url, &self.llm_base_url),
            (&mut config.model, &self.model),
            (&mut config.api_key, &self.api_key),
            (&mut config.site_url, &self.site_url),
            (&mut config.site_name, &self.site_name),
        ];
        for (slot, value) in overrides {
            if value.is_some() {
                *slot = value.clone();
            }
        }
        if self.data_dir.is_some() {
            config.data_dir = self.data_dir.clone();
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    match cli.log_level.as_deref() {
        Some(level) => init_logging_with_filter(level),
        None => init_logging(cli.debug),
    }

    let mut config = ServerConfig::load();
    cli.apply_to(&mut config);

    log::info!("Starting timeline server on port {}", cli.port);
    log::info!("LLM Configuration:");
    log::info!("  Base URL: {}", config.llm_base_url());
    log::info!("  Model: {}", config.model());
    log::info!("  Data dir: {:?}", config.data_dir());

    if cli.debug {
        log::debug!("Debug mode enabled");
        log::debug!("Timeline configuration: {:?}", config.timeline);
    }

    run_server(config, cli.port).await
}
