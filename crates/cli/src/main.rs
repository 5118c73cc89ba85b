use clap::Parser;

#[derive(Parser)]
#[command(name = "linegem")]
#[command(version, about = "LINE webhook server: keyword replies, otherwise Gemini", long_about = None)]
struct Cli {
    /// Bind address (default from config or 0.0.0.0)
    #[arg(long, short, value_name = "ADDR")]
    bind: Option<String>,

    /// HTTP port (default from PORT, config, or 3000)
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables take precedence.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run_gateway(cli.bind, cli.port).await {
        log::error!("gateway failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_gateway(bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(None)?;
    log::debug!("configuration from {}", path.display());
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config).await
}
