use clap::Parser;
use log::{info, warn};
use server::network::{Server, ServerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Directory served for plain HTTP requests
    #[arg(short, long, env = "ASSET_ROOT", default_value = server::assets::DEFAULT_ASSET_ROOT)]
    assets: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Settings may come from a .env file; the real environment wins.
    let dotenv = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring .env: {}", e),
    }

    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        asset_root: args.assets,
    };
    let asset_root = config.asset_root.clone();

    let server = Server::bind(config).await?;
    info!("Server started on http://{}", server.local_addr()?);
    info!("Serving static files from {}", asset_root.display());

    server
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
        })
        .await?;

    Ok(())
}
