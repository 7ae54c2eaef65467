use clap::Parser;
use gridmud::{
    Registry,
    config::Config,
    db::repo::{CharacterRepo, FileCharacterRepo, MemoryCharacterRepo},
    import::load_world_file,
    net::http,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "gridmud", about = "Grid world engine server")]
struct Cli {
    /// TOML config file; without it the environment (and .env) is used
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let cfg = Arc::new(match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    });

    let world = load_world_file(&cfg.world_file)?;
    tracing::info!(file = %cfg.world_file.display(), worlds = world.worlds.len(), "world loaded");

    let repo: Arc<dyn CharacterRepo> = match &cfg.data_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "storing characters on disk");
            Arc::new(FileCharacterRepo::open(dir).await?)
        }
        None => {
            tracing::warn!("DATA_DIR is empty, characters are kept in memory only");
            Arc::new(MemoryCharacterRepo::new())
        }
    };

    let registry = Arc::new(Registry::new(cfg.clone(), world, repo)?);
    let _ticker = registry.cooldowns.spawn_ticker();

    let ws_addr: SocketAddr = cfg.ws_addr.parse()?;
    if let Err(e) = http::serve(ws_addr, registry).await {
        tracing::error!(error = %e, "server task failed");
        return Err(e.into());
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, prelude::*};

    color_eyre::install().map_err(|e| anyhow::anyhow!("{e}"))?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info,gridmud=debug"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::uptime()),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();
    Ok(())
}
