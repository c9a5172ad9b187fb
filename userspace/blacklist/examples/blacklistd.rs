use anyhow::Context;
use blacklist::{Blacklist, BlacklistService, Config};
use clap::Parser;
use tokio::signal;

#[derive(Debug, Parser)]
pub struct Opt {
    /// JSON config, defaults are used when missing
    #[clap(short, long)]
    config: Option<String>,
    /// Addresses banned at startup
    #[clap(short, long)]
    ban: Vec<String>,
    /// Leave the map pinned on exit
    #[clap(long)]
    keep_pin: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();
    tracing_subscriber::fmt::init();

    let config = match &opt.config {
        Some(path) => Config::from_file(path).with_context(|| format!("reading {path}"))?,
        None => Config::default(),
    };

    let mut blacklist = Blacklist::load(&config)?;
    blacklist
        .pin()
        .with_context(|| format!("pinning at {}", config.pin_path().display()))?;

    let service = BlacklistService::new(blacklist);
    for ip in &opt.ban {
        service.ban(ip)?;
    }

    tracing::info!(pin = %config.pin_path().display(), "Blacklist ready");
    signal::ctrl_c().await?;
    tracing::info!("Exiting...");

    let mut blacklist = service.into_inner();
    if !opt.keep_pin {
        blacklist.unpin()?;
    }
    blacklist.close();

    Ok(())
}
