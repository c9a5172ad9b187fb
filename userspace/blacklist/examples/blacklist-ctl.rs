// Operates on the map pinned by blacklistd.
use blacklist::{Blacklist, BlacklistService, Config};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
pub struct Opt {
    #[clap(long, default_value = "/sys/fs/bpf")]
    bpffs: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ban an ip
    #[clap(alias = "b")]
    Ban { ip: String },
    /// Unban an ip
    #[clap(alias = "u")]
    Unban { ip: String },
    /// List blacklist entries
    #[clap(alias = "l")]
    List {
        #[clap(long)]
        json: bool,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();
    tracing_subscriber::fmt::init();

    let config = Config::default().with_bpffs(opt.bpffs);
    let service = BlacklistService::new(Blacklist::from_pin(&config)?);

    match opt.command {
        Command::Ban { ip } => service.ban(&ip)?,
        Command::Unban { ip } => service.unban(&ip)?,
        Command::List { json } => {
            let banned = service.list_banned()?;
            if json {
                println!("{}", banned.to_json()?);
            } else {
                println!("===== Blacklist =====");
                for (ip, dropped) in &banned.ip {
                    println!("\t- {ip}: {dropped} dropped");
                }
            }
        }
    }

    Ok(())
}
