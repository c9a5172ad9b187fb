// For now we will use this for CI testing against a real kernel
// (See blacklistd and blacklist-ctl to actually manual test)
use std::net::Ipv4Addr;

use anyhow::ensure;
use blacklist::{packet::TcpFrame, Blacklist, Config, XdpAction, FIREWALL_PROG};
use clap::Parser;

#[derive(Debug, Parser)]
pub struct Opt {
    #[clap(short, long, default_value = "/bin/blacklist-ebpf")]
    object: String,
    #[clap(long, default_value = "/sys/fs/bpf")]
    bpffs: String,
}

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 0, last)
}

fn send(blacklist: &Blacklist, source: Ipv4Addr) -> Result<XdpAction, anyhow::Error> {
    let frame = TcpFrame::from_source(source).build();
    Ok(blacklist.test_run(FIREWALL_PROG, &frame, 1)?.action)
}

fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();
    tracing_subscriber::fmt::init();

    let config = Config::default()
        .with_object(opt.object)
        .with_bpffs(opt.bpffs);

    // Banned source is dropped and counted
    let blacklist = Blacklist::load(&config)?;
    blacklist.set(ip(10))?;
    ensure!(send(&blacklist, ip(10))? == XdpAction::Drop, "banned source passed");
    ensure!(blacklist.get(ip(10))? == 1, "drop wasn't counted");
    blacklist.close();

    // Nothing banned, nothing dropped
    let blacklist = Blacklist::load(&config)?;
    ensure!(send(&blacklist, ip(11))? == XdpAction::Pass, "clean source dropped");
    blacklist.close();

    // Counters are per source
    let mut blacklist = Blacklist::load(&config)?;
    for last in [10, 20, 30] {
        blacklist.set(ip(last))?;
    }
    for last in [10, 20, 10, 20, 30] {
        send(&blacklist, ip(last))?;
    }
    let counts = blacklist.list()?;
    tracing::info!(?counts, "Drop counters");
    ensure!(counts.len() == 3, "unexpected entries {counts:?}");
    ensure!(counts[&ip(10)] == 2 && counts[&ip(20)] == 2 && counts[&ip(30)] == 1);

    // Pinned map reopened from its path shares the entries
    blacklist.pin()?;
    let reopened = Blacklist::from_pin(&config)?;
    reopened.delete(ip(30))?;
    ensure!(blacklist.list()?.len() == 2, "reopened map is a different map");
    blacklist.unpin()?;
    reopened.close();
    blacklist.close();

    tracing::info!("Program executed");
    Ok(())
}
