mod build_ebpf;
mod run_on;

use std::process::exit;

use clap::Parser;

#[derive(Debug, Parser)]
pub struct Options {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    BuildEbpf(BuildEbpf),
    RunOn(RunOn),
}

#[derive(Debug, Parser)]
pub struct BuildEbpf {
    /// bpfel-unknown-none or bpfeb-unknown-none
    #[arg(long, default_value = "bpfel-unknown-none")]
    target: String,
    #[arg(long)]
    release: bool,
    /// Map capacity feature, e.g. maxentries1024
    #[arg(long)]
    features: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct RunOn {
    version: String,
    #[arg(long)]
    release: bool,
}

fn main() {
    let opts = Options::parse();

    use Command::*;
    let ret = match opts.command {
        BuildEbpf(params) => build_ebpf::build_ebpf(params),
        RunOn(params) => run_on::run_on(params),
    };

    if let Err(e) = ret {
        eprintln!("{e:#}");
        exit(1);
    }
}
