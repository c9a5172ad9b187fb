use std::process::Command;

use anyhow::{bail, Result};

use crate::BuildEbpf;

const TOOLCHAIN: &str = "+nightly-2023-01-10";
const EBPF_DIR: &str = "ebpf";
const TARGETS: &[&str] = &["bpfel-unknown-none", "bpfeb-unknown-none"];

fn args(params: &BuildEbpf) -> Result<Vec<String>> {
    if !TARGETS.contains(&params.target.as_str()) {
        bail!("Target {} not supported", params.target);
    }
    let mut args: Vec<String> = [TOOLCHAIN, "build", "--color", "always", "-Z", "build-std=core"]
        .iter()
        .map(ToString::to_string)
        .collect();
    args.push(format!("--target={}", params.target));

    if !params.features.is_empty() {
        args.push("--no-default-features".to_string());
        for feature in &params.features {
            args.push("--features".to_string());
            args.push(feature.clone());
        }
    }

    if params.release {
        args.push("--release".to_string());
    }
    Ok(args)
}

pub fn build_ebpf(params: BuildEbpf) -> Result<()> {
    let status = Command::new("cargo")
        .current_dir(EBPF_DIR)
        .args(args(&params)?)
        .status()?;
    if !status.success() {
        bail!("couldn't build ebpf, error: {status}");
    }
    println!(
        "Object at {EBPF_DIR}/target/{}/{}/blacklist-ebpf",
        params.target,
        if params.release { "release" } else { "debug" }
    );
    Ok(())
}
