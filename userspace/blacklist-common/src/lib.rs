#![cfg_attr(not(feature = "user"), no_std)]
mod action;
mod key;

pub use action::XdpAction;
pub use key::{BlacklistKey, DropCount};

// Note: aya-bpf can't take a const as map name yet, ebpf/src/main.rs repeats these literals.
/// Name of the hash map holding banned sources.
pub const BLACKLIST_MAP: &str = "blacklist";
/// Name of the XDP entry point consulting [`BLACKLIST_MAP`].
pub const FIREWALL_PROG: &str = "xdp_prog_firewall";

#[cfg(feature = "maxentries1024")]
pub const BLACKLIST_MAX_ENTRIES: u32 = 1024;
#[cfg(all(feature = "maxentries256", not(feature = "maxentries1024")))]
pub const BLACKLIST_MAX_ENTRIES: u32 = 256;
#[cfg(all(
    feature = "maxentries64",
    not(any(feature = "maxentries1024", feature = "maxentries256"))
))]
pub const BLACKLIST_MAX_ENTRIES: u32 = 64;
