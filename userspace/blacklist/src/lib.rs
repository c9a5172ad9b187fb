//! Control plane for an XDP source-address blacklist.
//!
//! The XDP program (see `ebpf/`) drops every packet whose IPv4 source is a key of the
//! `blacklist` map and bumps that key's drop counter. This crate owns the map from
//! userspace: it bans and unbans addresses, reads the counters, enumerates the map and
//! pins it under the bpf filesystem so it outlives the process.
//!
//! # Example
//! ```no_run
//! # use blacklist::{Blacklist, Config};
//! let mut blacklist = Blacklist::load(&Config::default()).unwrap();
//! blacklist.set("192.168.0.10".parse().unwrap()).unwrap();
//! blacklist.pin().unwrap();
//! for (ip, dropped) in blacklist.list().unwrap() {
//!     println!("{ip}: {dropped} dropped");
//! }
//! ```
mod blacklist;
mod config;
mod error;
mod loader;
mod map;
pub mod packet;
mod program;
mod service;
mod store;
mod sys;

pub use crate::blacklist::{Blacklist, Entries, State, TestRun};
pub use blacklist_common::{
    BlacklistKey, DropCount, XdpAction, BLACKLIST_MAP, BLACKLIST_MAX_ENTRIES, FIREWALL_PROG,
};
pub use config::Config;
pub use error::{Error, Handle};
pub use loader::{load, load_bytes, Loaded};
pub use map::{BlacklistMap, MapDef, MapHandle, TypedMap};
pub use program::{ProgramHandle, TestRunOutput};
pub use service::{BannedList, BlacklistService, Operation, ServiceError, StatusCode};
pub use store::BpfStore;
pub use sys::{MapInfo, MapType, UpdateMode};

pub type Result<T> = std::result::Result<T, Error>;

/// Default mount point of the bpf filesystem.
pub const BPF_FS_PATH: &str = "/sys/fs/bpf";
