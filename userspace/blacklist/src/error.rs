use std::{fmt, io, os::fd::RawFd, path::PathBuf};

use aya::{programs::ProgramError, BpfError};
use thiserror::Error;

/// Blacklist errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The kernel rejected a bpf command.
    #[error("bpf {op} failed on {handle}: {source}")]
    Syscall {
        op: &'static str,
        handle: Handle,
        #[source]
        source: io::Error,
    },
    /// Key isn't stored in the map.
    #[error("Key not found in map")]
    NotFound,
    /// Map is missing from the loaded object.
    #[error("Map `{0}` not found in object")]
    MapNotFound(String),
    /// Program is missing from the loaded object.
    #[error("Program `{0}` not found in object")]
    ProgramNotFound(String),
    /// Map exists but isn't shaped like the blacklist.
    #[error("Map `{name}` has key size {key_size} and value size {value_size}, expected {expected_key} and {expected_value}")]
    MapLayout {
        name: String,
        key_size: u32,
        value_size: u32,
        expected_key: u32,
        expected_value: u32,
    },
    /// Map in the object isn't a hash map.
    #[error("Map `{0}` is not a hash map")]
    MapType(String),
    /// Program returned a code outside of `xdp_action`.
    #[error("Unknown xdp action {0}")]
    UnknownAction(u32),
    // Aya's error seems clear enough to just let them bubble up
    /// Error while loading the eBPF object.
    #[error(transparent)]
    BpfError(#[from] BpfError),
    /// Error while loading eBPF program.
    #[error(transparent)]
    ProgramError(#[from] ProgramError),
    /// Error while reading the configuration.
    #[error(transparent)]
    ConfigError(#[from] serde_json::Error),
    /// IO error
    #[error(transparent)]
    IoError(#[from] io::Error),
}

impl Error {
    /// Whether this error aborts construction, a missing or malformed object.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Error::MapNotFound(_)
                | Error::ProgramNotFound(_)
                | Error::MapLayout { .. }
                | Error::MapType(_)
                | Error::BpfError(_)
                | Error::ProgramError(_)
        )
    }
}

/// Kernel object a failed command was issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handle {
    Fd(RawFd),
    Path(PathBuf),
    /// Object not created yet.
    New,
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Fd(fd) => write!(f, "fd {fd}"),
            Handle::Path(path) => write!(f, "{}", path.display()),
            Handle::New => write!(f, "new object"),
        }
    }
}
