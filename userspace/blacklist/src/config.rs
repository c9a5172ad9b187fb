use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use blacklist_common::{BLACKLIST_MAP, FIREWALL_PROG};
use serde::{Deserialize, Serialize};

use crate::{Result, BPF_FS_PATH};

const DEFAULT_OBJECT: &str = "ebpf/target/bpfel-unknown-none/release/blacklist-ebpf";

/// Where to find the compiled XDP object and where to pin its map.
///
/// Missing fields in a config file take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compiled XDP object.
    pub object: PathBuf,
    /// Mount point of the bpf filesystem.
    pub bpffs: PathBuf,
    /// Map holding banned sources, also the name of its pin.
    pub map_name: String,
    /// XDP programs to load from `object`.
    pub programs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            object: PathBuf::from(DEFAULT_OBJECT),
            bpffs: PathBuf::from(BPF_FS_PATH),
            map_name: BLACKLIST_MAP.to_string(),
            programs: vec![FIREWALL_PROG.to_string()],
        }
    }
}

impl Config {
    /// Reads a JSON config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn with_object(self, object: impl Into<PathBuf>) -> Self {
        Self {
            object: object.into(),
            ..self
        }
    }

    pub fn with_bpffs(self, bpffs: impl Into<PathBuf>) -> Self {
        Self {
            bpffs: bpffs.into(),
            ..self
        }
    }

    /// `<bpffs>/<map_name>`
    pub fn pin_path(&self) -> PathBuf {
        self.bpffs.join(&self.map_name)
    }
}
