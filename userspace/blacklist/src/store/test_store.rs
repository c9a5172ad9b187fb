use std::{
    collections::{BTreeMap, BTreeSet},
    fs::OpenOptions,
    io,
    net::Ipv4Addr,
    ops::Bound,
    path::Path,
    sync::Mutex,
};

use blacklist_common::{BlacklistKey, DropCount, BLACKLIST_MAX_ENTRIES};

use super::BpfStore;
use crate::{sys::UpdateMode, Error, Handle, Result};

/// In-memory stand-in for the kernel hash map.
///
/// Follows the kernel where it matters for the blacklist: get-next-key restarts from the
/// first key when the previous one is gone, pinning an existing path fails with `EEXIST`.
pub(crate) struct TestStore {
    entries: Mutex<BTreeMap<BlacklistKey, DropCount>>,
    // Removed right after `next_key` hands them out, like a concurrent delete.
    vanishing: Mutex<BTreeSet<BlacklistKey>>,
    max_entries: usize,
}

fn errno(op: &'static str, handle: Handle, code: i32) -> Error {
    Error::Syscall {
        op,
        handle,
        source: io::Error::from_raw_os_error(code),
    }
}

impl TestStore {
    pub(crate) fn new() -> Self {
        Self::with_max_entries(BLACKLIST_MAX_ENTRIES as usize)
    }

    pub(crate) fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Mutex::default(),
            vanishing: Mutex::default(),
            max_entries,
        }
    }

    pub(crate) fn vanish_after_next_key(&self, ip: Ipv4Addr) {
        self.vanishing.lock().unwrap().insert(ip.into());
    }

    /// What the XDP program does for a dropped packet.
    pub(crate) fn record_drop(&self, ip: Ipv4Addr) -> bool {
        match self.entries.lock().unwrap().get_mut(&ip.into()) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl BpfStore for TestStore {
    type K = BlacklistKey;
    type V = DropCount;

    fn insert(&self, key: &Self::K, value: &Self::V, mode: UpdateMode) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let exists = entries.contains_key(key);
        let code = match mode {
            UpdateMode::CreateOnly if exists => Some(libc::EEXIST),
            UpdateMode::UpdateOnly if !exists => Some(libc::ENOENT),
            _ if !exists && entries.len() >= self.max_entries => Some(libc::E2BIG),
            _ => None,
        };
        if let Some(code) = code {
            return Err(errno("map_update_elem", Handle::Fd(-1), code));
        }
        entries.insert(*key, *value);
        Ok(())
    }

    fn get(&self, key: &Self::K) -> Result<Self::V> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .ok_or(Error::NotFound)
    }

    fn remove(&self, key: &Self::K) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(key)
            .map(drop)
            .ok_or(Error::NotFound)
    }

    fn next_key(&self, key: Option<&Self::K>) -> Result<Option<Self::K>> {
        let mut entries = self.entries.lock().unwrap();
        let next = match key {
            Some(key) if entries.contains_key(key) => entries
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next()
                .map(|(k, _)| *k),
            _ => entries.keys().next().copied(),
        };
        if let Some(next) = next {
            if self.vanishing.lock().unwrap().remove(&next) {
                entries.remove(&next);
            }
        }
        Ok(next)
    }

    fn pin(&self, path: &Path) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(drop)
            .map_err(|source| Error::Syscall {
                op: "obj_pin",
                handle: Handle::Path(path.to_path_buf()),
                source,
            })
    }
}
