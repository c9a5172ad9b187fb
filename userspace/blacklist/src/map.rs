use std::{
    marker::PhantomData,
    mem,
    os::fd::{AsFd, BorrowedFd, OwnedFd},
    path::Path,
};

use aya::Pod;
use blacklist_common::{BlacklistKey, DropCount, BLACKLIST_MAX_ENTRIES};

use crate::{
    sys::{self, MapInfo, MapType, UpdateMode},
    Error, Result,
};

/// Owned descriptor of a kernel map. Closed on drop, pins survive it.
#[derive(Debug)]
pub struct MapHandle {
    fd: OwnedFd,
}

/// Attributes of a map created from userspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapDef {
    pub map_type: MapType,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: u32,
}

impl MapDef {
    /// Same shape as the `blacklist` map of the XDP program.
    pub fn blacklist() -> Self {
        Self {
            map_type: MapType::Hash,
            key_size: mem::size_of::<BlacklistKey>() as u32,
            value_size: mem::size_of::<DropCount>() as u32,
            max_entries: BLACKLIST_MAX_ENTRIES,
            flags: 0,
        }
    }
}

impl MapHandle {
    /// Creates a new, empty map.
    pub fn create(def: &MapDef) -> Result<Self> {
        let fd = sys::create_map(
            def.map_type,
            def.key_size,
            def.value_size,
            def.max_entries,
            def.flags,
            0,
        )?;
        Ok(Self { fd })
    }

    /// Opens the map pinned at `path`.
    pub fn from_pin(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            fd: sys::obj_get(path.as_ref())?,
        })
    }

    /// Duplicates a descriptor owned by someone else, e.g. aya's `MapData`.
    pub fn try_clone_from(fd: BorrowedFd<'_>) -> Result<Self> {
        Ok(Self {
            fd: fd.try_clone_to_owned()?,
        })
    }

    pub fn pin(&self, path: impl AsRef<Path>) -> Result<()> {
        sys::obj_pin(self.fd.as_fd(), path.as_ref())
    }

    pub fn info(&self) -> Result<MapInfo> {
        sys::map_info(self.fd.as_fd())
    }
}

impl AsFd for MapHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Typed view over a [`MapHandle`], key and value sizes are checked on creation.
#[derive(Debug)]
pub struct TypedMap<K, V> {
    handle: MapHandle,
    _kv: PhantomData<(K, V)>,
}

pub type BlacklistMap = TypedMap<BlacklistKey, DropCount>;

impl<K: Pod, V: Pod> TypedMap<K, V> {
    pub fn new(handle: MapHandle) -> Result<Self> {
        let info = handle.info()?;
        let expected_key = mem::size_of::<K>() as u32;
        let expected_value = mem::size_of::<V>() as u32;
        if info.key_size != expected_key || info.value_size != expected_value {
            return Err(Error::MapLayout {
                name: info.name(),
                key_size: info.key_size,
                value_size: info.value_size,
                expected_key,
                expected_value,
            });
        }
        Ok(Self {
            handle,
            _kv: PhantomData,
        })
    }

    pub fn insert(&self, key: &K, value: &V, mode: UpdateMode) -> Result<()> {
        sys::update_elem(self.handle.as_fd(), key, value, mode)
    }

    pub fn get(&self, key: &K) -> Result<V> {
        sys::lookup_elem(self.handle.as_fd(), key)
    }

    pub fn remove(&self, key: &K) -> Result<()> {
        sys::delete_elem(self.handle.as_fd(), key)
    }

    pub fn next_key(&self, key: Option<&K>) -> Result<Option<K>> {
        sys::get_next_key(self.handle.as_fd(), key)
    }

    pub fn handle(&self) -> &MapHandle {
        &self.handle
    }

    pub fn into_handle(self) -> MapHandle {
        self.handle
    }
}
