//! Raw `bpf(2)` commands.
//!
//! Each record below must stay in sync with the anonymous struct of `union bpf_attr`
//! (`include/uapi/linux/bpf.h`) used by its command. Every field is fixed-width, padding
//! is spelled out and record sizes are asserted at compile time. Pointers only become
//! integers inside this module.


use std::{
    ffi::CString,
    fs, io,
    mem::{self, MaybeUninit},
    os::{
        fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
        unix::ffi::OsStrExt,
    },
    path::Path,
    time::Duration,
};

use aya::Pod;

use crate::{Error, Handle, Result};

// enum bpf_cmd
const BPF_MAP_CREATE: libc::c_int = 0;
const BPF_MAP_LOOKUP_ELEM: libc::c_int = 1;
const BPF_MAP_UPDATE_ELEM: libc::c_int = 2;
const BPF_MAP_DELETE_ELEM: libc::c_int = 3;
const BPF_MAP_GET_NEXT_KEY: libc::c_int = 4;
const BPF_OBJ_PIN: libc::c_int = 6;
const BPF_OBJ_GET: libc::c_int = 7;
const BPF_PROG_TEST_RUN: libc::c_int = 10;
const BPF_OBJ_GET_INFO_BY_FD: libc::c_int = 15;

// XDP_PACKET_HEADROOM, a program may grow the frame by this much.
const TEST_RUN_HEADROOM: usize = 256;

/// Map types, values from `enum bpf_map_type`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    Hash = 1,
    Array = 2,
    PercpuHash = 5,
    LruHash = 9,
    LpmTrie = 11,
    ArrayOfMaps = 12,
    HashOfMaps = 13,
}

impl MapType {
    fn has_inner_map(self) -> bool {
        matches!(self, MapType::ArrayOfMaps | MapType::HashOfMaps)
    }
}

/// Flags of `BPF_MAP_UPDATE_ELEM`.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// `BPF_ANY`
    CreateOrUpdate = 0,
    /// `BPF_NOEXIST`
    CreateOnly = 1,
    /// `BPF_EXIST`
    UpdateOnly = 2,
}

/// `BPF_MAP_CREATE`
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct MapCreateAttr {
    pub(crate) map_type: u32,
    pub(crate) key_size: u32,
    pub(crate) value_size: u32,
    pub(crate) max_entries: u32,
    pub(crate) map_flags: u32,
    pub(crate) inner_map_fd: u32,
}

/// `BPF_MAP_*_ELEM` and `BPF_MAP_GET_NEXT_KEY`
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct MapElemAttr {
    pub(crate) map_fd: u32,
    pub(crate) _pad0: [u8; 4],
    pub(crate) key: u64,
    /// union: value or next_key
    pub(crate) value: u64,
    pub(crate) flags: u64,
}

/// `BPF_OBJ_PIN` and `BPF_OBJ_GET`
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct ObjAttr {
    /// Null terminated path
    pub(crate) pathname: u64,
    pub(crate) bpf_fd: u32,
    pub(crate) _pad0: [u8; 4],
}

/// `BPF_PROG_TEST_RUN`
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct TestRunAttr {
    pub(crate) prog_fd: u32,
    /// out
    pub(crate) retval: u32,
    pub(crate) data_size_in: u32,
    /// in: size of `data_out`, out: bytes written
    pub(crate) data_size_out: u32,
    pub(crate) data_in: u64,
    pub(crate) data_out: u64,
    pub(crate) repeat: u32,
    /// out, average run time in ns
    pub(crate) duration: u32,
}

/// `BPF_OBJ_GET_INFO_BY_FD`
#[repr(C)]
#[derive(Debug, Default)]
pub(crate) struct InfoAttr {
    pub(crate) bpf_fd: u32,
    pub(crate) info_len: u32,
    pub(crate) info: u64,
}

/// Leading fields of `struct bpf_map_info`, the kernel fills at most `info_len` bytes.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MapInfo {
    pub map_type: u32,
    pub id: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub map_flags: u32,
    pub name: [u8; 16],
}

impl MapInfo {
    /// Map name as stored by the kernel, truncated to 15 bytes.
    pub fn name(&self) -> String {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }
}

const _: () = assert!(mem::size_of::<MapCreateAttr>() == 24);
const _: () = assert!(mem::size_of::<MapElemAttr>() == 32);
const _: () = assert!(mem::size_of::<ObjAttr>() == 16);
const _: () = assert!(mem::size_of::<TestRunAttr>() == 40);
const _: () = assert!(mem::size_of::<InfoAttr>() == 16);
const _: () = assert!(mem::size_of::<MapInfo>() == 40);

fn bpf<T>(cmd: libc::c_int, attr: &mut T) -> io::Result<libc::c_long> {
    // SAFETY: `attr` is one of the records above, laid out as the kernel expects for
    // `cmd`, and outlives the call. The kernel reads at most size_of::<T>() bytes.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_bpf,
            cmd,
            attr as *mut T,
            mem::size_of::<T>() as libc::c_uint,
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn ptr_of<T>(value: &T) -> u64 {
    value as *const T as u64
}

fn fd_of(fd: BorrowedFd<'_>) -> u32 {
    fd.as_raw_fd() as u32
}

fn failed(op: &'static str, handle: Handle) -> impl FnOnce(io::Error) -> Error {
    move |source| Error::Syscall { op, handle, source }
}

fn is_enoent(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOENT)
}

// SAFETY: callers must only pass a descriptor the kernel just handed out.
unsafe fn owned(fd: libc::c_long) -> OwnedFd {
    OwnedFd::from_raw_fd(fd as RawFd)
}

fn c_path(op: &'static str, path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|e| Error::Syscall {
        op,
        handle: Handle::Path(path.to_path_buf()),
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })
}

/// Creates a map. `inner_map_fd` must be 0 unless `map_type` stores maps.
pub(crate) fn create_map(
    map_type: MapType,
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    map_flags: u32,
    inner_map_fd: u32,
) -> Result<OwnedFd> {
    const OP: &str = "map_create";
    if inner_map_fd != 0 && !map_type.has_inner_map() {
        return Err(Error::Syscall {
            op: OP,
            handle: Handle::New,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{map_type:?} maps take no inner map"),
            ),
        });
    }
    let mut attr = MapCreateAttr {
        map_type: map_type as u32,
        key_size,
        value_size,
        max_entries,
        map_flags,
        inner_map_fd,
    };
    let fd = bpf(BPF_MAP_CREATE, &mut attr).map_err(failed(OP, Handle::New))?;
    // SAFETY: fresh descriptor from BPF_MAP_CREATE
    Ok(unsafe { owned(fd) })
}

pub(crate) fn update_elem<K: Pod, V: Pod>(
    fd: BorrowedFd<'_>,
    key: &K,
    value: &V,
    mode: UpdateMode,
) -> Result<()> {
    let mut attr = MapElemAttr {
        map_fd: fd_of(fd),
        key: ptr_of(key),
        value: ptr_of(value),
        flags: mode as u64,
        ..Default::default()
    };
    bpf(BPF_MAP_UPDATE_ELEM, &mut attr)
        .map(drop)
        .map_err(failed("map_update_elem", Handle::Fd(fd.as_raw_fd())))
}

/// Fails with [`Error::NotFound`] if `key` is absent.
pub(crate) fn lookup_elem<K: Pod, V: Pod>(fd: BorrowedFd<'_>, key: &K) -> Result<V> {
    let mut value = MaybeUninit::<V>::zeroed();
    let mut attr = MapElemAttr {
        map_fd: fd_of(fd),
        key: ptr_of(key),
        value: value.as_mut_ptr() as u64,
        ..Default::default()
    };
    match bpf(BPF_MAP_LOOKUP_ELEM, &mut attr) {
        // SAFETY: V is Pod and was zeroed, the kernel overwrote size_of::<V>() bytes
        Ok(_) => Ok(unsafe { value.assume_init() }),
        Err(e) if is_enoent(&e) => Err(Error::NotFound),
        Err(e) => Err(failed("map_lookup_elem", Handle::Fd(fd.as_raw_fd()))(e)),
    }
}

/// Fails with [`Error::NotFound`] if `key` is absent.
pub(crate) fn delete_elem<K: Pod>(fd: BorrowedFd<'_>, key: &K) -> Result<()> {
    let mut attr = MapElemAttr {
        map_fd: fd_of(fd),
        key: ptr_of(key),
        ..Default::default()
    };
    match bpf(BPF_MAP_DELETE_ELEM, &mut attr) {
        Ok(_) => Ok(()),
        Err(e) if is_enoent(&e) => Err(Error::NotFound),
        Err(e) => Err(failed("map_delete_elem", Handle::Fd(fd.as_raw_fd()))(e)),
    }
}

/// Key following `key` in kernel order, the first key for `None`.
///
/// `Ok(None)` means the map is exhausted. The kernel restarts from the first key when
/// `key` is no longer in the map.
pub(crate) fn get_next_key<K: Pod>(fd: BorrowedFd<'_>, key: Option<&K>) -> Result<Option<K>> {
    let mut next = MaybeUninit::<K>::zeroed();
    let mut attr = MapElemAttr {
        map_fd: fd_of(fd),
        key: key.map(ptr_of).unwrap_or(0),
        value: next.as_mut_ptr() as u64,
        ..Default::default()
    };
    match bpf(BPF_MAP_GET_NEXT_KEY, &mut attr) {
        // SAFETY: K is Pod and was zeroed, the kernel overwrote size_of::<K>() bytes
        Ok(_) => Ok(Some(unsafe { next.assume_init() })),
        Err(e) if is_enoent(&e) => Ok(None),
        Err(e) => Err(failed("map_get_next_key", Handle::Fd(fd.as_raw_fd()))(e)),
    }
}

/// Pins the object behind `fd` at `path`, which must live on a bpf filesystem.
pub(crate) fn obj_pin(fd: BorrowedFd<'_>, path: &Path) -> Result<()> {
    const OP: &str = "obj_pin";
    let pathname = c_path(OP, path)?;
    let mut attr = ObjAttr {
        pathname: pathname.as_ptr() as u64,
        bpf_fd: fd_of(fd),
        ..Default::default()
    };
    bpf(BPF_OBJ_PIN, &mut attr)
        .map(drop)
        .map_err(failed(OP, Handle::Path(path.to_path_buf())))
}

/// Opens a new descriptor to the object pinned at `path`.
pub(crate) fn obj_get(path: &Path) -> Result<OwnedFd> {
    const OP: &str = "obj_get";
    let pathname = c_path(OP, path)?;
    let mut attr = ObjAttr {
        pathname: pathname.as_ptr() as u64,
        ..Default::default()
    };
    let fd = bpf(BPF_OBJ_GET, &mut attr).map_err(failed(OP, Handle::Path(path.to_path_buf())))?;
    // SAFETY: fresh descriptor from BPF_OBJ_GET
    Ok(unsafe { owned(fd) })
}

/// Removes a pin. Open descriptors to the object stay valid.
pub(crate) fn obj_unpin(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(failed("obj_unpin", Handle::Path(path.to_path_buf())))
}

/// Output of `BPF_PROG_TEST_RUN`.
pub(crate) struct TestRunRaw {
    pub(crate) retval: u32,
    pub(crate) duration: Duration,
    pub(crate) data: Vec<u8>,
}

/// Runs the program `repeat` times against `data_in` without a live interface.
pub(crate) fn prog_test_run(fd: BorrowedFd<'_>, data_in: &[u8], repeat: u32) -> Result<TestRunRaw> {
    let mut data_out = vec![0u8; data_in.len() + TEST_RUN_HEADROOM];
    let mut attr = TestRunAttr {
        prog_fd: fd_of(fd),
        data_size_in: data_in.len() as u32,
        data_size_out: data_out.len() as u32,
        data_in: data_in.as_ptr() as u64,
        data_out: data_out.as_mut_ptr() as u64,
        repeat,
        ..Default::default()
    };
    bpf(BPF_PROG_TEST_RUN, &mut attr).map_err(failed(
        "prog_test_run",
        Handle::Fd(fd.as_raw_fd()),
    ))?;
    data_out.truncate(attr.data_size_out as usize);
    Ok(TestRunRaw {
        retval: attr.retval,
        duration: Duration::from_nanos(attr.duration.into()),
        data: data_out,
    })
}

pub(crate) fn map_info(fd: BorrowedFd<'_>) -> Result<MapInfo> {
    let mut info = MapInfo::default();
    let mut attr = InfoAttr {
        bpf_fd: fd_of(fd),
        info_len: mem::size_of::<MapInfo>() as u32,
        info: &mut info as *mut MapInfo as u64,
    };
    bpf(BPF_OBJ_GET_INFO_BY_FD, &mut attr).map_err(failed(
        "obj_get_info_by_fd",
        Handle::Fd(fd.as_raw_fd()),
    ))?;
    Ok(info)
}
