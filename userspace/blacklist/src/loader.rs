use std::{collections::HashMap, io, os::fd::AsFd};

use aya::{maps::Map, programs::Xdp, Bpf};

use crate::{map::MapHandle, program::ProgramHandle, Config, Error, Result};

/// Handles taken out of a loaded object. The aya object itself is gone by then,
/// these descriptors keep the kernel side alive.
#[derive(Debug)]
pub struct Loaded {
    pub map: MapHandle,
    pub programs: HashMap<String, ProgramHandle>,
}

/// Loads the object at [`Config::object`].
pub fn load(config: &Config) -> Result<Loaded> {
    bump_memlock_rlimit();
    let mut bpf = Bpf::load_file(&config.object)?;
    take_handles(&mut bpf, config)
}

/// Loads an object already in memory.
pub fn load_bytes(data: &[u8], config: &Config) -> Result<Loaded> {
    bump_memlock_rlimit();
    let mut bpf = Bpf::load(data)?;
    take_handles(&mut bpf, config)
}

fn take_handles(bpf: &mut Bpf, config: &Config) -> Result<Loaded> {
    let map = match bpf
        .map(&config.map_name)
        .ok_or_else(|| Error::MapNotFound(config.map_name.clone()))?
    {
        Map::HashMap(data) | Map::LruHashMap(data) => MapHandle::try_clone_from(data.fd().as_fd())?,
        _ => return Err(Error::MapType(config.map_name.clone())),
    };

    let mut programs = HashMap::with_capacity(config.programs.len());
    for name in &config.programs {
        let program: &mut Xdp = bpf
            .program_mut(name)
            .ok_or_else(|| Error::ProgramNotFound(name.clone()))?
            .try_into()?;
        program.load()?;
        let handle = ProgramHandle::try_clone_from(name.as_str(), program.fd()?.as_fd())?;
        programs.insert(name.clone(), handle);
    }

    tracing::info!(
        map = %config.map_name,
        programs = ?config.programs,
        "Loaded blacklist object"
    );
    Ok(Loaded { map, programs })
}

// Kernels before 5.11 charge map memory to RLIMIT_MEMLOCK, which is tiny on most runners.
// See: https://github.com/aya-rs/aya-template/pull/51
fn bump_memlock_rlimit() {
    let rlimit = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };

    // SAFETY: rlimit is a valid, initialized struct
    if unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlimit) } != 0 {
        tracing::warn!(
            "Failed to remove limit on locked memory: {}",
            io::Error::last_os_error()
        );
    }
}
