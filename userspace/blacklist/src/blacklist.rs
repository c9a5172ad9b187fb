mod test;

use std::{
    collections::{BTreeMap, HashMap},
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};

use blacklist_common::{BlacklistKey, DropCount, XdpAction};
use num_traits::FromPrimitive;

use crate::{
    loader::{self, Loaded},
    map::{BlacklistMap, MapHandle, TypedMap},
    program::ProgramHandle,
    store::BpfStore,
    sys::{self, UpdateMode},
    Config, Error, Result,
};

/// The banned sources of the XDP firewall.
///
/// Owns the `blacklist` map and the programs consulting it. Construct it once and hand
/// out references, every method is a single blocking kernel call (or a sequence of them
/// for [`list`](Self::list)) with no locking of its own: each call is atomic in the
/// kernel, a sequence of calls isn't.
///
/// Dropping it, or calling [`close`](Self::close), releases the descriptors but leaves a
/// pin in place; a pinned map keeps working and can be reopened with
/// [`from_pin`](Blacklist::from_pin).
pub struct Blacklist<S = BlacklistMap> {
    store: S,
    programs: HashMap<String, ProgramHandle>,
    pin_path: PathBuf,
    pinned: bool,
}

/// Lifecycle of a [`Blacklist`]. Closing consumes it, so there is no closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Loaded,
    Pinned,
}

/// Outcome of running a program against a synthetic frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    pub action: XdpAction,
    pub duration: Duration,
    pub data: Vec<u8>,
}

impl Blacklist {
    /// Loads the XDP object described by `config` and takes its map and programs.
    ///
    /// Fails if the object can't be read or lacks the configured map or programs.
    ///
    /// # Example
    /// ```no_run
    /// # use blacklist::{Blacklist, Config};
    /// let blacklist = Blacklist::load(&Config::default().with_object("firewall.o")).unwrap();
    /// ```
    pub fn load(config: &Config) -> Result<Self> {
        let Loaded { map, programs } = loader::load(config)?;
        Self::with_programs(map, programs, config)
    }

    /// Reopens the map pinned at [`Config::pin_path`], e.g. by another process.
    ///
    /// No program comes with it, [`test_run`](Self::test_run) will fail.
    pub fn from_pin(config: &Config) -> Result<Self> {
        let handle = MapHandle::from_pin(config.pin_path())?;
        let mut blacklist = Self::with_map(handle, config)?;
        blacklist.pinned = true;
        Ok(blacklist)
    }

    /// Wraps an existing map, checking it has blacklist-sized keys and values.
    pub fn with_map(handle: MapHandle, config: &Config) -> Result<Self> {
        Self::with_programs(handle, HashMap::new(), config)
    }

    fn with_programs(
        handle: MapHandle,
        programs: HashMap<String, ProgramHandle>,
        config: &Config,
    ) -> Result<Self> {
        let mut blacklist = Self::with_store(TypedMap::new(handle)?, config.pin_path());
        blacklist.programs = programs;
        Ok(blacklist)
    }
}

impl<S> Blacklist<S>
where
    S: BpfStore<K = BlacklistKey, V = DropCount>,
{
    /// Blacklist over any store, pinned at `pin_path` on [`pin`](Self::pin).
    pub fn with_store(store: S, pin_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            programs: HashMap::new(),
            pin_path: pin_path.into(),
            pinned: false,
        }
    }

    /// Bans `ip` with a drop counter of 0.
    ///
    /// Banning an already banned address keeps it banned but **resets its counter to 0**.
    /// Callers that want to keep the counter should check with [`get`](Self::get) first,
    /// which isn't atomic with the update.
    pub fn set(&self, ip: Ipv4Addr) -> Result<()> {
        self.store
            .insert(&ip.into(), &0, UpdateMode::CreateOrUpdate)?;
        tracing::debug!(%ip, "Banned");
        Ok(())
    }

    /// Packets dropped for `ip`, [`Error::NotFound`] if it isn't banned.
    pub fn get(&self, ip: Ipv4Addr) -> Result<DropCount> {
        self.store.get(&ip.into())
    }

    /// Unbans `ip`, [`Error::NotFound`] if it isn't banned.
    pub fn delete(&self, ip: Ipv4Addr) -> Result<()> {
        self.store.remove(&ip.into())?;
        tracing::debug!(%ip, "Unbanned");
        Ok(())
    }

    /// Every banned address with its counter.
    ///
    /// This is a best-effort snapshot built from one kernel call per key, see
    /// [`entries`](Self::entries).
    pub fn list(&self) -> Result<BTreeMap<Ipv4Addr, DropCount>> {
        self.entries().collect()
    }

    /// Walks the map from its first key in kernel order.
    ///
    /// The walk isn't atomic. Counters move while it runs, entries removed between
    /// fetching their key and their value are skipped, and if the last visited key
    /// disappears the kernel starts over from the first key, so an address may come
    /// out twice. Call again to restart from scratch.
    pub fn entries(&self) -> Entries<'_, S> {
        Entries {
            store: &self.store,
            prev: None,
            done: false,
        }
    }

    /// Pins the map at [`pin_path`](Self::pin_path), it then survives this process.
    ///
    /// Fails if something is already pinned there.
    pub fn pin(&mut self) -> Result<()> {
        self.store.pin(&self.pin_path)?;
        self.pinned = true;
        tracing::info!(path = %self.pin_path.display(), "Pinned blacklist");
        Ok(())
    }

    /// Removes the pin at [`pin_path`](Self::pin_path), whoever created it.
    ///
    /// Fails if nothing is pinned there.
    pub fn unpin(&mut self) -> Result<()> {
        sys::obj_unpin(&self.pin_path)?;
        self.pinned = false;
        tracing::info!(path = %self.pin_path.display(), "Unpinned blacklist");
        Ok(())
    }

    pub fn state(&self) -> State {
        if self.pinned {
            State::Pinned
        } else {
            State::Loaded
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub fn pin_path(&self) -> &Path {
        &self.pin_path
    }

    pub fn program(&self, name: &str) -> Result<&ProgramHandle> {
        self.programs
            .get(name)
            .ok_or_else(|| Error::ProgramNotFound(name.to_string()))
    }

    /// Runs `program` `repeat` times against `packet` inside the kernel.
    ///
    /// Drops are counted like live traffic, a banned source gets its counter bumped once
    /// per run.
    pub fn test_run(&self, program: &str, packet: &[u8], repeat: u32) -> Result<TestRun> {
        let output = self.program(program)?.test_run(packet, repeat)?;
        let action =
            XdpAction::from_u32(output.retval).ok_or(Error::UnknownAction(output.retval))?;
        Ok(TestRun {
            action,
            duration: output.duration,
            data: output.data,
        })
    }

    /// Releases the map and programs. A pin, if any, stays.
    pub fn close(self) {
        tracing::debug!(state = ?self.state(), "Closing blacklist");
    }
}

/// Iterator returned by [`Blacklist::entries`].
pub struct Entries<'a, S> {
    store: &'a S,
    prev: Option<BlacklistKey>,
    done: bool,
}

impl<'a, S> Iterator for Entries<'a, S>
where
    S: BpfStore<K = BlacklistKey, V = DropCount>,
{
    type Item = Result<(Ipv4Addr, DropCount)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let key = match self.store.next_key(self.prev.as_ref()) {
                Ok(Some(key)) => key,
                Ok(None) => break,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.prev = Some(key);
            match self.store.get(&key) {
                Ok(count) => return Some(Ok((key.into(), count))),
                Err(Error::NotFound) => {
                    tracing::debug!(ip = %Ipv4Addr::from(key), "Entry gone before lookup");
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.done = true;
        None
    }
}
