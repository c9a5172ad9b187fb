use std::{
    os::fd::{AsFd, BorrowedFd, OwnedFd},
    time::Duration,
};

use crate::{sys, Result};

/// Owned descriptor of a loaded, verified program.
#[derive(Debug)]
pub struct ProgramHandle {
    name: String,
    fd: OwnedFd,
}

/// What the kernel reports after a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOutput {
    pub retval: u32,
    /// Average duration of a single run.
    pub duration: Duration,
    /// Frame as left by the program.
    pub data: Vec<u8>,
}

impl ProgramHandle {
    /// Duplicates a descriptor owned by someone else, e.g. aya's `ProgramFd`.
    pub fn try_clone_from(name: impl Into<String>, fd: BorrowedFd<'_>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            fd: fd.try_clone_to_owned()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the program `repeat` times against `data` inside the kernel.
    pub fn test_run(&self, data: &[u8], repeat: u32) -> Result<TestRunOutput> {
        let raw = sys::prog_test_run(self.fd.as_fd(), data, repeat)?;
        tracing::debug!(
            program = %self.name,
            retval = raw.retval,
            duration = ?raw.duration,
            "test run"
        );
        Ok(TestRunOutput {
            retval: raw.retval,
            duration: raw.duration,
            data: raw.data,
        })
    }
}

impl AsFd for ProgramHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
