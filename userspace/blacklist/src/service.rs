
use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use blacklist_common::{BlacklistKey, DropCount};
use serde::Serialize;
use thiserror::Error;

use crate::{map::BlacklistMap, store::BpfStore, Blacklist, Error};

/// Ban, unban and list requests from operators, on top of a single [`Blacklist`].
///
/// Addresses come in as text and are validated before anything reaches the kernel.
pub struct BlacklistService<S = BlacklistMap> {
    blacklist: Blacklist<S>,
}

/// Request that failed, see [`ServiceError::OperationFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ban,
    Unban,
    ListBanned,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Ban => "ban",
            Operation::Unban => "unban",
            Operation::ListBanned => "list banned",
        };
        f.write_str(name)
    }
}

/// Client-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    Aborted,
    Internal,
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Not an IPv4 address.
    #[error("invalid ip address `{0}`")]
    InvalidAddress(String),
    /// Unban of an address that isn't banned.
    #[error("{0} is not banned")]
    NotFound(Ipv4Addr),
    #[error("{op} failed: {source}")]
    OperationFailed {
        op: Operation,
        #[source]
        source: Error,
    },
}

impl ServiceError {
    pub fn code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidAddress(_) => StatusCode::InvalidArgument,
            ServiceError::NotFound(_) => StatusCode::NotFound,
            ServiceError::OperationFailed {
                op: Operation::ListBanned,
                ..
            } => StatusCode::Internal,
            ServiceError::OperationFailed { .. } => StatusCode::Aborted,
        }
    }
}

/// Banned addresses with their drop counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BannedList {
    pub ip: BTreeMap<Ipv4Addr, DropCount>,
}

impl BannedList {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn parse(ip: &str) -> Result<Ipv4Addr, ServiceError> {
    ip.trim()
        .parse()
        .map_err(|_| ServiceError::InvalidAddress(ip.to_string()))
}

impl<S> BlacklistService<S>
where
    S: BpfStore<K = BlacklistKey, V = DropCount>,
{
    pub fn new(blacklist: Blacklist<S>) -> Self {
        Self { blacklist }
    }

    pub fn ban(&self, ip: &str) -> Result<(), ServiceError> {
        let ip = parse(ip)?;
        self.blacklist
            .set(ip)
            .map_err(|source| ServiceError::OperationFailed {
                op: Operation::Ban,
                source,
            })?;
        tracing::info!(%ip, "Banned address");
        Ok(())
    }

    pub fn unban(&self, ip: &str) -> Result<(), ServiceError> {
        let ip = parse(ip)?;
        match self.blacklist.delete(ip) {
            Ok(()) => {
                tracing::info!(%ip, "Unbanned address");
                Ok(())
            }
            Err(Error::NotFound) => Err(ServiceError::NotFound(ip)),
            Err(source) => Err(ServiceError::OperationFailed {
                op: Operation::Unban,
                source,
            }),
        }
    }

    pub fn list_banned(&self) -> Result<BannedList, ServiceError> {
        let ip = self
            .blacklist
            .list()
            .map_err(|source| ServiceError::OperationFailed {
                op: Operation::ListBanned,
                source,
            })?;
        Ok(BannedList { ip })
    }

    pub fn blacklist(&self) -> &Blacklist<S> {
        &self.blacklist
    }

    pub fn into_inner(self) -> Blacklist<S> {
        self.blacklist
    }
}
