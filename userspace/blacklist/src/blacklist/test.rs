#![cfg(test)]

use std::{collections::BTreeMap, net::Ipv4Addr};

use tempfile::TempDir;
use test_case::test_case;

use crate::{store::test_store::TestStore, Blacklist, Error, State, FIREWALL_PROG};

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 0, last)
}

fn blacklist() -> (Blacklist<TestStore>, TempDir) {
    let bpffs = tempfile::tempdir().unwrap();
    let blacklist = Blacklist::with_store(TestStore::new(), bpffs.path().join("blacklist"));
    (blacklist, bpffs)
}

#[test_case(Ipv4Addr::new(192, 168, 0, 10))]
#[test_case(Ipv4Addr::new(0, 0, 0, 0))]
#[test_case(Ipv4Addr::new(255, 255, 255, 255))]
#[test_case(Ipv4Addr::new(10, 1, 2, 3))]
fn set_then_get_is_zero(addr: Ipv4Addr) {
    let (blacklist, _bpffs) = blacklist();
    blacklist.set(addr).unwrap();
    assert_eq!(blacklist.get(addr).unwrap(), 0);
}

#[test]
fn set_resets_counter() {
    let (blacklist, _bpffs) = blacklist();
    blacklist.set(ip(10)).unwrap();
    assert!(blacklist.store.record_drop(ip(10)));
    assert!(blacklist.store.record_drop(ip(10)));
    assert_eq!(blacklist.get(ip(10)).unwrap(), 2);

    blacklist.set(ip(10)).unwrap();
    assert_eq!(blacklist.get(ip(10)).unwrap(), 0);
    assert_eq!(blacklist.store.len(), 1);
}

#[test]
fn get_unbanned_is_not_found() {
    let (blacklist, _bpffs) = blacklist();
    assert!(matches!(blacklist.get(ip(10)), Err(Error::NotFound)));
}

#[test]
fn delete_then_get_is_not_found() {
    let (blacklist, _bpffs) = blacklist();
    blacklist.set(ip(10)).unwrap();
    blacklist.delete(ip(10)).unwrap();
    assert!(matches!(blacklist.get(ip(10)), Err(Error::NotFound)));
}

#[test]
fn delete_absent_is_not_found() {
    let (blacklist, _bpffs) = blacklist();
    assert!(matches!(blacklist.delete(ip(10)), Err(Error::NotFound)));
}

#[test]
fn set_on_full_map_is_syscall_failure() {
    let bpffs = tempfile::tempdir().unwrap();
    let blacklist = Blacklist::with_store(TestStore::with_max_entries(2), bpffs.path().join("bl"));
    blacklist.set(ip(1)).unwrap();
    blacklist.set(ip(2)).unwrap();
    // Updating an existing key still works when full
    blacklist.set(ip(2)).unwrap();
    match blacklist.set(ip(3)) {
        Err(Error::Syscall { op, source, .. }) => {
            assert_eq!(op, "map_update_elem");
            assert_eq!(source.raw_os_error(), Some(libc::E2BIG));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn list_empty() {
    let (blacklist, _bpffs) = blacklist();
    assert!(blacklist.list().unwrap().is_empty());
}

#[test]
fn list_matches_sets_minus_deletes() {
    let (blacklist, _bpffs) = blacklist();
    for last in [10, 20, 30, 40] {
        blacklist.set(ip(last)).unwrap();
    }
    blacklist.delete(ip(20)).unwrap();
    blacklist.store.record_drop(ip(30));

    let expected = BTreeMap::from([(ip(10), 0), (ip(30), 1), (ip(40), 0)]);
    assert_eq!(blacklist.list().unwrap(), expected);
}

#[test]
fn entries_visit_each_key_once() {
    let (blacklist, _bpffs) = blacklist();
    let banned: Vec<_> = (1..=50).map(ip).collect();
    for addr in &banned {
        blacklist.set(*addr).unwrap();
    }

    let mut seen: Vec<_> = blacklist
        .entries()
        .map(|entry| entry.unwrap().0)
        .collect();
    assert_eq!(seen.len(), banned.len());
    seen.sort();
    seen.dedup();
    assert_eq!(seen, banned);
}

#[test]
fn entries_restart_from_scratch() {
    let (blacklist, _bpffs) = blacklist();
    blacklist.set(ip(1)).unwrap();
    blacklist.set(ip(2)).unwrap();

    let mut first = blacklist.entries();
    assert!(first.next().is_some());
    let second: Vec<_> = blacklist.entries().collect::<crate::Result<_>>().unwrap();
    assert_eq!(second.len(), 2);
}

#[test]
fn entries_fused_after_exhaustion() {
    let (blacklist, _bpffs) = blacklist();
    blacklist.set(ip(1)).unwrap();
    let mut entries = blacklist.entries();
    assert!(entries.next().is_some());
    assert!(entries.next().is_none());
    blacklist.set(ip(2)).unwrap();
    assert!(entries.next().is_none());
}

#[test]
fn list_skips_entry_removed_mid_walk() {
    let (blacklist, _bpffs) = blacklist();
    for last in [10, 20, 30] {
        blacklist.set(ip(last)).unwrap();
    }
    blacklist.store.vanish_after_next_key(ip(20));

    let expected = BTreeMap::from([(ip(10), 0), (ip(30), 0)]);
    assert_eq!(blacklist.list().unwrap(), expected);
}

#[test]
fn list_survives_first_entry_vanishing() {
    let (blacklist, _bpffs) = blacklist();
    for last in [10, 20] {
        blacklist.set(ip(last)).unwrap();
    }
    blacklist.store.vanish_after_next_key(ip(10));

    assert_eq!(blacklist.list().unwrap(), BTreeMap::from([(ip(20), 0)]));
}

#[test]
fn pin_and_unpin() {
    let (mut blacklist, _bpffs) = blacklist();
    assert_eq!(blacklist.state(), State::Loaded);

    blacklist.pin().unwrap();
    assert_eq!(blacklist.state(), State::Pinned);
    assert!(blacklist.pin_path().exists());

    // Pinned keeps every Loaded capability
    blacklist.set(ip(10)).unwrap();
    assert_eq!(blacklist.get(ip(10)).unwrap(), 0);

    blacklist.unpin().unwrap();
    assert_eq!(blacklist.state(), State::Loaded);
    assert!(!blacklist.pin_path().exists());
}

#[test]
fn pin_twice_fails() {
    let (mut blacklist, _bpffs) = blacklist();
    blacklist.pin().unwrap();
    match blacklist.pin() {
        Err(Error::Syscall { op, source, .. }) => {
            assert_eq!(op, "obj_pin");
            assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(blacklist.state(), State::Pinned);
}

#[test]
fn unpin_without_pin_fails() {
    let (mut blacklist, _bpffs) = blacklist();
    match blacklist.unpin() {
        Err(Error::Syscall { op, source, .. }) => {
            assert_eq!(op, "obj_unpin");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(blacklist.state(), State::Loaded);
}

#[test]
fn close_leaves_pin() {
    let (mut blacklist, _bpffs) = blacklist();
    blacklist.pin().unwrap();
    let path = blacklist.pin_path().to_path_buf();
    blacklist.close();
    assert!(path.exists());
}

#[test]
fn test_run_without_program() {
    let (blacklist, _bpffs) = blacklist();
    assert!(matches!(
        blacklist.test_run(FIREWALL_PROG, &[0; 64], 1),
        Err(Error::ProgramNotFound(name)) if name == FIREWALL_PROG
    ));
}
