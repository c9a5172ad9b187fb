//! Needs CAP_BPF (root) and a mounted bpf filesystem, the XDP scenarios also need the
//! compiled object at `$BLACKLIST_EBPF_OBJECT`. Run with `cargo test -- --ignored`.
use std::{collections::BTreeMap, net::Ipv4Addr, path::PathBuf};

use blacklist::{
    packet::TcpFrame, Blacklist, Config, Error, MapDef, MapHandle, State, XdpAction,
    FIREWALL_PROG,
};

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 0, last)
}

fn object() -> PathBuf {
    std::env::var_os("BLACKLIST_EBPF_OBJECT")
        .map(PathBuf::from)
        .expect("BLACKLIST_EBPF_OBJECT must point to the compiled XDP object")
}

fn loaded() -> Blacklist {
    Blacklist::load(&Config::default().with_object(object())).unwrap()
}

fn standalone(map_name: &str) -> (Blacklist, Config) {
    let config = Config {
        map_name: map_name.to_string(),
        ..Config::default()
    };
    let handle = MapHandle::create(&MapDef::blacklist()).unwrap();
    (Blacklist::with_map(handle, &config).unwrap(), config)
}

fn send(blacklist: &Blacklist, source: Ipv4Addr) -> XdpAction {
    let frame = TcpFrame::from_source(source).build();
    blacklist.test_run(FIREWALL_PROG, &frame, 1).unwrap().action
}

#[test]
#[ignore = "needs CAP_BPF"]
fn crud_on_created_map() {
    let (blacklist, _) = standalone("blacklist_crud");
    blacklist.set(ip(10)).unwrap();
    assert_eq!(blacklist.get(ip(10)).unwrap(), 0);
    blacklist.delete(ip(10)).unwrap();
    assert!(matches!(blacklist.get(ip(10)), Err(Error::NotFound)));
    assert!(matches!(blacklist.delete(ip(10)), Err(Error::NotFound)));
}

#[test]
#[ignore = "needs CAP_BPF"]
fn enumeration_visits_every_key_once() {
    let (blacklist, _) = standalone("blacklist_walk");
    for last in 1..=100 {
        blacklist.set(ip(last)).unwrap();
    }
    let visited: Vec<_> = blacklist.entries().map(|e| e.unwrap().0).collect();
    assert_eq!(visited.len(), 100);
    let list = blacklist.list().unwrap();
    assert_eq!(list.len(), 100);
    assert!(list.values().all(|&count| count == 0));
}

#[test]
#[ignore = "needs CAP_BPF"]
fn wrong_layout_is_rejected() {
    let def = MapDef {
        value_size: 8,
        ..MapDef::blacklist()
    };
    let handle = MapHandle::create(&def).unwrap();
    let err = Blacklist::with_map(handle, &Config::default()).err().unwrap();
    assert!(err.is_load_failure());
}

#[test]
#[ignore = "needs CAP_BPF and a bpf filesystem"]
fn pin_reopen_round_trip() {
    let (mut blacklist, config) = standalone("blacklist_pin_test");
    blacklist.set(ip(10)).unwrap();
    blacklist.pin().unwrap();
    assert_eq!(blacklist.state(), State::Pinned);
    assert!(blacklist.pin().is_err());

    let reopened = Blacklist::from_pin(&config).unwrap();
    assert_eq!(reopened.get(ip(10)).unwrap(), 0);
    reopened.set(ip(20)).unwrap();
    assert_eq!(blacklist.get(ip(20)).unwrap(), 0);

    // Closing the original keeps the pinned map alive
    blacklist.close();
    assert_eq!(reopened.list().unwrap().len(), 2);

    let mut reopened = reopened;
    reopened.unpin().unwrap();
    assert!(reopened.unpin().is_err());
    assert_eq!(reopened.state(), State::Loaded);
}

#[test]
#[ignore = "needs CAP_BPF and the compiled XDP object"]
fn missing_names_fail_to_load() {
    let config = Config {
        map_name: "whitelist".to_string(),
        ..Config::default().with_object(object())
    };
    assert!(matches!(Blacklist::load(&config), Err(Error::MapNotFound(_))));

    let config = Config {
        programs: vec!["xdp_prog_missing".to_string()],
        ..Config::default().with_object(object())
    };
    assert!(matches!(Blacklist::load(&config), Err(Error::ProgramNotFound(_))));
}

#[test]
#[ignore = "needs CAP_BPF and the compiled XDP object"]
fn banned_source_is_dropped() {
    let blacklist = loaded();
    blacklist.set(ip(10)).unwrap();
    assert_eq!(send(&blacklist, ip(10)), XdpAction::Drop);
    assert_eq!(blacklist.get(ip(10)).unwrap(), 1);
}

#[test]
#[ignore = "needs CAP_BPF and the compiled XDP object"]
fn clean_source_passes() {
    let blacklist = loaded();
    assert_eq!(send(&blacklist, ip(11)), XdpAction::Pass);

    blacklist.set(ip(100)).unwrap();
    assert_eq!(send(&blacklist, ip(10)), XdpAction::Pass);
    assert_eq!(blacklist.get(ip(100)).unwrap(), 0);
}

#[test]
#[ignore = "needs CAP_BPF and the compiled XDP object"]
fn counters_are_per_source() {
    let blacklist = loaded();
    for last in [10, 20, 30] {
        blacklist.set(ip(last)).unwrap();
    }
    for last in [10, 20, 10, 20, 30] {
        assert_eq!(send(&blacklist, ip(last)), XdpAction::Drop);
    }
    let expected = BTreeMap::from([(ip(10), 2), (ip(20), 2), (ip(30), 1)]);
    assert_eq!(blacklist.list().unwrap(), expected);
}

#[test]
#[ignore = "needs CAP_BPF and the compiled XDP object"]
fn set_resets_kernel_counter() {
    let blacklist = loaded();
    blacklist.set(ip(10)).unwrap();
    send(&blacklist, ip(10));
    assert_eq!(blacklist.get(ip(10)).unwrap(), 1);
    blacklist.set(ip(10)).unwrap();
    assert_eq!(blacklist.get(ip(10)).unwrap(), 0);
}

#[test]
#[ignore = "needs CAP_BPF and the compiled XDP object"]
fn short_frame_is_dropped() {
    let blacklist = loaded();
    let frame = TcpFrame::default().build();
    let run = blacklist.test_run(FIREWALL_PROG, &frame[..20], 1);
    // Kernels refuse frames shorter than an ethernet header, otherwise the program drops it.
    if let Ok(run) = run {
        assert_eq!(run.action, XdpAction::Drop);
    }
}
