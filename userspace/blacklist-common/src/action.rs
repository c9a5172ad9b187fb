use num_derive::FromPrimitive;
use strum_macros::{Display, EnumCount};

// Same values as `xdp_action` in aya-bpf::bindings, redefined here
// so that this crate doesn't depend on aya-bpf.
const XDP_ABORTED: u32 = 0;
const XDP_DROP: u32 = 1;
const XDP_PASS: u32 = 2;
const XDP_TX: u32 = 3;
const XDP_REDIRECT: u32 = 4;

/// Verdict returned by the XDP program, either live or through a test run.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, FromPrimitive, Display, EnumCount)]
#[cfg_attr(feature = "user", derive(Debug, Hash, serde::Serialize))]
pub enum XdpAction {
    #[strum(serialize = "XDP_ABORTED")]
    Aborted = XDP_ABORTED,
    #[strum(serialize = "XDP_DROP")]
    Drop = XDP_DROP,
    #[strum(serialize = "XDP_PASS")]
    Pass = XDP_PASS,
    #[strum(serialize = "XDP_TX")]
    Tx = XDP_TX,
    #[strum(serialize = "XDP_REDIRECT")]
    Redirect = XDP_REDIRECT,
}
