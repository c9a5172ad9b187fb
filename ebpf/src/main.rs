#![no_std]
#![no_main]
#![allow(nonstandard_style, dead_code)]

use aya_bpf::{
    bindings::xdp_action::{XDP_ABORTED, XDP_DROP, XDP_PASS},
    macros::{map, xdp},
    maps::HashMap,
    programs::XdpContext,
};
use blacklist_common::{BlacklistKey, DropCount, BLACKLIST_MAX_ENTRIES};

// Names must match BLACKLIST_MAP and FIREWALL_PROG in the common crate,
// the macros don't accept const values.

#[map(name = "blacklist")]
static mut BLACKLIST: HashMap<BlacklistKey, DropCount> =
    HashMap::<BlacklistKey, DropCount>::with_max_entries(BLACKLIST_MAX_ENTRIES, 0);

#[xdp(name = "xdp_prog_firewall")]
pub fn xdp_prog_firewall(ctx: XdpContext) -> u32 {
    match unsafe { try_xdp_prog_firewall(&ctx) } {
        Ok(ret) => ret,
        Err(ret) => ret,
    }
}

#[inline(always)]
unsafe fn load<T: Copy>(ctx: &XdpContext, offset: usize) -> Result<T, u32> {
    let start = ctx.data();
    let end = ctx.data_end();
    if start + offset + core::mem::size_of::<T>() > end {
        return Err(XDP_DROP);
    }
    Ok(core::ptr::read_unaligned((start + offset) as *const T))
}

unsafe fn try_xdp_prog_firewall(ctx: &XdpContext) -> Result<u32, u32> {
    let ether_type = u16::from_be(load(ctx, ETH_TYPE_OFF)?);
    if ether_type != ETH_P_IP {
        return Ok(XDP_PASS);
    }

    let source = BlacklistKey::new(load(ctx, ETH_HDR_LEN + IP_SADDR_OFF)?);
    match BLACKLIST.get(&source) {
        Some(count) => {
            let count = count.wrapping_add(1);
            // Racy across CPUs, counts are best effort
            BLACKLIST
                .insert(&source, &count, 0)
                .map_err(|_| XDP_ABORTED)?;
            Ok(XDP_DROP)
        }
        None => Ok(XDP_PASS),
    }
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}

const ETH_P_IP: u16 = 0x0800;
const ETH_TYPE_OFF: usize = 12;
const ETH_HDR_LEN: usize = 14;
const IP_SADDR_OFF: usize = 12;
