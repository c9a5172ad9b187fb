//! Synthetic frames for [`Blacklist::test_run`](crate::Blacklist::test_run).
//!
//! Ethernet + IPv4 + TCP SYN with valid checksums, enough for the XDP program to
//! classify the frame by source address.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};

const ETH_HDR_LEN: usize = 14;
const IP_HDR_LEN: usize = 20;
const TCP_HDR_LEN: usize = 20;
const ETH_P_IP: u16 = 0x0800;
const IPPROTO_TCP: u8 = 6;
// Don't fragment
const IP_DF: u16 = 0x4000;
const TCP_SYN: u8 = 0x02;

/// Offset of the IPv4 source address in a built frame.
pub const SOURCE_OFFSET: usize = ETH_HDR_LEN + 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFrame {
    pub src_mac: [u8; 6],
    pub dst_mac: [u8; 6],
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ttl: u8,
    pub id: u16,
}

impl Default for TcpFrame {
    fn default() -> Self {
        Self {
            src_mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
            dst_mac: [0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa],
            src_ip: Ipv4Addr::new(192, 168, 0, 10),
            dst_ip: Ipv4Addr::new(192, 168, 0, 20),
            src_port: 12345,
            dst_port: 80,
            seq: 111,
            ttl: 64,
            id: 1111,
        }
    }
}

impl TcpFrame {
    pub fn from_source(src_ip: Ipv4Addr) -> Self {
        Self {
            src_ip,
            ..Default::default()
        }
    }

    pub fn with_destination(self, dst_ip: Ipv4Addr, dst_port: u16) -> Self {
        Self {
            dst_ip,
            dst_port,
            ..self
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = BytesMut::with_capacity(ETH_HDR_LEN + IP_HDR_LEN + TCP_HDR_LEN);

        frame.put_slice(&self.dst_mac);
        frame.put_slice(&self.src_mac);
        frame.put_u16(ETH_P_IP);

        let ip_start = frame.len();
        // version 4, ihl 5
        frame.put_u8(0x45);
        frame.put_u8(0);
        frame.put_u16((IP_HDR_LEN + TCP_HDR_LEN) as u16);
        frame.put_u16(self.id);
        frame.put_u16(IP_DF);
        frame.put_u8(self.ttl);
        frame.put_u8(IPPROTO_TCP);
        frame.put_u16(0);
        frame.put_slice(&self.src_ip.octets());
        frame.put_slice(&self.dst_ip.octets());
        let ip_checksum = checksum(&frame[ip_start..], 0);
        frame[ip_start + 10..ip_start + 12].copy_from_slice(&ip_checksum.to_be_bytes());

        let tcp_start = frame.len();
        frame.put_u16(self.src_port);
        frame.put_u16(self.dst_port);
        frame.put_u32(self.seq);
        frame.put_u32(0);
        // data offset 5 words
        frame.put_u8(5 << 4);
        frame.put_u8(TCP_SYN);
        frame.put_u16(u16::MAX);
        frame.put_u16(0);
        frame.put_u16(0);
        let tcp_checksum = checksum(&frame[tcp_start..], self.pseudo_header_sum());
        frame[tcp_start + 16..tcp_start + 18].copy_from_slice(&tcp_checksum.to_be_bytes());

        frame.to_vec()
    }

    fn pseudo_header_sum(&self) -> u32 {
        let mut pseudo = [0u8; 12];
        pseudo[..4].copy_from_slice(&self.src_ip.octets());
        pseudo[4..8].copy_from_slice(&self.dst_ip.octets());
        pseudo[9] = IPPROTO_TCP;
        pseudo[10..].copy_from_slice(&(TCP_HDR_LEN as u16).to_be_bytes());
        sum_words(&pseudo, 0)
    }
}

fn sum_words(data: &[u8], initial: u32) -> u32 {
    data.chunks(2).fold(initial, |sum, word| {
        let hi = u32::from(word[0]) << 8;
        let lo = word.get(1).copied().map(u32::from).unwrap_or(0);
        sum + (hi | lo)
    })
}

/// Internet checksum (RFC 1071) of `data`, starting from a partial `initial` sum.
pub fn checksum(data: &[u8], initial: u32) -> u16 {
    let mut sum = sum_words(data, initial);
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
