//! Proxy modes
//!
//! | `--transparent` | `--udp` | mode            | local side              |
//! |-----------------|---------|-----------------|-------------------------|
//! | no              | no      | SOCKS5          | SOCKS5 CONNECT          |
//! | yes             | no      | transparent TCP | plain TCP to `--target` |
//! | yes             | yes     | transparent UDP | datagrams to `--target` |
//! | no              | yes     | STUN UDP        | STUN datagrams          |

use std::fmt;

pub mod pt_socks5;
pub mod stun_udp;
pub mod transparent_tcp;
pub mod transparent_udp;

/// One of the four launchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    Socks5,
    TransparentTcp,
    TransparentUdp,
    StunUdp,
}

impl ProxyMode {
    /// Picks the mode from the two independent `--transparent` and `--udp` switches
    pub fn select(transparent: bool, udp: bool) -> ProxyMode {
        match (transparent, udp) {
            (false, false) => ProxyMode::Socks5,
            (true, false) => ProxyMode::TransparentTcp,
            (true, true) => ProxyMode::TransparentUdp,
            (false, true) => ProxyMode::StunUdp,
        }
    }

    /// Protocol name announced in `CMETHOD` lines
    pub fn protocol(self) -> &'static str {
        match self {
            ProxyMode::Socks5 => "socks5",
            ProxyMode::TransparentTcp => "transparent-TCP",
            ProxyMode::TransparentUdp => "transparent-UDP",
            ProxyMode::StunUdp => "STUN",
        }
    }

    pub fn is_udp(self) -> bool {
        matches!(self, ProxyMode::TransparentUdp | ProxyMode::StunUdp)
    }

    /// Client modes that forward everything to `--target`
    pub fn requires_target(self) -> bool {
        self != ProxyMode::Socks5
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProxyMode::Socks5 => f.write_str("PT 2.0 SOCKS5"),
            ProxyMode::TransparentTcp => f.write_str("transparent TCP"),
            ProxyMode::TransparentUdp => f.write_str("transparent UDP"),
            ProxyMode::StunUdp => f.write_str("STUN UDP"),
        }
    }
}
