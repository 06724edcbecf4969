//! Transports this binary can run

use log::trace;
use shapeshifter_ipc::Args;

/// Names of every built-in transport, in the order `*` expands to
pub const REGISTRY: &[&str] = &["identity"];

/// A built-in transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Bytes pass through unchanged
    Identity,
}

impl Transport {
    pub fn lookup(name: &str) -> Option<Transport> {
        match name {
            "identity" => Some(Transport::Identity),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transport::Identity => "identity",
        }
    }

    /// Applies per-connection client arguments
    pub fn configure_client(self, args: &Args) {
        match self {
            Transport::Identity => {
                if !args.is_empty() {
                    trace!("identity ignores {} client arguments", args.len());
                }
            }
        }
    }

    /// Arguments a server advertises in its `SMETHOD` line
    pub fn server_args(self, options: &Args) -> Args {
        match self {
            Transport::Identity => {
                if !options.is_empty() {
                    trace!("identity ignores {} server options", options.len());
                }
                Args::new()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registry_round_trip() {
        for name in REGISTRY {
            assert_eq!(Transport::lookup(name).map(Transport::name), Some(*name));
        }
        assert_eq!(Transport::lookup("obfs4"), None);
    }
}
