//! Configuration resolution errors

use thiserror::Error;

/// Configuration resolution result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way resolving a client or server configuration can fail
///
/// All of them are fatal for the process: a half-configured endpoint is never started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Neither flags nor environment say whether this is a client or a server
    #[error("cannot decide between client and server mode: {0}")]
    AmbiguousRole(&'static str),
    /// A required environment variable is absent
    #[error("required environment variable {0} is not set")]
    MissingEnvironment(&'static str),
    /// Malformed transport option text, `entry` is the offending fragment
    #[error("transport options {entry:?}: {reason}")]
    OptionParse { entry: String, reason: &'static str },
    /// Malformed bind address specification
    #[error("bind address {spec:?}: {cause}")]
    BindAddrParse { spec: String, cause: String },
    /// A `host:port` could not be turned into a socket address
    #[error("address {addr:?}: {reason}")]
    AddressResolution { addr: String, reason: String },
    /// Malformed or unsupported upstream proxy URL
    #[error("proxy URL {url:?}: {reason}")]
    ProxyUrl { url: String, reason: String },
    /// The parent offered no PT version that we speak
    #[error("no supported PT version in {0:?}")]
    UnsupportedVersion(String),
}

impl Error {
    pub(crate) fn option_parse(entry: &str, reason: &'static str) -> Error {
        Error::OptionParse {
            entry: entry.to_owned(),
            reason,
        }
    }
}
