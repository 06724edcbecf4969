//! Command line value parsers

use std::net::SocketAddr;

use log::LevelFilter;

macro_rules! value_parser_type {
    ($name:ident, $ty:ty, $help:expr) => {
        pub fn $name(v: &str) -> Result<$ty, String> {
            match v.parse::<$ty>() {
                Ok(t) => Ok(t),
                Err(..) => Err($help.to_owned()),
            }
        }
    };
}

value_parser_type!(parse_socket_addr, SocketAddr, "should be ip:port");

/// `--logLevel`, one of ERROR, WARN, INFO or DEBUG in any case
pub fn parse_log_level(v: &str) -> Result<LevelFilter, String> {
    match v.to_ascii_uppercase().as_str() {
        "ERROR" => Ok(LevelFilter::Error),
        "WARN" => Ok(LevelFilter::Warn),
        "INFO" => Ok(LevelFilter::Info),
        "DEBUG" => Ok(LevelFilter::Debug),
        _ => Err("should be one of ERROR, WARN, INFO or DEBUG".to_owned()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn log_levels() {
        assert_eq!(parse_log_level("ERROR"), Ok(LevelFilter::Error));
        assert_eq!(parse_log_level("debug"), Ok(LevelFilter::Debug));
        assert_eq!(parse_log_level("Warn"), Ok(LevelFilter::Warn));
        assert!(parse_log_level("TRACE").is_err());
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn socket_addrs() {
        assert!(parse_socket_addr("127.0.0.1:0").is_ok());
        assert!(parse_socket_addr("[::1]:9050").is_ok());
        assert!(parse_socket_addr("localhost:9050").is_err());
    }
}
