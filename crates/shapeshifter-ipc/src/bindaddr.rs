use std::net::SocketAddr;

use crate::{
    addr::resolve_addr,
    args::{Args, TransportOptions},
    error::{Error, Result},
};

/// A transport a server listens with, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindaddr {
    /// Transport name
    pub method_name: String,
    /// Listen address
    pub addr: SocketAddr,
    /// Arguments for this transport, empty if none were configured
    pub options: Args,
}

/// Parses a `name-host:port,name-host:port` list
///
/// Each spec is split on its first `-`. Any malformed spec fails the whole list.
pub fn parse_bindaddrs(list: &str, options: &TransportOptions) -> Result<Vec<Bindaddr>> {
    let mut result = Vec::new();

    for spec in list.split(',') {
        let fail = |cause: String| Error::BindAddrParse {
            spec: spec.to_owned(),
            cause,
        };

        let (name, addr) = match spec.split_once('-') {
            Some(p) => p,
            None => return Err(fail("doesn't contain \"-\"".to_owned())),
        };
        if name.is_empty() {
            return Err(fail("empty transport name".to_owned()));
        }

        let addr = resolve_addr(addr).map_err(|err| fail(err.to_string()))?;

        result.push(Bindaddr {
            method_name: name.to_owned(),
            addr,
            options: options.args_for(name),
        });
    }

    Ok(result)
}

/// Keeps the bind addresses whose transport appears in `method_names`
///
/// A `*` among the names keeps everything.
pub fn filter_bindaddrs<S: AsRef<str>>(addrs: Vec<Bindaddr>, method_names: &[S]) -> Vec<Bindaddr> {
    if method_names.iter().any(|n| n.as_ref() == "*") {
        return addrs;
    }

    addrs
        .into_iter()
        .filter(|b| method_names.iter().any(|n| n.as_ref() == b.method_name))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::args::{parse_transport_options, OptionsFormat};

    #[test]
    fn parse_and_attach_options() {
        let opts = parse_transport_options("obfs4:cert=AAA", OptionsFormat::Legacy).unwrap();
        let addrs = parse_bindaddrs("obfs4-127.0.0.1:1234,meek-[::1]:5678", &opts).unwrap();

        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].method_name, "obfs4");
        assert_eq!(addrs[0].addr, "127.0.0.1:1234".parse().unwrap());
        assert_eq!(addrs[0].options.get("cert"), Some("AAA"));
        assert_eq!(addrs[1].method_name, "meek");
        assert_eq!(addrs[1].addr, "[::1]:5678".parse().unwrap());
        assert!(addrs[1].options.is_empty());
    }

    #[test]
    fn first_hyphen_wins() {
        let addrs = parse_bindaddrs("obfs4-localhost:443", &TransportOptions::new()).unwrap();
        assert_eq!(addrs[0].method_name, "obfs4");

        // "my-transport" cannot be a name: everything after the first hyphen is an address
        let err = parse_bindaddrs("my-transport-[::1]:1", &TransportOptions::new()).unwrap_err();
        assert!(matches!(err, Error::BindAddrParse { ref spec, .. } if spec == "my-transport-[::1]:1"));
    }

    #[test]
    fn fail_fast() {
        let err = parse_bindaddrs("obfs4-127.0.0.1:1234,meek127.0.0.1:5678", &TransportOptions::new()).unwrap_err();
        assert_eq!(
            err,
            Error::BindAddrParse {
                spec: "meek127.0.0.1:5678".to_owned(),
                cause: "doesn't contain \"-\"".to_owned(),
            }
        );

        assert!(parse_bindaddrs("-127.0.0.1:1", &TransportOptions::new()).is_err());
        assert!(parse_bindaddrs("obfs4-127.0.0.1", &TransportOptions::new()).is_err());
    }

    #[test]
    fn filter() {
        let addrs = parse_bindaddrs("obfs4-127.0.0.1:1234,meek-127.0.0.1:5678", &TransportOptions::new()).unwrap();

        let all = filter_bindaddrs(addrs.clone(), &["meek", "obfs4"]);
        assert_eq!(all, addrs);

        let star = filter_bindaddrs(addrs.clone(), &["*"]);
        assert_eq!(star, addrs);

        let none = filter_bindaddrs(addrs, &["shadow"]);
        assert!(none.is_empty());
    }
}
