//! Transport arguments and the option string grammars
//!
//! Two serializations of per-transport options exist:
//!
//! ```plain
//! legacy    (TOR_PT_SERVER_TRANSPORT_OPTIONS):  obfs4:cert=AAA;obfs4:iat-mode=0;meek:url=x
//! versioned (--options):                        obfs4:cert=AAA,iat-mode=0;meek:url=x
//! ```
//!
//! In both, `\` escapes the character that follows it.

use std::collections::{btree_map, BTreeMap};

use crate::error::{Error, Result};

const ESCAPE: char = '\\';

/// Key/value arguments of one transport
///
/// A multi-map: adding an existing key appends another value, [`Args::get`] returns the
/// first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pairs: BTreeMap<String, Vec<String>>,
}

impl Args {
    /// Creates an empty argument set
    pub fn new() -> Args {
        Args::default()
    }

    /// Appends `value` to `key`
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.pairs.entry(key.into()).or_default().push(value.into());
    }

    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values of `key`, in the order they were added
    pub fn get_all(&self, key: &str) -> &[String] {
        self.pairs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends every value of `other`
    pub fn merge(&mut self, other: Args) {
        for (k, vs) in other.pairs {
            self.pairs.entry(k).or_default().extend(vs);
        }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates keys in sorted order with all their values
    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
        self.pairs.iter()
    }

    /// Encodes as `key=value,key=value`, the form used in `SMETHOD ... ARGS:`
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (k, vs) in &self.pairs {
            for v in vs {
                if !out.is_empty() {
                    out.push(',');
                }
                escape_into(&mut out, k);
                out.push('=');
                escape_into(&mut out, v);
            }
        }
        out
    }
}

/// Per-transport arguments keyed by transport name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    transports: BTreeMap<String, Args>,
}

impl TransportOptions {
    /// Creates an empty option map
    pub fn new() -> TransportOptions {
        TransportOptions::default()
    }

    /// Arguments of `transport`, if any were given
    pub fn get(&self, transport: &str) -> Option<&Args> {
        self.transports.get(transport)
    }

    /// Arguments of `transport`, empty if none were given
    pub fn args_for(&self, transport: &str) -> Args {
        self.get(transport).cloned().unwrap_or_default()
    }

    /// Merges `args` into the arguments of `transport`
    pub fn insert(&mut self, transport: String, args: Args) {
        self.transports.entry(transport).or_default().merge(args);
    }

    /// Number of distinct transports
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Transport names in sorted order
    pub fn transports(&self) -> impl Iterator<Item = &str> {
        self.transports.keys().map(String::as_str)
    }
}

/// Option string grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsFormat {
    /// `transport:key=value` entries separated by `;`
    Legacy,
    /// `transport:key=value,key=value` entries separated by `;`
    Versioned,
}

/// Parses a transport option string in the given grammar
///
/// An empty string yields an empty map.
pub fn parse_transport_options(s: &str, format: OptionsFormat) -> Result<TransportOptions> {
    let mut options = TransportOptions::new();
    if s.is_empty() {
        return Ok(options);
    }
    if has_dangling_escape(s) {
        return Err(Error::option_parse(last_entry(s), "ends with an unfinished escape"));
    }

    for entry in split_unescaped(s, ';') {
        let (name, rest) = match split_first_unescaped(entry, ':') {
            Some(p) => p,
            None => return Err(Error::option_parse(entry, "missing \":\"")),
        };

        let name = unescape(name);
        if name.is_empty() {
            return Err(Error::option_parse(entry, "empty transport name"));
        }

        let mut args = Args::new();
        match format {
            OptionsFormat::Legacy => {
                let (k, v) = parse_pair(entry, rest)?;
                args.add(k, v);
            }
            OptionsFormat::Versioned => {
                for pair in split_unescaped(rest, ',') {
                    if let Some((_, raw)) = split_first_unescaped(pair, '=') {
                        if contains_unescaped(raw, &[':', '=']) {
                            return Err(Error::option_parse(entry, "unescaped delimiter in value"));
                        }
                    }
                    let (k, v) = parse_pair(entry, pair)?;
                    args.add(k, v);
                }
            }
        }
        options.insert(name, args);
    }

    Ok(options)
}

/// Parses `key=value;key=value`, the argument string a client passes per connection
pub fn parse_client_args(s: &str) -> Result<Args> {
    let mut args = Args::new();
    if s.is_empty() {
        return Ok(args);
    }
    if has_dangling_escape(s) {
        return Err(Error::option_parse(last_entry(s), "ends with an unfinished escape"));
    }

    for pair in split_unescaped(s, ';') {
        let (k, v) = parse_pair(pair, pair)?;
        args.add(k, v);
    }
    Ok(args)
}

// `entry` is only used to report errors
fn parse_pair(entry: &str, pair: &str) -> Result<(String, String)> {
    let (k, v) = match split_first_unescaped(pair, '=') {
        Some(p) => p,
        None => return Err(Error::option_parse(entry, "missing \"=\"")),
    };

    let k = unescape(k);
    if k.is_empty() {
        return Err(Error::option_parse(entry, "empty key"));
    }
    Ok((k, unescape(v)))
}

/// Byte offsets of every unescaped occurrence of any of `seps`
fn unescaped_positions<'a>(s: &'a str, seps: &'a [char]) -> impl Iterator<Item = usize> + 'a {
    let mut escaped = false;
    s.char_indices().filter_map(move |(i, c)| {
        if escaped {
            escaped = false;
            None
        } else if c == ESCAPE {
            escaped = true;
            None
        } else if seps.contains(&c) {
            Some(i)
        } else {
            None
        }
    })
}

fn has_dangling_escape(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        escaped = !escaped && c == ESCAPE;
    }
    escaped
}

/// The `;` entry holding a dangling escape, always the last one
fn last_entry(s: &str) -> &str {
    split_unescaped(s, ';').pop().unwrap_or(s)
}

fn contains_unescaped(s: &str, seps: &[char]) -> bool {
    unescaped_positions(s, seps).next().is_some()
}

fn split_first_unescaped(s: &str, sep: char) -> Option<(&str, &str)> {
    let seps = [sep];
    let pos = unescaped_positions(s, &seps).next()?;
    Some((&s[..pos], &s[pos + sep.len_utf8()..]))
}

fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let seps = [sep];
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in unescaped_positions(s, &seps) {
        parts.push(&s[start..pos]);
        start = pos + sep.len_utf8();
    }
    parts.push(&s[start..]);
    parts
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;
    for c in s.chars() {
        if !escaped && c == ESCAPE {
            escaped = true;
            continue;
        }
        escaped = false;
        out.push(c);
    }
    out
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | ',' | ':' | '=') {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn legacy_accumulates_per_transport() {
        let opts = parse_transport_options(
            "obfs4:cert=AAA;obfs4:iat-mode=0;meek:url=https://a.example/",
            OptionsFormat::Legacy,
        )
        .unwrap();

        assert_eq!(opts.len(), 2);
        let obfs4 = opts.get("obfs4").unwrap();
        assert_eq!(obfs4.get("cert"), Some("AAA"));
        assert_eq!(obfs4.get("iat-mode"), Some("0"));
        // later ':' and '=' belong to the value in the legacy grammar
        assert_eq!(opts.get("meek").unwrap().get("url"), Some("https://a.example/"));
    }

    #[test]
    fn versioned_pairs() {
        let opts = parse_transport_options("obfs4:cert=AAA,iat-mode=0;shadow:password=x", OptionsFormat::Versioned)
            .unwrap();

        assert_eq!(opts.len(), 2);
        assert_eq!(opts.args_for("obfs4").len(), 2);
        assert_eq!(opts.args_for("shadow").get("password"), Some("x"));
        assert!(opts.args_for("meek").is_empty());
    }

    #[test]
    fn versioned_requires_escaped_delimiters() {
        let err = parse_transport_options("meek:url=https://a.example/", OptionsFormat::Versioned).unwrap_err();
        assert_eq!(
            err,
            Error::OptionParse {
                entry: "meek:url=https://a.example/".to_owned(),
                reason: "unescaped delimiter in value",
            }
        );

        let opts = parse_transport_options(r"meek:url=https\://a.example/,front=a\,b", OptionsFormat::Versioned).unwrap();
        let meek = opts.get("meek").unwrap();
        assert_eq!(meek.get("url"), Some("https://a.example/"));
        assert_eq!(meek.get("front"), Some("a,b"));
    }

    #[test]
    fn escaped_separators() {
        let opts = parse_transport_options(r"ob\:fs:k\;ey=va\=l\\ue", OptionsFormat::Legacy).unwrap();
        assert_eq!(opts.get("ob:fs").unwrap().get("k;ey"), Some(r"va=l\ue"));
    }

    #[test]
    fn malformed_entries() {
        for (s, reason) in [
            ("obfs4", "missing \":\""),
            (":key=value", "empty transport name"),
            ("obfs4:key", "missing \"=\""),
            ("obfs4:=value", "empty key"),
            ("obfs4:key=value;", "missing \":\""),
        ] {
            match parse_transport_options(s, OptionsFormat::Legacy) {
                Err(Error::OptionParse { reason: r, .. }) => assert_eq!(r, reason, "{s}"),
                other => panic!("{s}: {other:?}"),
            }
        }

        assert_eq!(
            parse_transport_options(r"meek:url=x;obfs4:key=value\", OptionsFormat::Legacy).unwrap_err(),
            Error::OptionParse {
                entry: r"obfs4:key=value\".to_owned(),
                reason: "ends with an unfinished escape",
            }
        );
        assert!(matches!(
            parse_client_args(r"a=1;b=2\"),
            Err(Error::OptionParse { ref entry, .. }) if entry == r"b=2\"
        ));
    }

    #[test]
    fn empty_is_empty() {
        assert!(parse_transport_options("", OptionsFormat::Legacy).unwrap().is_empty());
        assert!(parse_transport_options("", OptionsFormat::Versioned).unwrap().is_empty());
        assert!(parse_client_args("").unwrap().is_empty());
    }

    #[test]
    fn merge_is_order_independent_per_key_set() {
        let a = parse_transport_options("t:a=1;t:b=2;u:c=3", OptionsFormat::Legacy).unwrap();
        let b = parse_transport_options("u:c=3;t:b=2;t:a=1", OptionsFormat::Legacy).unwrap();

        let keys = |o: &TransportOptions, t: &str| o.get(t).unwrap().iter().map(|(k, _)| k.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&a, "t"), keys(&b, "t"));
        assert_eq!(a.transports().collect::<Vec<_>>(), b.transports().collect::<Vec<_>>());
    }

    #[test]
    fn client_args() {
        let args = parse_client_args(r"cert=A\;B;iat-mode=1;iat-mode=2").unwrap();
        assert_eq!(args.get("cert"), Some("A;B"));
        assert_eq!(args.get_all("iat-mode"), &["1".to_owned(), "2".to_owned()]);

        let err = parse_client_args("cert").unwrap_err();
        assert!(matches!(err, Error::OptionParse { ref entry, .. } if entry == "cert"));
    }

    #[test]
    fn encode_escapes() {
        let mut args = Args::new();
        args.add("cert", "a,b=c");
        args.add("iat-mode", "0");
        assert_eq!(args.encode(), r"cert=a\,b\=c,iat-mode=0");
    }
}
