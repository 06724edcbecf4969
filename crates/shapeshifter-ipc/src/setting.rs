//! Ordered setting sources
//!
//! Every setting that can come from either a flag or an environment variable is looked up
//! through an ordered list of [`Source`]s. The first source holding a non-empty value wins
//! and the result remembers where it came from, because some settings (transport options)
//! are parsed differently depending on their origin.

use crate::{
    env::Environment,
    error::{Error, Result},
};

/// Where a setting's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    CommandLine,
    Environment(&'static str),
}

/// A setting value with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced {
    pub value: String,
    pub origin: Origin,
}

impl Sourced {
    /// Check if the value was given on the command line
    pub fn is_command_line(&self) -> bool {
        self.origin == Origin::CommandLine
    }
}

/// One place a setting may be read from
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// A command line value, `None` if the flag was not given
    CommandLine(Option<&'a str>),
    /// An environment variable
    Environment(&'static str),
}

impl Source<'_> {
    /// Reads this source. Absent and empty values both count as "not supplied".
    pub fn read(&self, env: &dyn Environment) -> Option<Sourced> {
        match *self {
            Source::CommandLine(Some(v)) if !v.is_empty() => Some(Sourced {
                value: v.to_owned(),
                origin: Origin::CommandLine,
            }),
            Source::CommandLine(..) => None,
            Source::Environment(name) => env.var(name).filter(|v| !v.is_empty()).map(|value| Sourced {
                value,
                origin: Origin::Environment(name),
            }),
        }
    }
}

/// First supplied value among `sources`, tried in order
pub fn first_of(sources: &[Source<'_>], env: &dyn Environment) -> Option<Sourced> {
    sources.iter().find_map(|s| s.read(env))
}

/// The usual pair: the command line flag, then the environment variable `var`
pub fn lookup(flag: Option<&str>, env: &dyn Environment, var: &'static str) -> Option<Sourced> {
    first_of(&[Source::CommandLine(flag), Source::Environment(var)], env)
}

/// [`lookup`] for settings that must be present
pub fn lookup_required(flag: Option<&str>, env: &dyn Environment, var: &'static str) -> Result<Sourced> {
    lookup(flag, env, var).ok_or(Error::MissingEnvironment(var))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::{MapEnvironment, ORPORT};

    #[test]
    fn command_line_wins() {
        let env = MapEnvironment::new().with(ORPORT, "127.0.0.1:1");
        let s = lookup(Some("127.0.0.1:2"), &env, ORPORT).unwrap();
        assert_eq!(s.value, "127.0.0.1:2");
        assert!(s.is_command_line());
    }

    #[test]
    fn empty_flag_falls_back() {
        let env = MapEnvironment::new().with(ORPORT, "127.0.0.1:1");
        let s = lookup(Some(""), &env, ORPORT).unwrap();
        assert_eq!(s.value, "127.0.0.1:1");
        assert_eq!(s.origin, Origin::Environment(ORPORT));
    }

    #[test]
    fn each_source_alone() {
        let env = MapEnvironment::new().with(ORPORT, "");
        assert_eq!(Source::Environment(ORPORT).read(&env), None);
        assert_eq!(Source::CommandLine(None).read(&env), None);
        assert_eq!(
            lookup_required(None, &env, ORPORT),
            Err(Error::MissingEnvironment(ORPORT))
        );
    }
}
