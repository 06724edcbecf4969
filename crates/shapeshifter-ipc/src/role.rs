use std::fmt;

use crate::{
    env::{Environment, CLIENT_TRANSPORTS, SERVER_TRANSPORTS},
    error::{Error, Result},
    setting::Source,
};

/// Which end of a transport this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Decides the role from the `--client` / `--server` flags, then from the environment
    ///
    /// Both flags at once is ambiguous input and rejected. Without flags the parent's
    /// transport variable decides: client transports mean client, server transports mean
    /// server, and both or neither is ambiguous. Empty variables count as unset.
    pub fn decide(client: bool, server: bool, env: &dyn Environment) -> Result<Role> {
        match (client, server) {
            (true, true) => return Err(Error::AmbiguousRole("both --client and --server were given")),
            (true, false) => return Ok(Role::Client),
            (false, true) => return Ok(Role::Server),
            (false, false) => {}
        }

        let offered = |var: &'static str| Source::Environment(var).read(env).is_some();
        match (offered(CLIENT_TRANSPORTS), offered(SERVER_TRANSPORTS)) {
            (true, false) => Ok(Role::Client),
            (false, true) => Ok(Role::Server),
            (true, true) => Err(Error::AmbiguousRole(
                "both TOR_PT_CLIENT_TRANSPORTS and TOR_PT_SERVER_TRANSPORTS are set",
            )),
            (false, false) => Err(Error::AmbiguousRole(
                "no --client or --server flag, and no PT transports in the environment",
            )),
        }
    }

    pub fn is_client(self) -> bool {
        self == Role::Client
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::MapEnvironment;

    #[test]
    fn flags_first() {
        let env = MapEnvironment::new().with(SERVER_TRANSPORTS, "obfs4");
        assert_eq!(Role::decide(true, false, &env), Ok(Role::Client));
        assert_eq!(Role::decide(false, true, &MapEnvironment::new()), Ok(Role::Server));
        assert!(matches!(Role::decide(true, true, &env), Err(Error::AmbiguousRole(..))));
    }

    #[test]
    fn environment_fallback() {
        let client = MapEnvironment::new().with(CLIENT_TRANSPORTS, "*");
        assert_eq!(Role::decide(false, false, &client), Ok(Role::Client));

        let server = MapEnvironment::new().with(SERVER_TRANSPORTS, "obfs4");
        assert_eq!(Role::decide(false, false, &server), Ok(Role::Server));

        let both = client.with(SERVER_TRANSPORTS, "obfs4");
        assert!(matches!(Role::decide(false, false, &both), Err(Error::AmbiguousRole(..))));

        assert!(matches!(
            Role::decide(false, false, &MapEnvironment::new()),
            Err(Error::AmbiguousRole(..))
        ));
    }

    #[test]
    fn empty_variable_is_unset() {
        let env = MapEnvironment::new()
            .with(CLIENT_TRANSPORTS, "")
            .with(SERVER_TRANSPORTS, "obfs4");
        assert_eq!(Role::decide(false, false, &env), Ok(Role::Server));

        let env = MapEnvironment::new().with(CLIENT_TRANSPORTS, "");
        assert!(matches!(Role::decide(false, false, &env), Err(Error::AmbiguousRole(..))));
    }
}
