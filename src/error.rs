//! Dispatcher-specific error encoding.

use std::{fmt, io, path::PathBuf};

use shapeshifter_ipc::Error as ConfigError;

/// A result with a dispatcher-specific error.
pub type DispatcherResult<T = ()> = Result<T, DispatcherError>;

/// Every way the dispatcher can stop before reaching its running state
#[derive(Debug)]
pub enum DispatcherError {
    /// Neither flags nor environment pick client or server
    AmbiguousRole(ConfigError),
    /// Neither `--state` nor `TOR_PT_STATE_LOCATION` is set
    MissingStateDirectory,
    CreateStateDirectory(PathBuf, io::Error),
    LoggingFailure(String),
    /// Client or server configuration could not be resolved
    ResolveFailure(ConfigError),
    RuntimeFailure(io::Error),
    /// No listener could be started, the launcher already reported why
    LaunchFailure,
}

impl DispatcherError {
    /// The corresponding `sysexits::ExitCode` for this error.
    pub fn exit_code(&self) -> sysexits::ExitCode {
        match self {
            Self::AmbiguousRole(_) => sysexits::ExitCode::Usage,
            Self::MissingStateDirectory | Self::CreateStateDirectory(..) => sysexits::ExitCode::CantCreat,
            Self::LoggingFailure(_) => sysexits::ExitCode::IoErr,
            Self::ResolveFailure(_) => sysexits::ExitCode::Config,
            Self::RuntimeFailure(_) => sysexits::ExitCode::OsErr,
            Self::LaunchFailure => sysexits::ExitCode::Software,
        }
    }

    /// Whether the usage text helps fixing this error
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousRole(_) | Self::MissingStateDirectory | Self::CreateStateDirectory(..)
        )
    }
}

impl fmt::Display for DispatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousRole(err) | Self::ResolveFailure(err) => write!(f, "{err}"),
            Self::MissingStateDirectory => f.write_str("no state directory, set --state or TOR_PT_STATE_LOCATION"),
            Self::CreateStateDirectory(path, err) => write!(f, "failed to create state directory {path:?}: {err}"),
            Self::LoggingFailure(msg) => write!(f, "failed to initialize logging: {msg}"),
            Self::RuntimeFailure(err) => write!(f, "failed to create tokio runtime: {err}"),
            Self::LaunchFailure => f.write_str("no transport could be launched"),
        }
    }
}

impl std::error::Error for DispatcherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AmbiguousRole(err) | Self::ResolveFailure(err) => Some(err),
            Self::CreateStateDirectory(_, err) | Self::RuntimeFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for DispatcherError {
    fn from(err: ConfigError) -> DispatcherError {
        match err {
            ConfigError::AmbiguousRole(..) => DispatcherError::AmbiguousRole(err),
            _ => DispatcherError::ResolveFailure(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exit_codes() {
        let role = DispatcherError::from(ConfigError::AmbiguousRole("no role flag"));
        assert_eq!(role.exit_code(), sysexits::ExitCode::Usage);
        assert!(role.wants_usage());

        let env = DispatcherError::from(ConfigError::MissingEnvironment("TOR_PT_ORPORT"));
        assert_eq!(env.exit_code(), sysexits::ExitCode::Config);
        assert!(!env.wants_usage());

        assert!(DispatcherError::MissingStateDirectory.wants_usage());
        assert_eq!(DispatcherError::LaunchFailure.exit_code(), sysexits::ExitCode::Software);
    }
}
