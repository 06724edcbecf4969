//! Logging facilities

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
        Append,
    },
    config::{Appender, Config, Logger, Root},
    encode::pattern::PatternEncoder,
};

use crate::error::{DispatcherError, DispatcherResult};

/// Log file name inside the state directory
pub const LOG_FILE_NAME: &str = "dispatcher.log";

const LOG_PATTERN: &str = "{d} {h({l}):<5} [{M}] {m}{n}";

/// Crates whose records pass the level filter, everything else is dropped
const LOGGED_CRATES: &[&str] = &["shapeshifter_dispatcher", "shapeshifter_ipc", "shapeshifter_service"];

/// Where log records go and how many of them
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// Write to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// `--enableLogging` writes into the state directory, stdout stays reserved for the parent
    pub fn new(level: LevelFilter, enable_file: bool, state_dir: &Path) -> LogConfig {
        LogConfig {
            level,
            file: if enable_file {
                Some(state_dir.join(LOG_FILE_NAME))
            } else {
                None
            },
        }
    }
}

/// Builds the log4rs configuration for `config`
pub fn build_config(config: &LogConfig) -> DispatcherResult<Config> {
    let encoder = Box::new(PatternEncoder::new(LOG_PATTERN));

    let appender: Box<dyn Append> = match config.file {
        Some(ref path) => Box::new(
            FileAppender::builder()
                .encoder(encoder)
                .build(path)
                .map_err(|err| DispatcherError::LoggingFailure(format!("{}: {}", path.display(), err)))?,
        ),
        None => Box::new(ConsoleAppender::builder().encoder(encoder).target(Target::Stderr).build()),
    };

    let mut builder = Config::builder().appender(Appender::builder().build("main", appender));
    for name in LOGGED_CRATES {
        builder = builder.logger(Logger::builder().build(*name, config.level));
    }

    builder
        .build(Root::builder().appender("main").build(LevelFilter::Off))
        .map_err(|err| DispatcherError::LoggingFailure(err.to_string()))
}

/// Initialize logger ([log4rs](https://crates.io/crates/log4rs)) with `config`
pub fn init_with_config(config: &LogConfig) -> DispatcherResult<()> {
    let config = build_config(config)?;
    log4rs::init_config(config)
        .map(|_| ())
        .map_err(|err| DispatcherError::LoggingFailure(err.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_only_when_enabled() {
        let state = Path::new("/var/lib/pt");
        assert_eq!(LogConfig::new(LevelFilter::Error, false, state).file, None);
        assert_eq!(
            LogConfig::new(LevelFilter::Debug, true, state).file,
            Some(PathBuf::from("/var/lib/pt/dispatcher.log"))
        );
    }

    #[test]
    fn console_config() {
        let config = build_config(&LogConfig {
            level: LevelFilter::Info,
            file: None,
        })
        .unwrap();

        assert_eq!(config.loggers().len(), LOGGED_CRATES.len());
        assert!(config.loggers().iter().all(|l| l.level() == LevelFilter::Info));
        assert_eq!(config.root().level(), LevelFilter::Off);
    }
}
