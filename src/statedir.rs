//! Transport state directory

use std::{fs, path::PathBuf};

use log::debug;
use shapeshifter_ipc::{
    env::{Environment, STATE_LOCATION},
    setting::lookup,
};

use crate::error::{DispatcherError, DispatcherResult};

/// Locates the state directory, `--state` first, then `TOR_PT_STATE_LOCATION`
pub fn locate(flag: Option<&str>, env: &dyn Environment) -> DispatcherResult<PathBuf> {
    lookup(flag, env, STATE_LOCATION)
        .map(|s| PathBuf::from(s.value))
        .ok_or(DispatcherError::MissingStateDirectory)
}

/// Creates the state directory and its parents, readable by the owner only
pub fn create(path: PathBuf) -> DispatcherResult<PathBuf> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    match builder.create(&path) {
        Ok(()) => {
            debug!("state directory {:?}", path);
            Ok(path)
        }
        Err(err) => Err(DispatcherError::CreateStateDirectory(path, err)),
    }
}
