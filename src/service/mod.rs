//! Service launchers

pub mod dispatcher;
pub mod lifecycle;
