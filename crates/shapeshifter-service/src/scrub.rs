//! Address scrubbing for log output

use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

static SAFE_LOGGING: AtomicBool = AtomicBool::new(true);

/// Replaces addresses in log lines with `[scrubbed]` while enabled (the default)
pub fn set_safe_logging(enabled: bool) {
    SAFE_LOGGING.store(enabled, Ordering::Relaxed);
}

pub fn safe_logging() -> bool {
    SAFE_LOGGING.load(Ordering::Relaxed)
}

/// Display adapter for peer and destination addresses
///
/// ```
/// use shapeshifter_service::scrub::elide;
///
/// log::info!("connection from {}", elide(&"192.0.2.1:4000"));
/// ```
pub fn elide<T: fmt::Display + ?Sized>(addr: &T) -> Elided<'_, T> {
    Elided(addr)
}

pub struct Elided<'a, T: ?Sized>(&'a T);

impl<T: fmt::Display + ?Sized> fmt::Display for Elided<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if safe_logging() {
            f.write_str("[scrubbed]")
        } else {
            fmt::Display::fmt(self.0, f)
        }
    }
}
