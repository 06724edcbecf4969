//! This is a binary running pluggable transports as a managed proxy
//!
//! Started by a parent process which configures it with command line flags or `TOR_PT_*`
//! environment variables, and reads its status from standard output.

use std::process::ExitCode;

use clap::Command;
use shapeshifter_dispatcher::service::dispatcher;

fn main() -> ExitCode {
    let mut app = Command::new("shapeshifter-dispatcher")
        .about("A pluggable transport dispatcher for running transports as a client or server proxy");
    app = dispatcher::define_command_line_options(app);

    let matches = app.get_matches();
    dispatcher::main(&matches)
}
