//! Binary entrypoint that launches the spotrank server.

use std::process::ExitCode;

use spotrank::start_spotrank;

/// Load configuration, open the index and serve until Ctrl-C.
fn main() -> ExitCode {
    start_spotrank::run()
}
