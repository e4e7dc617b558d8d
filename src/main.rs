//! hdg-from: generate HDG files for GEMSS from SWMM flow exports.
//!
//! ```text
//! hdg-from node3.txt --start-date 2017-01-01T12:00:00 --unit CMD -u "Di Wu"
//! ```

use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = std::io::stdout();
    let code = hdgfrom::cli::run(std::env::args_os().skip(1), &mut stdout);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
