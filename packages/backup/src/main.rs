//! Main entry point for the parameterstore-backup CLI

use std::process::ExitCode;

fn main() -> ExitCode {
    parameterstore_backup::logging::init();

    parameterstore_backup::cli::run()
}
