use std::process::ExitCode;

fn main() -> ExitCode {
    carfleet_cli::run()
}
