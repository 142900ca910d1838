use std::process::ExitCode;

fn main() -> ExitCode {
    millwork_cli::run()
}
