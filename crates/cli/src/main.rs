use std::process::ExitCode;

fn main() -> ExitCode {
    cquiz_cli::run()
}
