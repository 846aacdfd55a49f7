use std::process::ExitCode;

fn main() -> ExitCode {
    liveconf_cli::run()
}
