use std::process::ExitCode;

fn main() -> ExitCode {
    match interdeps::cli::run() {
        Ok(code) => code,
        Err(e) => {
            interdeps::ui::output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
