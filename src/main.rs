use std::process::ExitCode;

fn main() -> ExitCode {
    match clinic_desk::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
