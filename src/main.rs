use std::process::ExitCode;

fn main() -> ExitCode {
    match reminder_engine::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("reminder-engine: {}", e);
            ExitCode::FAILURE
        }
    }
}
