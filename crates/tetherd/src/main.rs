use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match tetherd::run_daemon().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("tetherd: {error}");
            ExitCode::FAILURE
        }
    }
}
