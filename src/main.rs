use smtp_send::{cli, config::TelemetryConfig, telemetry};
use std::io;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A .env file may supply the variable named by -envPw
    dotenvy::dotenv().ok();

    telemetry::init(&TelemetryConfig::from_env());

    let code = cli::run(std::env::args(), &mut io::stdout(), &mut io::stderr()).await;
    ExitCode::from(code)
}
