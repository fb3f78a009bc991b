mod cli;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the environment and flags still apply.
    let _ = dotenvy::dotenv();

    let (config, log_format) = match cli::run() {
        cli::RunOutcome::Serve(config, log_format) => (config, log_format),
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };

    herald::telemetry::init(log_format == cli::LogFormat::Json);

    if let Err(err) = herald::serve(config).await {
        tracing::error!(error = %err, "herald failed");
        std::process::exit(1);
    }
}
