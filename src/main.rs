use clap::Parser;

use nifi_ci::cli::{commands, logging, output, Cli};
use output::OutputFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let capture = logging::init(cli.verbose);
    let format = OutputFormat::detect(cli.format, |key| std::env::var(key).ok());
    let command = cli.command.name();

    let payload = match commands::run(&cli).await {
        Ok(value) => output::success_payload(&value),
        Err(e) => {
            log::error!("{} failed: {}", command, e);
            output::error_payload(command, &e, &capture.lines())
        }
    };
    output::emit(format, &payload, |key| std::env::var(key).ok())?;

    if payload.get("success").map(String::as_str) == Some("false") {
        std::process::exit(1);
    }
    Ok(())
}
