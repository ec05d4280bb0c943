use clap::Parser;
use publication_validator::{CliArgs, LoggingConfig, init_logging, run_cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let cli = CliArgs::parse();
    run_cli(cli, std::io::stdout()).await
}
