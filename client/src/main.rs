use {
    anyhow::Result,
    clap::Parser,
    eph::{cli::Cli, config::Config, run, setup_logger, term::clear_status},
    std::process::ExitCode,
    tracing::error,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logger(config.log_file.as_deref(), &config.log_filter)?;

    if let Err(err) = run(cli, config).await {
        clear_status();
        error!("{err:#}");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
