pub mod cli;
pub mod config;
pub mod progress;
pub mod term;

use {
    crate::{
        cli::{Cli, Command, default_log_path},
        config::Config,
        progress::TermProgress,
        term::TermLayer,
    },
    anyhow::{Result, ensure},
    eph_protocol::{
        AccessToken, FileId, TokenClaims, dto::BoxInfo, endpoints::Endpoints, util::log_writer,
    },
    eph_sdk::{Client, TransferSession},
    humantime::format_rfc3339_seconds,
    std::{
        path::{Path, PathBuf},
        sync::Mutex,
    },
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

#[inline]
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let token = config.access_token()?;
    let client = Client::new(Endpoints::new(config.endpoint.clone())?, token.clone())?
        .with_timeouts(config.timeouts());
    let progress = TermProgress::new(!cli.no_progress_bar);

    match cli.command {
        Command::Upload { path } => {
            check_expiration(&token)?;
            let file_id = TransferSession::new(&client)
                .with_chunk_size(config.chunk_size())
                .with_progress(&progress)
                .upload_encrypted(&path)
                .await?;
            print_file_id(&file_id);
        }
        Command::Download { file_id, output } => {
            check_expiration(&token)?;
            let output = output.unwrap_or_else(|| PathBuf::from("."));
            let path = TransferSession::new(&client)
                .with_progress(&progress)
                .download_encrypted(&FileId(file_id), &output)
                .await?;
            info!("saved to {}", path.display());
        }
        Command::Rm { file_id } => {
            let file_id = FileId(file_id);
            client.remove_file(&file_id).await?;
            info!("removed {file_id}");
        }
        Command::Check => {
            let claims = token.claims()?;
            check_claims(&claims)?;
            let quota = client.box_info(&claims.email).await?;
            print_account(&claims, &quota);
        }
    }
    Ok(())
}

/// Refuses to start a transfer with an expired token.
///
/// Tokens that are not JWTs are left for the server to judge.
fn check_expiration(token: &AccessToken) -> Result<()> {
    match token.claims() {
        Ok(claims) => check_claims(&claims),
        Err(err) => {
            debug!("cannot read access token claims: {err:#}");
            Ok(())
        }
    }
}

fn check_claims(claims: &TokenClaims) -> Result<()> {
    ensure!(
        !claims.is_expired(),
        "access token expired on {}",
        format_rfc3339_seconds(claims.expires_at)
    );
    Ok(())
}

#[expect(clippy::print_stdout, reason = "account summary is the output of the command")]
fn print_account(claims: &TokenClaims, quota: &BoxInfo) {
    println!("Token:");
    println!("  email: {}", claims.email);
    println!("  expires: {}", format_rfc3339_seconds(claims.expires_at));
    println!("Box:");
    println!("  capacity: {} MB", quota.capacity_mb);
    println!("  used: {} MB", quota.used_mb);
    println!("  remaining: {} MB", quota.remaining_mb);
}

#[expect(clippy::print_stdout, reason = "the file id is the output of the command")]
fn print_file_id(file_id: &FileId) {
    println!("{file_id}");
}

#[expect(clippy::print_stderr, reason = "logger is not available yet")]
#[inline]
pub fn setup_logger(log_file: Option<&Path>, log_filter: &str) -> Result<()> {
    // Defaults to stdout if `data_local_dir()` fails.
    let log_file = log_file.map(Path::to_path_buf).or_else(|| {
        default_log_path()
            .inspect_err(|err| eprintln!("{err}"))
            .ok()
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_writer(log_file.as_deref())?));
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_new(log_filter)?)
        .with(TermLayer)
        .try_init()?;
    Ok(())
}
