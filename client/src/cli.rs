use {
    anyhow::{Context as _, Result},
    clap::{Parser, Subcommand},
    std::path::PathBuf,
};

const APP_DIR: &str = "eph";

#[derive(Debug, Parser)]
#[command(version, about = "Share files through ephemeralfiles with end-to-end encryption")]
pub struct Cli {
    /// Configuration file. Defaults to `eph/config.json5` in the user config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Do not display the transfer status line.
    #[arg(long)]
    pub no_progress_bar: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Encrypt and upload a file. Prints the id of the uploaded file.
    Upload { path: PathBuf },
    /// Download and decrypt a file.
    Download {
        file_id: String,
        /// Output file or directory. Defaults to the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a stored file.
    Rm { file_id: String },
    /// Check the access token and show the storage quota. Fails if the token has expired.
    Check,
}

#[inline]
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("cannot find config dir")?;
    Ok(dir.join(APP_DIR).join("config.json5"))
}

#[inline]
pub fn default_log_path() -> Result<PathBuf> {
    let dir = dirs::data_local_dir().context("cannot find data dir")?;
    Ok(dir.join(APP_DIR).join("eph.log"))
}
