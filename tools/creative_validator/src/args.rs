use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "creative_validator",
    version,
    about = "Policy and runtime checks for HTML5 ad-creative ZIP bundles"
)]
pub struct Args {
    /// Path to the creative .zip
    pub zip_path: PathBuf,

    /// TOML configuration file (ADZIP_* environment variables still apply)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory that receives one scratch directory per run
    #[arg(long, default_value = "runs")]
    pub runs_dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Write report.json into the run directory
    #[arg(long)]
    pub save: bool,

    /// Skip the runtime probe even when a browser is available
    #[arg(long)]
    pub no_browser: bool,

    /// Chrome/Chromium executable for the runtime probe
    #[arg(long)]
    pub chrome: Option<PathBuf>,

    /// Name to report instead of the file name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
