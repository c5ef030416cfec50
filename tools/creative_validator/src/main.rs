use adzip_core::config;
use adzip_core::report::{render, ErrorReport};
use adzip_core::run::RunWorkspace;
use adzip_core::{CapabilitySet, CoreError, CreativeValidator};
use anyhow::{Context, Result};
use clap::Parser;

mod args;

const EXIT_PASS: i32 = 0;
const EXIT_RED: i32 = 1;
const EXIT_INVALID: i32 = 2;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = args::Args::parse();

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("creative_validator failed: {:#}", e);
            eprintln!("creative_validator: {:#}", e);
            EXIT_INVALID
        }
    };
    std::process::exit(code);
}

fn run(args: &args::Args) -> Result<i32> {
    let mut cfg = config::load(args.config.as_deref()).context("loading configuration")?;
    if args.no_browser {
        cfg.probe.enabled = false;
    }
    if let Some(path) = &args.chrome {
        cfg.probe.chrome_path = Some(path.clone());
    }

    let bytes = std::fs::read(&args.zip_path)
        .with_context(|| format!("reading {}", args.zip_path.display()))?;
    let name = match &args.name {
        Some(n) => n.clone(),
        None => args
            .zip_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.zip".to_string()),
    };

    let caps = CapabilitySet::detect(&cfg);
    let workspace = RunWorkspace::create(&args.runs_dir)
        .with_context(|| format!("creating run directory under {}", args.runs_dir.display()))?;
    let validator = CreativeValidator::new(cfg, caps);

    let report = match validator.analyze(&bytes, &name, &workspace) {
        Ok(r) => r,
        Err(e @ CoreError::InvalidArchive(_)) => {
            println!("{}", serde_json::to_string_pretty(&ErrorReport::from(&e))?);
            return Ok(EXIT_INVALID);
        }
        Err(e) => return Err(e.into()),
    };

    if args.save {
        let path = workspace.write_report(&report)?;
        log::info!("report written to {}", path.display());
    }

    let output = match args.format {
        args::OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        args::OutputFormat::Text => render::render_text(&report),
    };
    println!("{output}");

    Ok(if report.has_red() { EXIT_RED } else { EXIT_PASS })
}
