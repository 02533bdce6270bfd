use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use tcl_analysis::api;
use tcl_analysis::core::{
    AnalysisEngine, DirSource, PolicyConfig, PolicyId, ReportFormat, Selection, report,
    todays_date,
};

#[derive(Parser, Debug)]
#[command(
    name = "tcl-analysis",
    about = "Scenario analysis for two-child limit reform options (2026-2029 projections)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the analysis API over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Run one analysis and write a report file to disk.
    Report {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long, default_value = "text", help = "Report format: text or csv")]
        format: String,
        #[arg(long, default_value = "2026")]
        year: String,
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "full-abolition",
            help = "Comma-separated policy ids, e.g. full-abolition,three-child-limit"
        )]
        policies: Vec<String>,
        #[arg(long, help = "Child limit for the raised-limit policy (default 3)")]
        child_limit: Option<u32>,
        #[arg(long, help = "Age cutoff for the under-age exemption (default 5)")]
        age_limit: Option<u32>,
        #[arg(long, help = "Third-child element rate, 0.5 to 1.0 (default 0.7)")]
        reduction_rate: Option<f64>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Serve { port, data_dir } => {
            if let Err(e) = api::run_http_server(port, data_dir).await {
                error!(%e, "server error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Command::Report {
            data_dir,
            format,
            year,
            policies,
            child_limit,
            age_limit,
            reduction_rate,
            out_dir,
        } => {
            match write_report(
                data_dir,
                &format,
                year,
                &policies,
                child_limit,
                age_limit,
                reduction_rate,
                out_dir,
            )
            .await
            {
                Ok(path) => {
                    println!("wrote {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(%e, "report failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn write_report(
    data_dir: PathBuf,
    format: &str,
    year: String,
    policies: &[String],
    child_limit: Option<u32>,
    age_limit: Option<u32>,
    reduction_rate: Option<f64>,
    out_dir: PathBuf,
) -> Result<PathBuf, String> {
    let format = ReportFormat::from_str(format).ok_or("format must be text or csv")?;

    let mut selected = Vec::new();
    for slug in policies {
        let policy =
            PolicyId::from_str(slug).ok_or_else(|| format!("unknown policy: {slug}"))?;
        selected.push(policy);
    }

    let mut config = PolicyConfig::default();
    if let Some(v) = child_limit {
        config.child_limit = v;
    }
    if let Some(v) = age_limit {
        config.age_limit = v;
    }
    if let Some(v) = reduction_rate {
        if !(0.5..=1.0).contains(&v) {
            return Err("reduction-rate must be between 0.5 and 1.0".to_string());
        }
        config.reduction_rate = v;
    }
    let configs: HashMap<PolicyId, PolicyConfig> =
        selected.iter().map(|p| (*p, config)).collect();
    let selection = Selection::from_parts(selected, configs, year)?;

    let engine = AnalysisEngine::new(DirSource::new(data_dir));
    let snapshot = engine
        .analyze(&selection)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("analysis superseded")?;

    let file = report(&snapshot, format, todays_date());
    let path = out_dir.join(&file.file_name);
    tokio::fs::write(&path, file.contents)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(path)
}
