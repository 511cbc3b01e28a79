//! climate-subsidies CLI
//!
//! # Stages
//!
//! ```bash
//! climate-subsidies format-raw   # raw extracts -> canonical tables
//! climate-subsidies analysis     # canonical tables -> chart_1_data / chart_2_data
//! climate-subsidies charts       # analysis tables -> chart_1_base / chart_2_base
//! climate-subsidies run          # all three, in order
//! ```
//!
//! # Helpers
//!
//! ```bash
//! climate-subsidies g20-codes    # G20 donor DAC codes as JSON
//! climate-subsidies config       # effective configuration as JSON
//! ```
//!
//! Configuration comes from `.env` and the `CLIMATE_SUBSIDIES_*` variables
//! (see [`climate_subsidies::config`]).

use clap::{Parser, Subcommand};
use climate_subsidies::logs::{log_error, LogLevel, RUN_LOG};
use climate_subsidies::{
    g20_donor_codes, run_all, run_analysis, run_charts, run_format_raw, CountryCatalog,
    EntityResolver, PipelineConfig, PipelineError, StageReport,
};

#[derive(Parser)]
#[command(name = "climate-subsidies")]
#[command(about = "Compare climate finance commitments with fossil fuel subsidies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format the raw extracts into the canonical tables
    FormatRaw,

    /// Build chart_1_data.csv and chart_2_data.csv from the canonical tables
    Analysis,

    /// Build the chart-ready tables from the analysis tables
    Charts,

    /// Run every stage in order
    Run,

    /// Print the G20 donor DAC codes as JSON
    G20Codes,

    /// Print the effective configuration as JSON
    Config,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = PipelineConfig::from_env()
        .map_err(PipelineError::from)
        .and_then(|config| match cli.command {
            Commands::FormatRaw => run_format_raw(&config).map(|r| print_reports(&[r])),
            Commands::Analysis => run_analysis(&config).map(|r| print_reports(&[r])),
            Commands::Charts => run_charts(&config).map(|r| print_reports(&[r])),
            Commands::Run => run_all(&config).map(|r| print_reports(&r)),
            Commands::G20Codes => cmd_g20_codes(),
            Commands::Config => cmd_config(&config),
        });

    if let Err(e) = result {
        log_error(format!("Error: {e}"));
        std::process::exit(1);
    }
}

fn print_reports(reports: &[StageReport]) {
    for report in reports {
        eprintln!("\n📦 {}", report.stage);
        for output in &report.outputs {
            eprintln!("   {} ({} rows)", output.path.display(), output.rows);
        }
        if report.warnings > 0 {
            eprintln!("   ⚠️  {} warning(s)", report.warnings);
        }
    }
    eprintln!(
        "\n✨ Done ({} warning(s), {} error(s))",
        RUN_LOG.count(LogLevel::Warning),
        RUN_LOG.count(LogLevel::Error)
    );
}

fn cmd_g20_codes() -> Result<(), PipelineError> {
    let catalog = CountryCatalog::embedded()?;
    let mut resolver = EntityResolver::new(catalog);
    let codes = g20_donor_codes(&mut resolver)?;
    println!("{}", serde_json::to_string(&codes)?);
    Ok(())
}

fn cmd_config(config: &PipelineConfig) -> Result<(), PipelineError> {
    println!("{}", config.to_json()?);
    Ok(())
}
