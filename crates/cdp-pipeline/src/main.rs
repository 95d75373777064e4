//! CDP - Main entry point

use anyhow::{Context, Result};
use cdp_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use cdp_pipeline::{
    clean, ArchiveFanOut, CleanScope, PipelineConfig, PipelineExtractor, PipelineGenerator,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cdp")]
#[command(author, version, about = "Generate record archives and extract them into CSV tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate record archives
    Generate(ConfigArgs),

    /// Extract every archive into first.csv / second.csv (appends)
    Extract(ConfigArgs),

    /// Generate, then extract
    Run(ConfigArgs),

    /// Remove generated archives and output tables
    Clean {
        #[command(flatten)]
        config: ConfigArgs,

        /// Only remove archives
        #[arg(long, conflicts_with = "outputs_only")]
        archives_only: bool,

        /// Only remove first.csv / second.csv
        #[arg(long)]
        outputs_only: bool,
    },
}

/// Overrides applied on top of `.env` and the environment
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Number of archives to generate
    #[arg(long)]
    archives: Option<usize>,

    /// Number of record files per archive
    #[arg(long)]
    files: Option<usize>,

    /// Tasks per wave
    #[arg(long)]
    parallel: Option<usize>,

    /// Directory holding archives and output tables
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Archive-level fan-out: unbounded or waves
    #[arg(long)]
    archive_fan_out: Option<ArchiveFanOut>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load().context("Failed to load configuration")?;

        if let Some(archives) = self.archives {
            config.archives_number = archives;
        }
        if let Some(files) = self.files {
            config.files_number = files;
        }
        if let Some(parallel) = self.parallel {
            config.files_open_in_parallel = parallel;
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = dir.clone();
        }
        if let Some(fan_out) = self.archive_fan_out {
            config.archive_fan_out = fan_out;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("cdp")
        .build();

    // Environment variables take precedence over the defaults above
    let log_config = match LogConfig::from_env_over(log_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {:#}", e);
            process::exit(1);
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        },
    };

    if let Err(e) = execute(cli.command).await {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute(command: Command) -> Result<()> {
    match command {
        Command::Generate(args) => {
            let config = args.resolve()?;
            generate(config).await?;
        },
        Command::Extract(args) => {
            let config = args.resolve()?;
            extract(config).await?;
        },
        Command::Run(args) => {
            let config = args.resolve()?;
            generate(config.clone()).await?;
            extract(config).await?;
        },
        Command::Clean {
            config,
            archives_only,
            outputs_only,
        } => {
            let config = config.resolve()?;
            let scope = match (archives_only, outputs_only) {
                (true, _) => CleanScope::Archives,
                (_, true) => CleanScope::Outputs,
                _ => CleanScope::All,
            };
            let removed = clean(&config.working_dir, scope)?;
            println!("Removed {} file(s) from {}", removed, config.working_dir.display());
        },
    }

    Ok(())
}

async fn generate(config: PipelineConfig) -> Result<()> {
    let report = PipelineGenerator::new(config)
        .build()
        .await
        .context("Generation failed")?;

    println!(
        "Generated {} archive(s) with {} record(s) in {:.2}s",
        report.archives_built, report.total_records, report.duration_seconds
    );
    Ok(())
}

async fn extract(config: PipelineConfig) -> Result<()> {
    let extractor = PipelineExtractor::new(config);
    let report = extractor.proceed().await.context("Extraction failed")?;

    info!(
        first = %extractor.sinks().levels().path().display(),
        second = %extractor.sinks().objects().path().display(),
        "Output tables updated"
    );
    println!(
        "Extracted {} record(s) from {} archive(s): {} level row(s), {} object row(s) in {:.2}s",
        report.total_records,
        report.archives_processed,
        report.total_level_rows,
        report.total_object_rows,
        report.duration_seconds
    );
    Ok(())
}
