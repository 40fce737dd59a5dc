// healthops CLI - consolidate, validate and aggregate health-insurer disclosures

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use healthops_cli::exit_codes::{EXIT_NO_ACCEPTED_ROWS, EXIT_SUCCESS};
use healthops_cli::report::RunReport;
use healthops_cli::{fetch, pipeline, CliError};
use healthops_config::PipelineConfig;
use healthops_recon::PositivityPolicy;

#[derive(Parser)]
#[command(name = "healthops")]
#[command(about = "Consolidate quarterly expense disclosures and reconcile them against the operator registry")]
#[command(version)]
struct Cli {
    /// Pipeline config (TOML). Defaults to the per-user config file when present
    #[arg(long, global = true, env = "HEALTHOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consolidate the corpus, then validate and package it
    #[command(after_help = "\
Examples:
  healthops run
  healthops run --corpus downloads_ans --registry-file csv/Relatorio_cadop.csv
  healthops run --positivity flag_suspicious --json")]
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Stage A: raw corpus to the consolidated archive
    Consolidate {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Stage B: consolidated archive plus registry to the delivery archive
    Validate {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Download (or locate in the cache) the registry CSV and print its path
    FetchRegistry {
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Args)]
struct Overrides {
    /// Root of the raw disclosure tree
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Directory for archives and datasets
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Local registry CSV; skips the network
    #[arg(long)]
    registry_file: Option<PathBuf>,

    /// Registry directory index URL
    #[arg(long, env = "HEALTHOPS_REGISTRY_URL")]
    registry_url: Option<String>,

    /// Registry cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Non-positive amounts: strict_drop or flag_suspicious
    #[arg(long)]
    positivity: Option<PositivityPolicy>,
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(dir) = self.corpus {
            config.input.corpus_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if let Some(path) = self.registry_file {
            config.registry.path = Some(path);
        }
        if let Some(url) = self.registry_url {
            config.registry.url = url;
        }
        if let Some(dir) = self.cache_dir {
            config.registry.cache_dir = dir;
        }
        if let Some(policy) = self.positivity {
            config.normalize.positivity = policy;
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("warn,healthops={level}")),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();
}

fn load_config(explicit: Option<PathBuf>, overrides: Overrides) -> Result<PipelineConfig, CliError> {
    let mut config = PipelineConfig::resolve(explicit.as_deref())?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn emit(report: &RunReport, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", report.to_json().map_err(CliError::general)?);
    }
    eprint!("{}", report.human_summary());
    if report.accepted_rows() == 0 {
        return Err(CliError {
            code: EXIT_NO_ACCEPTED_ROWS,
            message: "no rows accepted; nothing was archived".into(),
            hint: Some("check the corpus directory and the skipped-file reasons above".into()),
        });
    }
    Ok(())
}

fn cmd_run(config: &PipelineConfig, json: bool) -> Result<(), CliError> {
    let report = pipeline::run(config)?;
    emit(&report, json)
}

fn cmd_consolidate(config: &PipelineConfig, json: bool) -> Result<(), CliError> {
    let report = RunReport { consolidate: Some(pipeline::consolidate(config)?), validate: None };
    emit(&report, json)
}

fn cmd_validate(config: &PipelineConfig, json: bool) -> Result<(), CliError> {
    let report = RunReport { consolidate: None, validate: Some(pipeline::validate(config)?) };
    emit(&report, json)
}

fn cmd_fetch_registry(config: &PipelineConfig, json: bool) -> Result<(), CliError> {
    let source = fetch::acquire(&config.registry)?;
    if json {
        let value = serde_json::json!({
            "path": source.path.display().to_string(),
            "origin": source.origin,
        });
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        println!("{}", source.path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = cli.config;
    let json = cli.json;
    let result = match cli.command {
        Commands::Run { overrides } => load_config(config, overrides).and_then(|c| cmd_run(&c, json)),
        Commands::Consolidate { overrides } => {
            load_config(config, overrides).and_then(|c| cmd_consolidate(&c, json))
        }
        Commands::Validate { overrides } => {
            load_config(config, overrides).and_then(|c| cmd_validate(&c, json))
        }
        Commands::FetchRegistry { overrides } => {
            load_config(config, overrides).and_then(|c| cmd_fetch_registry(&c, json))
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
