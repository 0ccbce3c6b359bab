use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::Context;
use autodocgen::{
    cli,
    config::{Config, RunOptions},
    demo::DemoUsage,
    logging,
    pipeline::{self, DocumentationPipeline, ProjectSource, RunHandle},
    render::{self, RenderFormat},
    ui::{self, RunProgress},
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "autodocgen", author, version, about = "Generate documentation for a code project with Claude")]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Document a project directory or archive
    Generate(GenerateArgs),
    /// List the files a run would document, without calling the API
    Scan(ScanArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
struct GenerateArgs {
    /// Project directory or .zip/.tar/.tar.gz archive
    source: PathBuf,

    /// Directory the exports are written to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export formats
    #[arg(short, long, value_enum, value_delimiter = ',', default_value = "markdown")]
    format: Vec<RenderFormat>,

    #[command(flatten)]
    run: RunOptions,

    /// Skip the project overview
    #[arg(long)]
    no_overview: bool,

    /// Skip the directory structure
    #[arg(long)]
    no_tree: bool,
}

#[derive(Args)]
struct ScanArgs {
    /// Project directory or archive
    source: PathBuf,

    #[command(flatten)]
    run: RunOptions,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("{}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            cli::print_error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?.with_env_overrides(),
        None => Config::load()?,
    };

    match cli.command {
        Command::Generate(args) => generate(config, args).await,
        Command::Scan(args) => scan(config, args).await,
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn generate(mut config: Config, args: GenerateArgs) -> anyhow::Result<ExitCode> {
    cli::print_banner();

    if config.api_keys.resolve().is_err() && std::io::stdin().is_terminal() {
        if cli::confirm("No valid Anthropic API key found. Enter one now?")? {
            config.api_keys.anthropic_api_key = None;
            config.api_keys.prompt_missing_keys()?;
        }
    }

    let mut options = args.run.clone();
    options.generate_overview = Some(!args.no_overview);
    options.generate_directory_structure = Some(!args.no_tree);
    let mut run = options.to_run_config(&config);
    let output_dir = args.output.clone().unwrap_or_else(|| config.output_dir.clone());

    let mut formats: Vec<RenderFormat> = Vec::new();
    for format in &args.format {
        if !formats.contains(format) {
            formats.push(*format);
        }
    }

    let source = ProjectSource::from_path(&args.source)
        .with_context(|| format!("Cannot document {}", args.source.display()))?;

    let demo = config.api_keys.resolve_key().map(|key| key.demo).unwrap_or(false);
    if demo {
        run = config.demo.restrict(run);
        let mut usage = DemoUsage::new(config.demo.clone());
        for format in &formats {
            usage.check_export(*format)?;
        }
        let report = pipeline::scan(&config, &source, &run).await?;
        let bytes = report.files.iter().map(|f| f.size).sum();
        usage.check_files(report.files.len(), bytes)?;
        cli::print_warning(&format!(
            "Demo mode: {} detail, {} processing, {} files",
            run.detail_level,
            run.mode,
            report.files.len()
        ));
    }
    let pipeline = DocumentationPipeline::from_config(config)?;
    info!("Documenting {} ({}, {})", source.project_name(), run.detail_level, run.mode);

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = RunProgress::new().spawn(rx);
    let handle = RunHandle::new().with_progress(tx);

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the run");
            token.cancel();
        }
    });

    let set = pipeline.run(&source, run, handle).await?;
    progress.await?;

    for format in formats {
        let path = render::export(&set, format, &output_dir).await?;
        cli::print_info(&format!("Wrote {}", path.display()));
    }

    cli::print_summary(&set);
    Ok(if set.abort_reason().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn scan(config: Config, args: ScanArgs) -> anyhow::Result<ExitCode> {
    let run = args.run.to_run_config(&config);
    let source = ProjectSource::from_path(&args.source)
        .with_context(|| format!("Cannot scan {}", args.source.display()))?;

    let spinner = (!args.json).then(|| ui::spinner("Scanning project"));
    let report = pipeline::scan(&config, &source, &run).await?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        cli::print_scan(&report);
    }
    Ok(ExitCode::SUCCESS)
}
