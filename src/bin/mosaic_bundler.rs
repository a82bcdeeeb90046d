use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use mosaic_bundler::app::{App, BundleRequest, expand_granule_names};
use mosaic_bundler::config::{ConfigLoader, ConfigOverrides};
use mosaic_bundler::error::BundlerError;
use mosaic_bundler::output::JsonOutput;
use mosaic_bundler::retrieval::HttpRetrievalClient;

#[derive(Parser)]
#[command(name = "mosaic-bundler")]
#[command(about = "Compose spatio-temporal filters for mosaic granules and bundle the retrieved artifacts into one zip")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Retrieve artifacts and package the bundle")]
    Bundle(BundleArgs),
    #[command(about = "Compose the filters and retrieval URLs without downloading anything")]
    Plan(RequestArgs),
}

#[derive(Args)]
struct BundleArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// Path of the zip archive to produce
    #[arg(long)]
    output: Utf8PathBuf,
}

#[derive(Args)]
struct RequestArgs {
    /// Granule file names; one semicolon-packed value is also accepted
    #[arg(required = true)]
    granules: Vec<String>,

    #[arg(long)]
    mosaic_dir: Utf8PathBuf,

    #[arg(long)]
    workspace: String,

    #[arg(long)]
    layer: String,

    /// Start of the time interval (flexible date token)
    #[arg(long, default_value = "")]
    min_time: String,

    /// End of the time interval (flexible date token)
    #[arg(long, default_value = "")]
    max_time: String,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    geometry_field: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(bundler) = report.downcast_ref::<BundlerError>() {
            return ExitCode::from(map_exit_code(bundler));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BundlerError) -> u8 {
    match error {
        BundlerError::MissingSetting(_)
        | BundlerError::ConfigRead(_)
        | BundlerError::ConfigParse(_)
        | BundlerError::MissingTimeRegex(_)
        | BundlerError::InvalidTimeRegex(_) => 2,
        BundlerError::RetrievalHttp(_) | BundlerError::RetrievalStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Bundle(args) => {
            let (app, request) = build_app(&args.request)?;
            let result = app.run(&request, &args.output).into_diagnostic()?;
            JsonOutput::print_bundle(&result).into_diagnostic()?;
            Ok(())
        }
        Commands::Plan(args) => {
            let (app, request) = build_app(&args)?;
            let result = app.plan(&request).into_diagnostic()?;
            JsonOutput::print_plan(&result).into_diagnostic()?;
            Ok(())
        }
    }
}

fn build_app(args: &RequestArgs) -> miette::Result<(App<HttpRetrievalClient>, BundleRequest)> {
    let overrides = ConfigOverrides {
        base_url: args.base_url.clone(),
        geometry_field: args.geometry_field.clone(),
        output_dir: args.output_dir.clone(),
    };
    let config = ConfigLoader::resolve(args.config.as_deref(), overrides).into_diagnostic()?;
    let retrieval = HttpRetrievalClient::new().into_diagnostic()?;

    let granule_names = expand_granule_names(&args.granules).into_diagnostic()?;
    let request = BundleRequest {
        min_time: args.min_time.clone(),
        max_time: args.max_time.clone(),
        workspace: args.workspace.clone(),
        layer: args.layer.clone(),
        mosaic_dir: args.mosaic_dir.clone(),
        granule_names,
    };
    Ok((App::new(config, retrieval), request))
}
