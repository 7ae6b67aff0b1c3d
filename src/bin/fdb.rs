use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use forgery_dataset_builder::app::App;
use forgery_dataset_builder::config::{Config, ConfigLoader, SourceEntry, SourceEntryObject};
use forgery_dataset_builder::domain::SourceId;
use forgery_dataset_builder::error::DatasetError;
use forgery_dataset_builder::exif;
use forgery_dataset_builder::fetch::HttpArchiveClient;
use forgery_dataset_builder::kaggle::SystemKaggleClient;
use forgery_dataset_builder::output::{
    ConsoleProgress, JsonOutput, OutputMode, print_build_summary, print_exif_summary,
};

#[derive(Parser)]
#[command(name = "fdb")]
#[command(about = "Builds a unified image-forgery dataset with a CSV manifest")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    build: BuildArgs,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write JPEG copies carrying fabricated EXIF metadata")]
    Exif(ExifArgs),
}

#[derive(Args)]
struct ExifArgs {
    #[arg(long, value_name = "DIR", default_value = exif::DEFAULT_INPUT_DIR)]
    input: PathBuf,

    #[arg(long, value_name = "DIR", default_value = exif::DEFAULT_OUTPUT_DIR)]
    output: PathBuf,
}

#[derive(Args)]
struct BuildArgs {
    /// Root of the unified output tree.
    #[arg(long)]
    output_root: Option<String>,

    /// Directory holding downloaded archives and extractions.
    #[arg(long)]
    cache_dir: Option<String>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    download_columbia: bool,

    #[arg(long, value_name = "N")]
    columbia_sample: Option<usize>,

    #[arg(long)]
    download_micc: bool,

    #[arg(long, value_name = "N")]
    micc_sample: Option<usize>,

    /// Fetch CoMoFoD through the kaggle CLI.
    #[arg(long)]
    comofod: bool,

    #[arg(long, value_name = "N")]
    comofod_sample: Option<usize>,

    /// Pre-extracted CoMoFoD directory; skips the kaggle download.
    #[arg(long, value_name = "DIR")]
    comofod_path: Option<String>,

    /// Local CASIA 2.0 directory.
    #[arg(long, value_name = "DIR")]
    casia_path: Option<String>,

    #[arg(long, value_name = "N")]
    casia_sample: Option<usize>,

    #[arg(long)]
    download_imd2020: bool,

    #[arg(long, value_name = "N")]
    imd2020_sample: Option<usize>,

    /// Seed for per-source sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Seed for the manifest row shuffle.
    #[arg(long)]
    shuffle_seed: Option<u64>,

    /// Abort on the first failing source.
    #[arg(long)]
    fail_fast: bool,
}

/// Flag layer of the configuration. Sample sizes given without their enable
/// flag only apply to a source the config file enables.
struct FlagLayer {
    config_path: Option<String>,
    config: Config,
    sample_overrides: Vec<(SourceId, usize)>,
}

impl BuildArgs {
    fn into_layer(self) -> FlagLayer {
        let mut sources = Vec::new();
        let mut sample_overrides = Vec::new();
        let mut add = |id: SourceId, enabled: bool, path: Option<String>, sample: Option<usize>| {
            if enabled {
                sources.push(SourceEntry::Detailed(SourceEntryObject {
                    id: id.as_str().to_string(),
                    path,
                    sample,
                }));
            } else if let Some(sample) = sample {
                sample_overrides.push((id, sample));
            }
        };

        add(
            SourceId::Columbia,
            self.download_columbia,
            None,
            self.columbia_sample,
        );
        add(SourceId::MiccF220, self.download_micc, None, self.micc_sample);
        let comofod_enabled = self.comofod
            || self.comofod_path.is_some()
            || self.comofod_sample.is_some_and(|sample| sample > 0);
        add(
            SourceId::Comofod,
            comofod_enabled,
            self.comofod_path,
            self.comofod_sample,
        );
        add(
            SourceId::Casia,
            self.casia_path.is_some(),
            self.casia_path,
            self.casia_sample,
        );
        add(
            SourceId::Imd2020,
            self.download_imd2020,
            None,
            self.imd2020_sample,
        );

        FlagLayer {
            config_path: self.config,
            config: Config {
                schema_version: None,
                output_root: self.output_root,
                cache_dir: self.cache_dir,
                seed: self.seed,
                shuffle_seed: self.shuffle_seed,
                fail_fast: self.fail_fast.then_some(true),
                sources,
            },
            sample_overrides,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DatasetError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DatasetError) -> u8 {
    match error {
        DatasetError::EmptyDataset
        | DatasetError::UnknownSource(_)
        | DatasetError::ConfigRead(_)
        | DatasetError::ConfigParse(_)
        | DatasetError::InvalidConfig(_) => 2,
        DatasetError::Download(_)
        | DatasetError::DownloadStatus { .. }
        | DatasetError::Extraction(_)
        | DatasetError::MissingTool(_)
        | DatasetError::KaggleDownload(_) => 3,
        DatasetError::InsufficientData { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Some(Commands::Exif(args)) => run_exif(args, mode),
        None => run_build(cli.build, mode),
    }
}

fn run_build(args: BuildArgs, mode: OutputMode) -> miette::Result<()> {
    let layer = args.into_layer();
    let base = match layer.config_path {
        Some(path) => ConfigLoader::load(&path)?,
        None => Config::default(),
    };
    let mut resolved = ConfigLoader::resolve_config(base.merge(layer.config))?;
    for (id, sample) in layer.sample_overrides {
        resolved.override_sample(id, sample)?;
    }

    let archives = HttpArchiveClient::new()?;
    let kaggle = SystemKaggleClient::new();
    let app = App::new(archives, kaggle);

    match mode {
        OutputMode::Human => {
            let result = app.build(&resolved, &ConsoleProgress)?;
            print_build_summary(&result);
        }
        OutputMode::Json => {
            let result = app.build(&resolved, &JsonOutput)?;
            JsonOutput::print_build(&result).into_diagnostic()?;
        }
    }
    Ok(())
}

fn run_exif(args: ExifArgs, mode: OutputMode) -> miette::Result<()> {
    let result = exif::inject_dir(&args.input, &args.output)?;
    match mode {
        OutputMode::Human => print_exif_summary(&result),
        OutputMode::Json => JsonOutput::print_exif(&result).into_diagnostic()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(args: &[&str]) -> FlagLayer {
        let mut argv = vec!["fdb"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().build.into_layer()
    }

    #[test]
    fn sample_without_enable_flag_becomes_override() {
        let layer = layer(&["--output-root", "out", "--imd2020-sample", "5"]);
        assert!(layer.config.sources.is_empty());
        assert_eq!(layer.sample_overrides, vec![(SourceId::Imd2020, 5)]);

        let mut resolved = ConfigLoader::resolve_config(layer.config).unwrap();
        let err = resolved.override_sample(SourceId::Imd2020, 5).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidConfig(_)));
    }

    #[test]
    fn comofod_sample_implies_comofod() {
        let layer = layer(&["--output-root", "out", "--comofod-sample", "3"]);
        assert_eq!(layer.config.sources.len(), 1);
        assert!(layer.sample_overrides.is_empty());
    }

    #[test]
    fn exif_subcommand_defaults() {
        let cli = Cli::try_parse_from(["fdb", "exif"]).unwrap();
        let Some(Commands::Exif(args)) = cli.command else {
            panic!("expected exif subcommand");
        };
        assert_eq!(args.input, PathBuf::from(exif::DEFAULT_INPUT_DIR));
        assert_eq!(args.output, PathBuf::from(exif::DEFAULT_OUTPUT_DIR));
    }
}
