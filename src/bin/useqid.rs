use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use uniprot_seqid::app::App;
use uniprot_seqid::config::{ConfigLoader, ResolvedConfig};
use uniprot_seqid::domain::SchemeTag;
use uniprot_seqid::error::SeqidError;
use uniprot_seqid::output::JsonOutput;
use uniprot_seqid::store::FsStore;
use uniprot_seqid::transport::UniprotHttpTransport;

#[derive(Parser)]
#[command(name = "useqid")]
#[command(about = "Resolve protein identifiers to UniProt accessions and fetch their metadata")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (default: ./useqid.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Cache key for this run; reruns with the same key resume from cache
    #[arg(long, global = true)]
    cache_key: Option<String>,

    /// Skip the on-disk cache entirely
    #[arg(long, global = true)]
    no_cache: bool,

    /// Suppress progress messages on stderr
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Batch-map identifiers from one scheme into another")]
    Map(MapArgs),
    #[command(about = "Resolve identifiers of unknown scheme one by one")]
    Resolve(IdArgs),
    #[command(about = "Discover which schemes each identifier belongs to")]
    Probe(ProbeArgs),
    #[command(about = "Fetch and parse UniProt records for accessions")]
    Metadata(IdArgs),
    #[command(about = "Classify raw identifiers, map them and attach metadata")]
    Identify(IdArgs),
    #[command(about = "Rebuild isoform sequences from a local flat-record file")]
    Isoforms(IsoformArgs),
    #[command(about = "Remove cached entries")]
    Clear(ClearArgs),
}

#[derive(Args)]
struct IdArgs {
    ids: Vec<String>,

    /// Read additional identifiers from a file, one per line
    #[arg(long)]
    file: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct MapArgs {
    #[arg(long)]
    from: String,

    #[arg(long, default_value = SchemeTag::ACCESSION)]
    to: String,

    #[command(flatten)]
    ids: IdArgs,
}

#[derive(Args)]
struct ProbeArgs {
    #[command(flatten)]
    ids: IdArgs,

    /// Probe only these schemes instead of the full universe
    #[arg(long, value_delimiter = ',')]
    schemes: Vec<String>,
}

#[derive(Args)]
struct IsoformArgs {
    #[arg(long)]
    input: Utf8PathBuf,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ClearArgs {
    /// Only remove entries whose key starts with this prefix
    prefix: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SeqidError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SeqidError) -> u8 {
    match error {
        SeqidError::NotFound(_)
        | SeqidError::ConfigRead(_)
        | SeqidError::ConfigParse(_)
        | SeqidError::ConfigValue(_) => 2,
        SeqidError::Transport(_)
        | SeqidError::TransportStatus { .. }
        | SeqidError::ServiceError(_) => 3,
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
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let output = JsonOutput::new(cli.quiet);
    let store = FsStore::new_with_root(config.cache_dir.clone());

    let cache_key = |default: String| -> Option<String> {
        if cli.no_cache {
            None
        } else {
            Some(cli.cache_key.clone().unwrap_or(default))
        }
    };

    match cli.command {
        Commands::Map(args) => {
            let from: SchemeTag = args.from.parse()?;
            let to: SchemeTag = args.to.parse()?;
            let ids = collect_ids(&args.ids)?;
            let app = http_app(&config, store)?;
            let key = cache_key(format!("map.{from}.{to}"));
            let result = app.map(&from, &to, &ids, key.as_deref(), &output)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Resolve(args) => {
            let ids = collect_ids(&args)?;
            let app = http_app(&config, store)?;
            let key = cache_key("resolve".to_string());
            let result = app.resolve(&ids, key.as_deref(), &output)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Probe(args) => {
            let ids = collect_ids(&args.ids)?;
            let schemes = args
                .schemes
                .iter()
                .map(|code| code.parse::<SchemeTag>())
                .collect::<Result<Vec<_>, _>>()?;
            let app = http_app(&config, store)?;
            let key = cache_key("probe".to_string());
            let result = if schemes.is_empty() {
                app.probe(&ids, key.as_deref(), &output)?
            } else {
                app.probe_schemes(&ids, schemes, key.as_deref(), &output)?
            };
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Metadata(args) => {
            let ids = collect_ids(&args)?;
            let app = http_app(&config, store)?;
            let key = cache_key("metadata".to_string());
            let result = app.metadata(&ids, key.as_deref(), &output)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Identify(args) => {
            let ids = collect_ids(&args)?;
            let app = http_app(&config, store)?;
            let key = cache_key("identify".to_string());
            let result = app.identify(&ids, key.as_deref(), &output)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Isoforms(args) => {
            let app = http_app(&config, store)?;
            let result = app.isoforms(&args.input, args.output.as_deref(), &output)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Clear(args) => {
            let app = http_app(&config, store)?;
            let result = app.clear(args.prefix.as_deref(), &output)?;
            JsonOutput::print(&result).into_diagnostic()
        }
    }
}

fn http_app(
    config: &ResolvedConfig,
    store: FsStore,
) -> Result<App<UniprotHttpTransport, FsStore>, SeqidError> {
    let transport = UniprotHttpTransport::new(config.transport.clone())?;
    Ok(App::new(transport, store, config.batch_size))
}

fn collect_ids(args: &IdArgs) -> Result<Vec<String>, SeqidError> {
    let mut ids = args.ids.clone();
    if let Some(path) = &args.file {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| SeqidError::Filesystem(format!("{path}: {err}")))?;
        ids.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    if ids.iter().any(|id| id.trim().is_empty()) || ids.is_empty() {
        return Err(SeqidError::EmptyIdentifier);
    }
    Ok(ids)
}
