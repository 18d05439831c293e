//! Macroframe CLI: inspect series stores and build working frames.
//!
//! Commands:
//! - `check`: validate the structure of one store
//! - `describe`: list the requested series a store holds
//! - `load`: read one store into a wide frame
//! - `build`: build the merged working frame described by a manifest

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use macroframe_core::domain::descriptions_frame;
use macroframe_core::export::{descriptions_to_csv, descriptions_to_json, write_csv};
use macroframe_core::stamp::now_stamp;
use macroframe_core::{
    frame_fingerprint, DbSource, ExcelSource, Manifest, RowType, SeriesSource, SheetSelector,
    StoreSchema,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "macroframe",
    about = "Macroframe CLI: load macroeconomic series into year-indexed frames"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the structure of a store.
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Describe the requested series present in a store.
    Describe {
        #[command(flatten)]
        source: SourceArgs,

        /// Print descriptions as JSON instead of a table.
        #[arg(long, default_value_t = false, conflicts_with = "csv")]
        json: bool,

        /// Print descriptions as CSV instead of a table.
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Read a store into a wide frame.
    Load {
        #[command(flatten)]
        source: SourceArgs,

        /// Also write the frame as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Build the merged working frame described by a manifest.
    Build {
        /// Path to a TOML manifest.
        #[arg(long)]
        manifest: PathBuf,

        /// Also write the frame as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

/// One store and the series requested from it.
#[derive(Args)]
struct SourceArgs {
    /// SQLite store.
    #[arg(long, conflicts_with = "excel", required_unless_present = "excel")]
    sqlite: Option<PathBuf>,

    /// Excel workbook.
    #[arg(long)]
    excel: Option<PathBuf>,

    /// Row type: FACT, EXOG_R, EXOG_P or MODEL. Selects the sheet layout.
    #[arg(long, default_value = "FACT")]
    row_type: RowType,

    /// Series codes, comma separated.
    #[arg(long, required = true, value_delimiter = ',')]
    codes: Vec<String>,

    /// Sheet name or zero-based index (Excel only). Defaults to YEAR.
    #[arg(long, conflicts_with = "sqlite")]
    sheet: Option<String>,

    /// Facts table name (SQLite only).
    #[arg(long, default_value = "datas")]
    data_table: String,

    /// Descriptions table name (SQLite only).
    #[arg(long, default_value = "headers")]
    header_table: String,
}

impl SourceArgs {
    fn open(&self) -> Result<Box<dyn SeriesSource>> {
        let codes = self.codes.iter().map(|c| c.trim().to_string());
        let source: Box<dyn SeriesSource> = match (&self.sqlite, &self.excel) {
            (Some(path), None) => {
                let schema = StoreSchema::new(&self.data_table, &self.header_table)?;
                Box::new(DbSource::with_schema(path, self.row_type, codes, schema)?)
            }
            (None, Some(path)) => {
                let sheet = self
                    .sheet
                    .as_deref()
                    .map(SheetSelector::from)
                    .unwrap_or_default();
                Box::new(ExcelSource::with_sheet(path, self.row_type, codes, sheet)?)
            }
            _ => bail!("exactly one of --sqlite or --excel is required"),
        };
        Ok(source)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check { source } => run_check(&source),
        Commands::Describe { source, json, csv } => run_describe(&source, json, csv),
        Commands::Load { source, csv } => run_load(&source, csv.as_deref()),
        Commands::Build { manifest, csv } => run_build(&manifest, csv.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "macroframe=debug" } else { "macroframe=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr).compact())
        .init();
}

fn run_check(args: &SourceArgs) -> Result<()> {
    let source = args.open()?;
    println!("{source}");

    if source.check()? {
        println!("structure ok");
        Ok(())
    } else {
        eprintln!("structure does not match the expected layout");
        std::process::exit(1);
    }
}

fn run_describe(args: &SourceArgs, json: bool, csv: bool) -> Result<()> {
    let source = args.open()?;
    let descriptions = source.describe()?;

    if json {
        println!("{}", descriptions_to_json(&descriptions)?);
    } else if csv {
        print!("{}", descriptions_to_csv(&descriptions)?);
    } else {
        println!("{}", descriptions_frame(&descriptions)?);
    }
    Ok(())
}

fn run_load(args: &SourceArgs, csv: Option<&Path>) -> Result<()> {
    let mut source = args.open()?;
    let frame = source.make_frame()?.clone();

    println!("{source}");
    println!("{frame}");
    println!("Fingerprint: {}", frame_fingerprint(&frame)?);
    print_missing(args.row_type, &source.missing_codes()?);

    if let Some(path) = csv {
        write_csv(&frame, path)?;
        println!("CSV written to: {}", path.display());
    }
    Ok(())
}

fn run_build(manifest_path: &Path, csv: Option<&Path>) -> Result<()> {
    let manifest = Manifest::from_file(manifest_path)
        .with_context(|| format!("failed to load manifest {}", manifest_path.display()))?;
    let work = manifest.build()?;
    let stamp = now_stamp();
    info!(manifest = %manifest_path.display(), %stamp, "build finished");

    for source in &work.sources {
        println!("{source}");
    }
    println!("{}", work.frame);
    println!("Fingerprint: {}", frame_fingerprint(&work.frame)?);
    println!("Built at: {stamp}");
    for (row_type, missing) in &work.missing {
        print_missing(*row_type, missing);
    }

    if let Some(path) = csv {
        write_csv(&work.frame, path)?;
        println!("CSV written to: {}", path.display());
    }
    Ok(())
}

fn print_missing(row_type: RowType, missing: &[String]) {
    if !missing.is_empty() {
        println!("Missing from {row_type}: {}", missing.join(", "));
    }
}
