mod replay;
mod reports;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

use replay::{ReplayOptions, read_dump, run, split_csv, write_dump};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored human-readable summary
    Console,
    /// Machine-readable report
    Json,
    /// Markdown tables
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "roomtrack-tester", version)]
#[command(about = "Replay a room tracker storage dump through load, migration and save")]
struct Args {
    /// Storage dump: a JSON object of localStorage keys to string values
    #[arg(long)]
    input: PathBuf,

    /// Cells to summarize (comma-separated, e.g. R2C2,R4C1); default is every cell with data
    #[arg(long, default_value = "")]
    cells: String,

    /// Export file to import after loading
    #[arg(long)]
    import: Option<PathBuf>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Output file (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the storage contents after the replay to this file
    #[arg(long)]
    write_dump: Option<PathBuf>,

    /// Directory to write a dated export file into
    #[arg(long)]
    export: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.report == ReportFormat::Console && args.output.is_none() {
        announce_banner();
    }

    let storage = read_dump(&args.input)?;
    let import = args
        .import
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))
        })
        .transpose()?;
    let options = ReplayOptions {
        cells: split_csv(&args.cells),
        import,
    };
    let replay = run(&storage, &options)?;

    if let Some(path) = &args.write_dump {
        std::fs::write(path, write_dump(&storage)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    if let Some(dir) = &args.export {
        let name = roomtrack_core::export_file_name(chrono::Local::now().date_naive());
        let path = dir.join(name);
        let body = roomtrack_core::export_json(&replay.state)?;
        std::fs::write(&path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("exported to {}", path.display());
    }

    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report {
        ReportFormat::Json => reports::generate_json_report(&mut output_target, &replay.report)?,
        ReportFormat::Markdown => {
            reports::generate_markdown_report(&mut output_target, &replay.report)?;
        }
        ReportFormat::Console => {
            reports::generate_console_report(&mut output_target, &replay.report)?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn announce_banner() {
    println!("{}", "🚪 Room Tracker Replay".bright_cyan().bold());
    println!("{}", "======================".cyan());
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
