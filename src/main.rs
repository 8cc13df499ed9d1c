use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lyrics_tagger::executor::Concurrency;
use lyrics_tagger::lrclib::{LrclibClient, DEFAULT_BASE_URL};
use lyrics_tagger::lyrics::LyricsStage;
use lyrics_tagger::metadata::{FfmpegTagWriter, MetadataStage, ReplaceStrategy};
use lyrics_tagger::pipeline::Pipeline;
use lyrics_tagger::progress::{format_duration, set_log_only, RunProgress};
use lyrics_tagger::report::RunReport;
use lyrics_tagger::safety::validate_report_path;
use lyrics_tagger::scan::{collect_music_files, DirScanner};

#[derive(Parser)]
#[command(name = "lyrics-tagger")]
#[command(about = "Fetch lyrics from LRCLIB and embed them into MP3/OGG files")]
struct Args {
    /// Audio file or directory to process
    #[arg(short, long, default_value = ".")]
    input: PathBuf,

    /// Descend into sub-directories
    #[arg(short, long)]
    recursive: bool,

    /// Look up lyrics only; never touch the files
    #[arg(short, long)]
    simulate: bool,

    /// Path to the ffmpeg executable (default: search PATH)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    lrclib_url: String,

    /// Concurrent ffmpeg invocations (default: one per file)
    #[arg(long)]
    write_concurrency: Option<NonZeroUsize>,

    /// How a tagged copy replaces the original
    #[arg(long, value_enum, default_value_t = ReplaceStrategy::RenameOver)]
    replace: ReplaceStrategy,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Hide progress bars and log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write a JSON report of every file to this path
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

/// Validated run configuration.
struct Settings {
    files: Vec<PathBuf>,
    /// `None` in simulate mode.
    writer: Option<FfmpegTagWriter>,
    write_concurrency: Concurrency,
    /// Resolved `--report` path.
    report: Option<PathBuf>,
}

fn init_logging(args: &Args) -> Result<()> {
    let default = if args.verbose {
        "lyrics_tagger=debug"
    } else {
        "lyrics_tagger=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn make_settings(args: &Args, progress: &RunProgress) -> Result<Settings> {
    let report = args.report.as_deref().map(validate_report_path).transpose()?;

    let spinner = progress.spinner(&format!("Scanning {}", args.input.display()));
    let files = collect_music_files(&DirScanner, &args.input, args.recursive);
    spinner.finish_and_clear();
    let files = files.with_context(|| format!("Failed to read input {}", args.input.display()))?;

    let writer = if args.simulate {
        None
    } else {
        Some(FfmpegTagWriter::discover(args.ffmpeg.as_deref()).context("Failed to locate ffmpeg")?)
    };

    Ok(Settings {
        files,
        writer,
        write_concurrency: args.write_concurrency.map(Concurrency::Bounded).unwrap_or_default(),
        report,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    init_logging(&args)?;

    let start = Instant::now();
    let progress = RunProgress::new();
    let settings = make_settings(&args, &progress)?;
    info!(
        files = settings.files.len(),
        simulate = args.simulate,
        "Found {} audio files under {}",
        settings.files.len(),
        args.input.display()
    );
    if let Some(writer) = &settings.writer {
        info!("Using {}", writer.program().display());
    }

    let lyrics = LyricsStage::new(LrclibClient::new(&args.lrclib_url))
        .with_progress(progress.stage("lyrics"));
    let pipeline = match settings.writer {
        Some(writer) => Pipeline::new(
            lyrics,
            MetadataStage::new(writer, settings.write_concurrency)
                .with_replace_strategy(args.replace)
                .with_progress(progress.stage("metadata")),
        ),
        None => Pipeline::<_, FfmpegTagWriter>::simulate(lyrics),
    };

    let outcomes = pipeline.run(settings.files);
    let report = RunReport::new(pipeline.is_simulate(), &outcomes);
    let elapsed = start.elapsed();

    println!("\n{:=<60}", "");
    if report.simulate {
        println!("Simulation complete!");
    } else {
        println!("Tagging complete!");
    }
    println!("  Files: {}", report.summary);
    for (kind, count) in &report.failures_by_kind {
        println!("    {}: {}", kind.as_str(), count);
    }
    println!("  Elapsed: {}", format_duration(elapsed));
    println!("{:=<60}", "");

    if let Some(path) = &settings.report {
        // Files are already tagged; a failed report is not fatal.
        match report.write_to_file(path) {
            Ok(()) => println!("Report written to {}", path.display()),
            Err(e) => warn!("{:#}", e),
        }
    }

    Ok(())
}
