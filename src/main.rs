use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use iptlog_logs::{Address, EntryFilter, LogEntry, LogParser, LogReader, TailReader};

mod config;
mod output;

use config::Config;
use output::{OutputFormat, write_entry};

/// iptlog - parse and follow netfilter (iptables) kernel logs
#[derive(Parser, Debug)]
#[command(name = "iptlog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file to read
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Keep reading as new lines are appended
    #[arg(short, long)]
    follow: bool,

    /// When following, start at the beginning instead of the end
    #[arg(long, requires = "follow")]
    from_start: bool,

    /// Only entries with this source address (in any nested header)
    #[arg(long, value_name = "ADDR")]
    source: Option<Address>,

    /// Only entries logged with this chain or prefix (repeatable)
    #[arg(long = "chain", value_name = "CHAIN")]
    chains: Vec<String>,

    /// Only entries with this protocol (repeatable)
    #[arg(long = "proto", value_name = "PROTO")]
    protocols: Vec<String>,

    /// Only entries with this flag set, e.g. SYN (repeatable)
    #[arg(long = "flag", value_name = "FLAG")]
    flags: Vec<String>,

    /// Regex matched against the raw line
    #[arg(long, value_name = "REGEX")]
    grep: Option<String>,

    /// Case insensitive --grep
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Print entries that do not match the filters
    #[arg(long)]
    invert: bool,

    /// Print one JSON object per entry
    #[arg(long)]
    json: bool,

    /// Warn about malformed firewall lines instead of aborting
    #[arg(long)]
    skip_malformed: bool,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Delay between polls when following
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Year assumed for syslog timestamps (defaults to the current year)
    #[arg(long)]
    year: Option<i32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Settings resolved from the command line and config file
struct Settings {
    parser: LogParser,
    filter: EntryFilter,
    format: OutputFormat,
    skip_malformed: bool,
    poll_interval: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args) -> Result<()> {
    let settings = resolve_settings(&args)?;

    if args.follow {
        follow_file(&args, &settings).await
    } else {
        read_file(&args, &settings)
    }
}

fn resolve_settings(args: &Args) -> Result<Settings> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut parser = match args.year.or(config.year) {
        Some(year) => LogParser::new(year),
        None => LogParser::default(),
    };
    parser = parser.with_formats(config.formats()?);

    let pattern = args.grep.as_deref().unwrap_or("");
    let mut filter = if args.ignore_case {
        EntryFilter::new_case_insensitive(pattern)
    } else {
        EntryFilter::new(pattern)
    }
    .with_context(|| format!("Invalid --grep pattern '{}'", pattern))?;

    if let Some(source) = args.source {
        filter = filter.with_source(source);
    }
    if !args.chains.is_empty() {
        filter = filter.with_chains(args.chains.iter().cloned().collect::<HashSet<_>>());
    }
    if !args.protocols.is_empty() {
        filter = filter.with_protocols(args.protocols.iter().cloned().collect::<HashSet<_>>());
    }
    if !args.flags.is_empty() {
        filter = filter.with_flags(args.flags.clone());
    }
    if args.invert {
        filter = filter.inverted();
    }
    if filter.is_empty() {
        debug!("No filters set, printing every entry");
    } else {
        debug!(
            pattern = filter.pattern(),
            case_insensitive = filter.is_case_insensitive(),
            "Filtering entries with {:?}",
            filter
        );
    }

    let poll_interval = match args.poll_interval_ms {
        Some(ms) => Duration::from_millis(ms),
        None => config.poll_interval(),
    };

    Ok(Settings {
        parser,
        filter,
        format: if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        skip_malformed: args.skip_malformed || config.skip_malformed,
        poll_interval,
    })
}

/// Print every matching entry of a finished log file
fn read_file(args: &Args, settings: &Settings) -> Result<()> {
    let reader = LogReader::open(&args.path, settings.parser.clone())?;
    let mut out = io::stdout().lock();

    for result in reader {
        if let Some(entry) = accept(result, settings.skip_malformed)? {
            emit(&mut out, &entry, settings)?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Print matching entries as they are appended, until Ctrl-C
async fn follow_file(args: &Args, settings: &Settings) -> Result<()> {
    let mut tail = TailReader::new(&args.path, settings.parser.clone());
    if !args.from_start {
        let offset = tail.seek_to_end()?;
        info!("Following {} from offset {}", args.path.display(), offset);
    }

    let mut interval = tokio::time::interval(settings.poll_interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,

            _ = interval.tick() => {
                let mut out = io::stdout().lock();
                loop {
                    let result = match tail.poll_entry() {
                        Ok(Some(entry)) => Ok(entry),
                        Ok(None) => break,
                        Err(e) => Err(e),
                    };
                    if let Some(entry) = accept(result, settings.skip_malformed)? {
                        emit(&mut out, &entry, settings)?;
                    }
                }
                out.flush()?;
            }
        }
    }

    info!("Stopped at offset {}", tail.position());
    Ok(())
}

/// Apply the malformed-line policy to one read result
fn accept(
    result: iptlog_logs::Result<LogEntry>,
    skip_malformed: bool,
) -> Result<Option<LogEntry>> {
    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(e) if skip_malformed && e.parse_error().is_some() => {
            warn!("Skipping malformed line: {}", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn emit<W: Write>(out: &mut W, entry: &LogEntry, settings: &Settings) -> Result<()> {
    if settings.filter.matches(entry) {
        write_entry(out, entry, settings.format)?;
    }
    Ok(())
}
