//! valmon - validation event monitor CLI
//!
//! The `valmon` command replays newline-delimited JSON validation events
//! through the monitoring engine.
//!
//! ## Commands
//!
//! - `replay`: apply an event stream and print every session view with its digest
//! - `check`: validate an event stream without applying it

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};

use valmon_core::config::{ENV_KEEP_RECENT, ENV_MAX_EVENTS};
use valmon_core::{
    EngineConfig, EngineError, IdGenerator, MonitorEngine, RawEvent, SequentialIds, SessionView,
    UuidIds,
};

/// Session used for events that name none when no `--session` is given.
const DEFAULT_SESSION: &str = "default";

/// Lines buffered between the reader task and the engine.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "valmon")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live validation-event monitor", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL event stream and print the resulting session views
    Replay {
        /// Input file, or `-` for stdin
        input: PathBuf,

        /// Apply every event to this session
        #[arg(short, long)]
        session: Option<String>,

        /// Summarize once the recent window grows past this many events
        #[arg(long, env = ENV_MAX_EVENTS)]
        max: Option<usize>,

        /// Events kept in the recent window after a summarization
        #[arg(long, env = ENV_KEEP_RECENT)]
        keep: Option<usize>,

        /// Mint random UUID ids instead of reproducible sequential ones
        #[arg(long)]
        uuid_ids: bool,

        /// Apply the whole stream as one delivery per session
        #[arg(long)]
        batch: bool,
    },

    /// Validate a JSONL event stream without applying it
    Check {
        /// Input file, or `-` for stdin
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    valmon_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Replay {
            input,
            session,
            max,
            keep,
            uuid_ids,
            batch,
        } => {
            let options = ReplayOptions {
                session,
                max,
                keep,
                uuid_ids,
                batch,
            };
            cmd_replay(&input, options).await
        }
        Commands::Check { input } => cmd_check(&input).await,
    }
}

/// Options for `valmon replay`.
#[derive(Debug, Clone, Default)]
struct ReplayOptions {
    session: Option<String>,
    max: Option<usize>,
    keep: Option<usize>,
    uuid_ids: bool,
    batch: bool,
}

impl ReplayOptions {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::from_env().context("Invalid engine configuration")?;
        if let Some(max) = self.max {
            config.max_events_before_summarize = max;
        }
        if let Some(keep) = self.keep {
            config.keep_recent_events = keep;
        }
        Ok(config)
    }
}

/// One input line handed from the reader task to the consumer.
#[derive(Debug)]
struct InputLine {
    number: usize,
    text: String,
}

/// A line that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineError {
    line: usize,
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionReport {
    digest: String,
    view: SessionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport {
    sessions: Vec<SessionReport>,
    rejected: Vec<LineError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    valid: usize,
    malformed: Vec<LineError>,
}

async fn open_input(path: &PathBuf) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open event stream: {:?}", path))?;
    Ok(Box::new(file))
}

/// Read lines on a separate task so parsing and I/O never interleave with
/// engine mutation. Blank lines are skipped.
fn spawn_reader<R>(reader: R) -> (mpsc::Receiver<InputLine>, tokio::task::JoinHandle<Result<()>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut number = 0;
        while let Some(text) = lines.next_line().await.context("Failed to read input")? {
            number += 1;
            if text.trim().is_empty() {
                continue;
            }
            if tx.send(InputLine { number, text }).await.is_err() {
                debug!("consumer dropped, stopping reader");
                break;
            }
        }
        Ok(())
    });
    (rx, handle)
}

fn parse_line(line: &InputLine) -> std::result::Result<RawEvent, LineError> {
    serde_json::from_str(&line.text).map_err(|e| LineError {
        line: line.number,
        error: format!("invalid JSON: {e}"),
    })
}

fn target_session(raw: &RawEvent, forced: Option<&str>) -> String {
    forced
        .or(raw.session_id.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

/// Drain the channel into one engine. This task is the only writer.
async fn replay_stream<R>(reader: R, options: &ReplayOptions) -> Result<ReplayReport>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let ids: Box<dyn IdGenerator> = if options.uuid_ids {
        Box::new(UuidIds)
    } else {
        Box::new(SequentialIds::new())
    };
    let mut engine = MonitorEngine::with_id_generator(options.engine_config()?, ids)
        .context("Failed to build engine")?;

    let (mut rx, reader_task) = spawn_reader(reader);
    let mut rejected = Vec::new();
    let mut pending: BTreeMap<String, Vec<(usize, RawEvent)>> = BTreeMap::new();

    while let Some(line) = rx.recv().await {
        let mut raw = match parse_line(&line) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(line = err.line, error = %err.error, "skipping unparseable line");
                rejected.push(err);
                continue;
            }
        };
        let session = target_session(&raw, options.session.as_deref());
        if options.session.is_some() {
            raw.session_id = Some(session.clone());
        }

        if options.batch {
            pending.entry(session).or_default().push((line.number, raw));
            continue;
        }
        match engine.apply_event(&session, raw) {
            Ok(_) => {}
            Err(EngineError::Malformed(err)) => rejected.push(LineError {
                line: line.number,
                error: err.to_string(),
            }),
            Err(err) => return Err(err).context(format!("Engine failure at line {}", line.number)),
        }
    }
    reader_task.await.context("Reader task panicked")??;

    for (session, events) in pending {
        let (lines, raws): (Vec<usize>, Vec<RawEvent>) = events.into_iter().unzip();
        match engine.apply_events(&session, raws) {
            Ok(report) => rejected.extend(report.rejected.into_iter().map(|r| LineError {
                line: lines[r.index],
                error: r.error.to_string(),
            })),
            Err(EngineError::DeliveryRejected {
                rejected: dropped, ..
            }) => rejected.extend(dropped.into_iter().map(|r| LineError {
                line: lines[r.index],
                error: r.error.to_string(),
            })),
            Err(err) => return Err(err).context(format!("Engine failure in session {session}")),
        }
    }

    let mut sessions = Vec::new();
    for session_id in engine.session_ids() {
        let view = engine.view(&session_id)?;
        let digest = view.digest().context("Failed to digest session view")?;
        sessions.push(SessionReport { digest, view });
    }
    rejected.sort_by_key(|r| r.line);

    Ok(ReplayReport { sessions, rejected })
}

/// Validate every line the way `replay` would, without applying anything.
async fn check_stream<R>(reader: R) -> Result<CheckReport>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut engine =
        MonitorEngine::with_id_generator(EngineConfig::default(), Box::new(SequentialIds::new()))
            .context("Failed to build engine")?;
    let (mut rx, reader_task) = spawn_reader(reader);
    let mut valid = 0;
    let mut malformed = Vec::new();

    while let Some(line) = rx.recv().await {
        let checked = parse_line(&line).and_then(|raw| {
            let session = target_session(&raw, None);
            engine
                .check_event(&session, raw)
                .map(|_| ())
                .map_err(|e| LineError {
                    line: line.number,
                    error: e.to_string(),
                })
        });
        match checked {
            Ok(()) => valid += 1,
            Err(err) => malformed.push(err),
        }
    }
    reader_task.await.context("Reader task panicked")??;

    Ok(CheckReport { valid, malformed })
}

/// Replay an event stream and print the resulting views
async fn cmd_replay(input: &PathBuf, options: ReplayOptions) -> Result<()> {
    let reader = open_input(input).await?;
    let report = replay_stream(reader, &options).await?;

    info!(
        sessions = report.sessions.len(),
        rejected = report.rejected.len(),
        "replay finished"
    );
    valmon_core::METRICS.flush();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Validate an event stream without applying it
async fn cmd_check(input: &PathBuf) -> Result<()> {
    let reader = open_input(input).await?;
    let report = check_stream(reader).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.malformed.is_empty() {
        bail!(
            "{} malformed event(s) out of {}",
            report.malformed.len(),
            report.malformed.len() + report.valid
        );
    }
    Ok(())
}
