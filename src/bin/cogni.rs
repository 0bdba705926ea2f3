//! Cogni CLI - Command-line interface for CogniMetrics
//!
//! Commands:
//! - score: Score session snapshots into composite records
//! - select: Draw the next adaptive questionnaire for a subject
//! - trend: Classify the trend of an assessment history
//! - bank: Print the standard question bank
//! - new-id: Generate subject ids

use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cognimetrics::pipeline::{compute_session, AssessmentEngine, SessionInput};
use cognimetrics::selector::select_with_window;
use cognimetrics::store::{generate_patient_id, AssessmentStore, InMemoryStore};
use cognimetrics::trend::{classify_trend, order_most_recent_first};
use cognimetrics::types::{CompositeAssessmentRecord, QuestionResponseLogEntry};
use cognimetrics::{EngineConfig, EngineError, QuestionBank, ENGINE_VERSION};

/// Cogni - Cognitive assessment scoring and adaptive questionnaires
#[derive(Parser)]
#[command(name = "cogni")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score cognitive assessment sessions and select questionnaires", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score session snapshots into composite records
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Assessment store file; sessions are persisted and trends reported
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Draw the next adaptive questionnaire for a subject
    Select {
        /// Subject id
        #[arg(long)]
        patient_id: String,

        /// Response log file (JSON array of log entries)
        #[arg(long, conflicts_with = "store")]
        log: Option<PathBuf>,

        /// Assessment store file to read the response log from
        #[arg(long)]
        store: Option<PathBuf>,

        /// Custom question bank file (JSON array of items)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Number of questions (overrides configuration)
        #[arg(long)]
        count: Option<usize>,

        /// RNG seed for reproducible selection
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Classify the trend of an assessment history
    Trend {
        /// History file (JSON array of composite records, any order)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Subject to filter the history to
        #[arg(long)]
        patient_id: Option<String>,
    },

    /// Print the standard question bank
    Bank {
        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Generate subject ids
    NewId {
        /// How many ids to generate
        #[arg(long, default_value = "1")]
        count: usize,

        /// RNG seed for reproducible ids
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one session per line)
    Ndjson,
    /// A single session object or a JSON array of sessions
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<SessionInput>),
    One(Box<SessionInput>),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CogniCliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            store,
        } => cmd_score(&input, &output, input_format, output_format, store.as_deref(), config),
        Commands::Select {
            patient_id,
            log,
            store,
            bank,
            count,
            seed,
            output_format,
        } => cmd_select(
            &patient_id,
            log.as_deref(),
            store.as_deref(),
            bank.as_deref(),
            count,
            seed,
            output_format,
            &config,
        ),
        Commands::Trend { input, patient_id } => cmd_trend(&input, patient_id.as_deref()),
        Commands::Bank { output_format } => {
            let bank = QuestionBank::standard();
            write_output(Path::new("-"), &format_output(bank.items(), &output_format)?)
        }
        Commands::NewId { count, seed } => {
            let mut rng = seeded_rng(seed);
            for _ in 0..count {
                println!("{}", generate_patient_id(&mut rng));
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CogniCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn read_input(input: &Path) -> Result<String, CogniCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), CogniCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn parse_sessions(data: &str, format: InputFormat) -> Result<Vec<SessionInput>, CogniCliError> {
    let sessions = match format {
        InputFormat::Ndjson => data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str::<SessionInput>(line).map_err(|e| {
                    CogniCliError::ParseError(format!("Failed to parse session on line {}: {}", i + 1, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        InputFormat::Json => match serde_json::from_str::<OneOrMany>(data)? {
            OneOrMany::Many(sessions) => sessions,
            OneOrMany::One(session) => vec![*session],
        },
    };

    for session in &sessions {
        session.validate()?;
    }
    if sessions.is_empty() {
        return Err(CogniCliError::NoSessions);
    }
    Ok(sessions)
}

fn load_store(path: &Path) -> Result<InMemoryStore, CogniCliError> {
    if !path.exists() {
        info!(path = %path.display(), "store file not found, starting empty");
        return Ok(InMemoryStore::new());
    }
    Ok(InMemoryStore::from_json(&fs::read_to_string(path)?)?)
}

fn cmd_score(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    store_path: Option<&Path>,
    config: EngineConfig,
) -> Result<(), CogniCliError> {
    let sessions = parse_sessions(&read_input(input)?, input_format)?;

    let output_data = match store_path {
        None => {
            let records: Vec<CompositeAssessmentRecord> = sessions.iter().map(compute_session).collect();
            format_output(&records, &output_format)?
        }
        Some(path) => {
            let store = load_store(path)?;
            let mut engine = AssessmentEngine::with_config(store, QuestionBank::standard(), config)?;
            let mut outcomes = Vec::with_capacity(sessions.len());
            for session in &sessions {
                outcomes.push(engine.complete_session(session)?);
            }
            fs::write(path, engine.store().to_json()?)?;
            format_output(&outcomes, &output_format)?
        }
    };

    write_output(output, &output_data)
}

#[allow(clippy::too_many_arguments)]
fn cmd_select(
    patient_id: &str,
    log_path: Option<&Path>,
    store_path: Option<&Path>,
    bank_path: Option<&Path>,
    count: Option<usize>,
    seed: Option<u64>,
    output_format: OutputFormat,
    config: &EngineConfig,
) -> Result<(), CogniCliError> {
    let log: Vec<QuestionResponseLogEntry> = match (log_path, store_path) {
        (Some(path), _) => serde_json::from_str(&fs::read_to_string(path)?)?,
        (None, Some(path)) => load_store(path)?.load_response_log(patient_id)?,
        (None, None) => Vec::new(),
    };

    let bank = match bank_path {
        Some(path) => QuestionBank::from_json(&fs::read_to_string(path)?)?,
        None => QuestionBank::standard(),
    };

    let mut rng = seeded_rng(seed);
    let questions = select_with_window(
        patient_id,
        &log,
        &bank,
        count.unwrap_or(config.questions_per_session),
        config.response_history_window,
        &mut rng,
    )?;

    write_output(Path::new("-"), &format_output(&questions, &output_format)?)
}

fn cmd_trend(input: &Path, patient_id: Option<&str>) -> Result<(), CogniCliError> {
    let mut history: Vec<CompositeAssessmentRecord> = serde_json::from_str(&read_input(input)?)?;
    if let Some(patient_id) = patient_id {
        history.retain(|r| r.patient_id == patient_id);
    }
    order_most_recent_first(&mut history);

    let report = classify_trend(&history);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn format_output<T: Serialize>(records: &[T], format: &OutputFormat) -> Result<String, CogniCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum CogniCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoSessions,
    ParseError(String),
}

impl From<io::Error> for CogniCliError {
    fn from(e: io::Error) -> Self {
        CogniCliError::Io(e)
    }
}

impl From<EngineError> for CogniCliError {
    fn from(e: EngineError) -> Self {
        CogniCliError::Engine(e)
    }
}

impl From<serde_json::Error> for CogniCliError {
    fn from(e: serde_json::Error) -> Self {
        CogniCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CogniCliError> for CliError {
    fn from(e: CogniCliError) -> Self {
        match e {
            CogniCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CogniCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that answers reference administered questions".to_string()),
            },
            CogniCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CogniCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No sessions found in input".to_string(),
                hint: Some("Provide at least one session object".to_string()),
            },
            CogniCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be one session object".to_string()),
            },
        }
    }
}
