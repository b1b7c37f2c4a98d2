use std::fmt;
use std::path::PathBuf;

use chrono::Duration;
use services::{
    AppServices, Clock, LevelUp, ProgressTracker, ResponseFeedback, SessionConfig, SessionError,
    SessionState, StudySession,
};
use storage::{BuiltinCatalog, CatalogProvider, JsonCatalog};
use study_core::model::{Level, ProgressSnapshot, SessionSummary, UserId};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

//
// ─── ARGS ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidLevel { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidLevel { raw } => write!(
                f,
                "invalid --level value (expected beginner, intermediate or expert): {raw}"
            ),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(value: String, flag: &'static str) -> Result<T, ArgsError> {
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    /// `None` keeps progress in memory only.
    db_url: Option<String>,
    user: UserId,
    level: Level,
    catalog: Option<PathBuf>,
    seed: Option<u64>,
    max_challenges: u32,
    minutes: Option<u32>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            db_url: Some("sqlite://study.sqlite3".into()),
            user: UserId::new(1),
            level: Level::Beginner,
            catalog: None,
            seed: None,
            max_challenges: 10,
            minutes: None,
        }
    }
}

enum Parsed {
    Run(Args),
    Help,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  study-buddy [--db <sqlite_url> | --memory] [--user <id>] [--level <level>]");
    eprintln!("              [--catalog <file.json>] [--seed <n>] [--max-challenges <n>]");
    eprintln!("              [--minutes <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://study.sqlite3");
    eprintln!("  --user 1");
    eprintln!("  --level beginner");
    eprintln!("  --max-challenges 10");
    eprintln!();
    eprintln!("While studying, type :hint for a hint, :end to finish, :quit to abandon.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_USER_ID, STUDY_LEVEL, RUST_LOG");
}

impl Args {
    fn parse(
        env: impl Fn(&str) -> Option<String>,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Parsed, ArgsError> {
        let mut parsed = Self::default();
        if let Some(url) = env("STUDY_DB_URL") {
            parsed.db_url = Some(normalize_sqlite_url(url));
        }
        if let Some(user) = env("STUDY_USER_ID").and_then(|v| v.trim().parse::<u64>().ok()) {
            parsed.user = UserId::new(user);
        }
        if let Some(level) = env("STUDY_LEVEL").and_then(|v| v.parse::<Level>().ok()) {
            parsed.level = level;
        }

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(normalize_sqlite_url(value));
                }
                "--memory" => parsed.db_url = None,
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let id: u64 = value
                        .trim()
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    parsed.user = UserId::new(id);
                }
                "--level" => {
                    let value = require_value(args, "--level")?;
                    parsed.level = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLevel { raw: value.clone() })?;
                }
                "--catalog" => {
                    parsed.catalog = Some(PathBuf::from(require_value(args, "--catalog")?));
                }
                "--seed" => {
                    parsed.seed = Some(parse_number(require_value(args, "--seed")?, "--seed")?);
                }
                "--max-challenges" => {
                    let value = require_value(args, "--max-challenges")?;
                    parsed.max_challenges = parse_number(value, "--max-challenges")?;
                }
                "--minutes" => {
                    let value = require_value(args, "--minutes")?;
                    parsed.minutes = Some(parse_number(value, "--minutes")?);
                }
                "--help" | "-h" => return Ok(Parsed::Help),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Parsed::Run(parsed))
    }

    fn session_config(&self) -> Result<SessionConfig, Box<dyn std::error::Error>> {
        let config = SessionConfig::new(self.max_challenges)?;
        let Some(minutes) = self.minutes else {
            return Ok(config);
        };
        let budget =
            Duration::try_minutes(i64::from(minutes)).ok_or_else(|| ArgsError::InvalidNumber {
                flag: "--minutes",
                raw: minutes.to_string(),
            })?;
        Ok(config.with_time_budget(budget)?)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

//
// ─── CONSOLE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input<'a> {
    Hint,
    End,
    Quit,
    Answer(&'a str),
}

impl<'a> Input<'a> {
    fn from_line(line: &'a str) -> Self {
        match line.trim() {
            ":hint" => Input::Hint,
            ":end" => Input::End,
            ":quit" => Input::Quit,
            _ => Input::Answer(line),
        }
    }
}

fn print_challenge(session: &StudySession) {
    let Some(presented) = session.current_challenge() else {
        return;
    };
    let challenge = &presented.challenge;
    let progress = session.progress();
    println!();
    println!(
        "[{}/{}] {} ({}, {} pts)",
        progress.answered + 1,
        progress.max_challenges,
        challenge.title,
        challenge.difficulty,
        challenge.points
    );
    if presented.fell_back {
        println!("  (nothing left at {}, moving on)", session.level());
    }
    println!("{}", challenge.prompt);
    if let Some(code) = &challenge.code_template {
        println!();
        for line in code.lines() {
            println!("    {line}");
        }
    }
}

fn print_feedback(feedback: &ResponseFeedback) {
    if feedback.event.is_correct {
        println!(
            "Correct! +{} pts (mastery {:.0}% -> {:.0}%)",
            feedback.event.points_awarded,
            feedback.event.mastery_before * 100.0,
            feedback.event.mastery_after * 100.0
        );
    } else {
        match &feedback.expected {
            Some(expected) => println!("Not quite. Expected: {expected}"),
            None => println!("Not quite."),
        }
    }
    if feedback.newly_mastered {
        println!("You mastered {}!", feedback.event.concept_id);
    }
    if let Some(warning) = &feedback.warning {
        println!("warning: {warning}");
    }
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!(
        "Session {:?}: {}/{} correct ({:.0}%), {} pts",
        summary.end(),
        summary.correct(),
        summary.total(),
        summary.accuracy() * 100.0,
        summary.score()
    );
    for delta in summary.mastery_deltas() {
        println!(
            "  {:<36} {:>4.0}% -> {:>4.0}%",
            delta.concept_id.as_str(),
            delta.before * 100.0,
            delta.after * 100.0
        );
    }
}

fn print_snapshot(snapshot: &ProgressSnapshot, level_up: &LevelUp) {
    println!();
    println!(
        "Overall level: {} | mastered {}/{} | streak {} day(s)",
        snapshot.overall_level,
        snapshot.mastered_concepts,
        snapshot.total_concepts,
        snapshot.streak_days
    );
    for level in &snapshot.levels {
        println!(
            "  {:<12} {}/{} mastered ({:.0}%)",
            level.level.as_str(),
            level.mastered,
            level.total,
            level.completion_percent
        );
    }
    for level in &level_up.completed_levels {
        println!("Level complete: {level}!");
    }
    if let Some(level) = level_up.new_overall_level {
        println!("Level up! You are now {level}.");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    Line(String),
    Eof,
    TimedOut,
}

/// Wait for the next input line, giving up once `budget` has elapsed.
async fn read_input<R>(
    lines: &mut Lines<R>,
    budget: Option<Duration>,
) -> std::io::Result<ReadOutcome>
where
    R: AsyncBufRead + Unpin,
{
    let line = match budget {
        Some(left) => {
            let left = left.to_std().unwrap_or(std::time::Duration::ZERO);
            match tokio::time::timeout(left, lines.next_line()).await {
                Ok(line) => line?,
                Err(_) => return Ok(ReadOutcome::TimedOut),
            }
        }
        None => lines.next_line().await?,
    };
    Ok(line.map_or(ReadOutcome::Eof, ReadOutcome::Line))
}

/// Drive one session from stdin until it finishes. EOF ends the session normally.
async fn study(
    session: &mut StudySession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<SessionSummary, Box<dyn std::error::Error>> {
    print_challenge(session);
    while session.state() == SessionState::InProgress {
        if session.check_time_budget() {
            println!("Time is up.");
            break;
        }
        let line = match read_input(lines, session.remaining_budget()).await? {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Eof => return Ok(session.end_session()?),
            ReadOutcome::TimedOut => continue,
        };
        match Input::from_line(&line) {
            Input::Hint => match session.next_hint() {
                Some(hint) => println!("hint: {hint}"),
                None => println!("No more hints."),
            },
            Input::End => return Ok(session.end_session()?),
            Input::Quit => return Ok(session.abort()?),
            Input::Answer(answer) => match session.submit_response(answer).await {
                Ok(feedback) => {
                    print_feedback(&feedback);
                    print_challenge(session);
                }
                Err(SessionError::TimeBudgetExhausted) => println!("Time is up."),
                Err(e) => return Err(e.into()),
            },
        }
    }
    Ok(session.end_session()?)
}

//
// ─── MAIN ──────────────────────────────────────────────────────────────────────
//

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn catalog_provider(args: &Args) -> Result<Box<dyn CatalogProvider>, Box<dyn std::error::Error>> {
    Ok(match &args.catalog {
        Some(path) => Box::new(JsonCatalog::from_path(path)?),
        None => Box::new(BuiltinCatalog),
    })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = match Args::parse(|key| std::env::var(key).ok(), &mut argv) {
        Ok(Parsed::Run(args)) => args,
        Ok(Parsed::Help) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            print_usage();
            return Err(e.into());
        }
    };

    let clock = Clock::default();
    let provider = catalog_provider(&args)?;
    let services = match &args.db_url {
        Some(url) => {
            prepare_sqlite_file(url)?;
            AppServices::new_sqlite(url, clock, provider.as_ref()).await?
        }
        None => AppServices::in_memory(clock, provider.as_ref())?,
    };

    let config = args.session_config()?;
    let seed = args.seed;
    let services = services.map_session_loop(|session_loop| {
        let session_loop = session_loop.with_config(config);
        match seed {
            Some(seed) => session_loop.with_seed(seed),
            None => session_loop,
        }
    });
    let session_loop = services.session_loop();
    tracing::info!(
        user = %args.user,
        level = %args.level,
        concepts = services.catalog().len(),
        "catalog ready"
    );

    let mut session = session_loop.open_session(args.user).await;
    for warning in session.warnings() {
        println!("warning: {warning}");
    }
    let before = session_loop.snapshot(session.tracker().state());

    session.start_study_session(args.level)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let summary = study(&mut session, &mut lines).await?;
    print_summary(&summary);

    let after = session_loop.snapshot(session.tracker().state());
    print_snapshot(&after, &ProgressTracker::level_ups(&before, &after));
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
