use std::fmt;

use chrono::{DateTime, Utc};
use course_core::model::{BlockId, Catalog, Cursor, FontSize, ProgressDraft, ProgressState};
use storage::repository::Storage;
use storage::snapshot::ProgressSnapshot;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    completed: u32,
    master: bool,
    name: Option<String>,
    font: Option<FontSize>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCompleted { raw: String },
    InvalidDbUrl { raw: String },
    InvalidFont { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCompleted { raw } => write!(f, "invalid --completed value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidFont { raw } => write!(f, "invalid --font value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("COURSE_DB_URL").unwrap_or_else(|_| "sqlite:course.sqlite3".into());
        let mut completed = 0;
        let mut master = false;
        let mut name = None;
        let mut font = None;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--completed" => {
                    let value = require_value(&mut args, "--completed")?;
                    completed = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCompleted { raw: value.clone() })?;
                }
                "--master" => master = true,
                "--name" => name = Some(require_value(&mut args, "--name")?),
                "--font" => {
                    let value = require_value(&mut args, "--font")?;
                    font = Some(
                        value
                            .parse::<FontSize>()
                            .map_err(|_| ArgsError::InvalidFont { raw: value.clone() })?,
                    );
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            completed,
            master,
            name,
            font,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:course.sqlite3)");
    eprintln!("  --completed <n>           Mark the first n blocks as completed (default: 0)");
    eprintln!("  --master                  Also mark the final exam as passed");
    eprintln!("  --name <name>             Student name for the certificate");
    eprintln!("  --font <size>             Font size label or CSS value");
    eprintln!("  --now <rfc3339>           Fixed savedAt time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = Catalog::standard();
    let completed_blocks: Vec<BlockId> = (1..=args.completed).map(BlockId::new).collect();

    // Park the cursor on the furthest block the learner can reach.
    let frontier = BlockId::new(args.completed + 1);
    let cursor = catalog
        .block(frontier)
        .or_else(|| catalog.block(catalog.last_block_id()))
        .map(|block| Cursor {
            block: block.id(),
            lesson: block.first_lesson().id(),
        });

    let state = ProgressState::restore(
        &catalog,
        ProgressDraft {
            completed_blocks,
            cursor,
            master_completed: args.master,
            student_name: args.name.clone(),
            font_size: args.font,
            ..ProgressDraft::default()
        },
    );

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    storage
        .snapshots()
        .save(&ProgressSnapshot::from_state(&state, now))
        .await?;

    println!(
        "Seeded progress with {} completed blocks (master: {}) for {} into {}",
        state.completed_blocks().len(),
        state.master_completed(),
        state.student_name(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
