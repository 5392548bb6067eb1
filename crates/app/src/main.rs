use std::fmt;
use std::path::PathBuf;

use course_core::model::{Catalog, ExamKind, ExamPhase, FontSize, LessonId};
use services::{AppServices, Clock, CourseService, LessonLoad};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { what: &'static str, raw: String },
    InvalidLessonId { raw: String },
    InvalidFontSize { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, what } => {
                write!(f, "{command} requires {what}")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { what, raw } => write!(f, "invalid {what}: {raw}"),
            ArgsError::InvalidLessonId { raw } => {
                write!(f, "invalid lesson id (expected <block>-<lesson>): {raw}")
            }
            ArgsError::InvalidFontSize { raw } => write!(
                f,
                "invalid font size: {raw} (expected normal, large, extra or maximum)"
            ),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn require_arg(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
    what: &'static str,
) -> Result<String, ArgsError> {
    args.next()
        .ok_or(ArgsError::MissingArgument { command, what })
}

fn parse_index(raw: String, what: &'static str) -> Result<usize, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { what, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                      show progress and the current lesson");
    eprintln!("  lesson                      print the current lesson, generating it if needed");
    eprintln!("  goto <block>-<lesson>       move to a lesson (e.g. goto 2-3)");
    eprintln!("  next | prev                 move within the current block");
    eprintln!("  sections                    list the sections of the current lesson");
    eprintln!("  expand <section title>      deep-dive into one section");
    eprintln!("  exam start [--final]        start the block exam or the final exam");
    eprintln!("  exam show                   print the active exam");
    eprintln!("  answer <question> <option>  record an answer (both zero-based)");
    eprintln!("  submit | retry | close      grade, retake or leave the exam");
    eprintln!("  name <student name>         set the name printed on the certificate");
    eprintln!("  font <size>                 normal, large, extra or maximum");
    eprintln!("  certificate [--out <dir>]   write the master certificate PDF");
    eprintln!("  reset                       erase all progress");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://course.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_AI_API_KEY, COURSE_AI_BASE_URL, COURSE_AI_MODEL,");
    eprintln!("  COURSE_AI_EXAM_MODEL, COURSE_LANGUAGE, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Lesson,
    Goto(LessonId),
    Next,
    Prev,
    Sections,
    Expand(String),
    ExamStart(ExamKind),
    ExamShow,
    Answer { question: usize, option: usize },
    Submit,
    Retry,
    Close,
    Name(String),
    Font(FontSize),
    Certificate { out: PathBuf },
    Reset,
}

struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COURSE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://course.sqlite3".into(), normalize_sqlite_url);

        let mut command_word = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => {
                    command_word = Some(arg);
                    break;
                }
            }
        }

        let command = match command_word {
            None => Command::Status,
            Some(word) => Command::parse(&word, args)?,
        };
        Ok(Self { db_url, command })
    }
}

impl Command {
    fn parse(word: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let command = match word {
            "status" => Self::Status,
            "lesson" => Self::Lesson,
            "goto" => {
                let raw = require_arg(args, "goto", "a lesson id")?;
                let id = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidLessonId { raw: raw.clone() })?;
                Self::Goto(id)
            }
            "next" => Self::Next,
            "prev" => Self::Prev,
            "sections" => Self::Sections,
            "expand" => {
                let title = args.by_ref().collect::<Vec<_>>().join(" ");
                if title.trim().is_empty() {
                    return Err(ArgsError::MissingArgument {
                        command: "expand",
                        what: "a section title",
                    });
                }
                return Ok(Self::Expand(title));
            }
            "exam" => match require_arg(args, "exam", "start or show")?.as_str() {
                "start" => {
                    let mut is_final = false;
                    for arg in args.by_ref() {
                        match arg.as_str() {
                            "--final" => is_final = true,
                            _ => return Err(ArgsError::UnknownArg(arg)),
                        }
                    }
                    return Ok(Self::ExamStart(ExamKind::from_final_flag(is_final)));
                }
                "show" => Self::ExamShow,
                other => return Err(ArgsError::UnknownCommand(format!("exam {other}"))),
            },
            "answer" => {
                let question = parse_index(
                    require_arg(args, "answer", "a question number")?,
                    "question number",
                )?;
                let option = parse_index(
                    require_arg(args, "answer", "an option number")?,
                    "option number",
                )?;
                Self::Answer { question, option }
            }
            "submit" => Self::Submit,
            "retry" => Self::Retry,
            "close" => Self::Close,
            "name" => {
                let name = args.by_ref().collect::<Vec<_>>().join(" ");
                return Ok(Self::Name(name));
            }
            "font" => {
                let raw = require_arg(args, "font", "a size")?;
                let size = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidFontSize { raw: raw.clone() })?;
                Self::Font(size)
            }
            "certificate" => {
                let mut out = PathBuf::from(".");
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--out" => out = PathBuf::from(require_value(args, "--out")?),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                return Ok(Self::Certificate { out });
            }
            "reset" => Self::Reset,
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
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
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

fn print_status(course: &CourseService) {
    let state = course.progress();
    let catalog = course.catalog();
    println!(
        "{} · {}% complete · font {}",
        state.student_name(),
        course.progress_percent(),
        state.font_size()
    );
    for block in catalog.blocks() {
        let marker = if state.is_completed(block.id()) {
            "done"
        } else if state.is_unlocked(block.id()) {
            "open"
        } else {
            "locked"
        };
        println!("  [{marker:>6}] Block {}: {}", block.id(), block.title());
        println!("           {}", block.description());
    }
    if state.master_completed() {
        println!("Final exam passed. Run `certificate` to download your certificate.");
    }
    if let Some(lesson) = course.current_lesson() {
        println!("Current lesson {}: {}", lesson.id(), lesson.title());
    }
    if state.exam().phase() != ExamPhase::Idle {
        println!("Exam {}.", state.exam().phase());
    }
}

fn print_current_lesson(course: &CourseService) {
    let Some(lesson) = course.current_lesson() else {
        return;
    };
    println!("# {} ({})", lesson.title(), lesson.id());
    if let Some(marker) = course_boundary(course.catalog(), lesson.id()) {
        println!("{marker}");
    }
    match course.progress().lesson_text(lesson.id()) {
        Some(text) => println!("\n{text}"),
        None => println!("\nLesson content is not available yet."),
    }
}

fn course_boundary(catalog: &Catalog, lesson: LessonId) -> Option<&'static str> {
    if catalog.is_first_lesson(lesson) {
        Some("First lesson of the course.")
    } else if catalog.is_last_lesson(lesson) {
        Some("Last lesson of the course. The final exam follows.")
    } else {
        None
    }
}

async fn follow_load(load: LessonLoad) {
    if let LessonLoad::Spawned(handle) = load {
        if let Err(err) = handle.await {
            tracing::warn!(%err, "lesson generation task failed");
        }
    }
}

fn print_exam(course: &CourseService) {
    let state = course.progress();
    let exam = state.exam();
    match exam.phase() {
        ExamPhase::Idle => println!("No exam in progress."),
        ExamPhase::Loading => println!("Exam is still being generated."),
        ExamPhase::InProgress | ExamPhase::Graded => {
            let answers = exam.answers();
            for (index, question) in exam.questions().iter().enumerate() {
                println!("{index}. {}", question.text());
                let chosen = answers.and_then(|answers| answers.get(&index)).copied();
                for (option, text) in question.options().iter().enumerate() {
                    let mark = if chosen == Some(option) { '*' } else { ' ' };
                    println!("   {mark}{option}) {text}");
                }
            }
            if let Some(result) = exam.result() {
                let verdict = if result.passed() { "passed" } else { "failed" };
                println!("Score {} of {}: {verdict}.", result.score(), exam.questions().len());
            }
        }
    }
}

async fn execute(course: &CourseService, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Status => print_status(course),
        Command::Lesson => {
            if course.load_current_lesson().await?.is_none() {
                println!("Lesson is already being generated; try again shortly.");
            }
            print_current_lesson(course);
        }
        Command::Goto(lesson) => {
            follow_load(course.select_lesson(lesson.block(), lesson)?).await;
            print_current_lesson(course);
        }
        Command::Next => match course.next_lesson()? {
            Some(load) => {
                follow_load(load).await;
                print_current_lesson(course);
            }
            None => println!("This is the last lesson of the block."),
        },
        Command::Prev => match course.previous_lesson()? {
            Some(load) => {
                follow_load(load).await;
                print_current_lesson(course);
            }
            None => println!("This is the first lesson of the block."),
        },
        Command::Sections => {
            for title in course.current_sections() {
                println!("- {title}");
            }
        }
        Command::Expand(section) => {
            let text = course.expand_section(&section).await?;
            println!("## {section}\n\n{text}");
        }
        Command::ExamStart(kind) => {
            course.start_exam(kind).await?;
            print_exam(course);
        }
        Command::ExamShow => print_exam(course),
        Command::Answer { question, option } => {
            course.answer_question(question, option)?;
        }
        Command::Submit => {
            let result = course.submit_exam()?;
            print_exam(course);
            if result.passed() && course.progress().master_completed() {
                println!("Congratulations, you completed the master programme.");
            }
        }
        Command::Retry => {
            course.retry_exam().await?;
            print_exam(course);
        }
        Command::Close => course.close_exam()?,
        Command::Name(name) => course.set_student_name(&name)?,
        Command::Font(size) => course.set_font_size(size),
        Command::Certificate { out } => {
            let certificate = course.certificate()?;
            std::fs::create_dir_all(&out)?;
            let path = out.join(&certificate.file_name);
            std::fs::write(&path, &certificate.bytes)?;
            println!("Wrote {}", path.display());
        }
        Command::Reset => {
            course.reset().await;
            println!("Progress erased.");
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut iter = std::env::args().skip(1);
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock()).await?;
    let course = app.course();

    if app.restored() && parsed.command == Command::Status {
        println!("Welcome back, {}. Your progress was restored.", course.progress().student_name());
    }
    if !app.generation_enabled() {
        eprintln!("COURSE_AI_API_KEY is not set; lessons and exams cannot be generated.");
    }

    let outcome = execute(&course, parsed.command).await;
    course.close().await;
    outcome
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(words: &[&str]) -> Result<Command, ArgsError> {
        let mut iter = words.iter().map(|word| (*word).to_string());
        Args::parse(&mut iter).map(|args| args.command)
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(parse(&[]).unwrap(), Command::Status);
        assert_eq!(
            parse(&["goto", "2-3"]).unwrap(),
            Command::Goto("2-3".parse().unwrap())
        );
        assert_eq!(
            parse(&["expand", "Ethical", "Considerations"]).unwrap(),
            Command::Expand("Ethical Considerations".into())
        );
        assert_eq!(
            parse(&["exam", "start", "--final"]).unwrap(),
            Command::ExamStart(ExamKind::Final)
        );
        assert_eq!(
            parse(&["answer", "3", "1"]).unwrap(),
            Command::Answer {
                question: 3,
                option: 1
            }
        );
        assert_eq!(parse(&["font", "maximum"]).unwrap(), Command::Font(FontSize::Maximum));
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(matches!(
            parse(&["goto", "two"]),
            Err(ArgsError::InvalidLessonId { .. })
        ));
        assert!(matches!(
            parse(&["answer", "x", "1"]),
            Err(ArgsError::InvalidNumber { .. })
        ));
        assert!(matches!(parse(&["expand"]), Err(ArgsError::MissingArgument { .. })));
        assert!(matches!(parse(&["status", "extra"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(parse(&["fly"]), Err(ArgsError::UnknownCommand(_))));
    }

    #[test]
    fn course_boundaries_are_marked() {
        let catalog = Catalog::standard();
        let first = "1-1".parse().unwrap();
        let middle = "3-2".parse().unwrap();
        let last = "6-4".parse().unwrap();
        assert!(course_boundary(&catalog, first).unwrap().starts_with("First"));
        assert_eq!(course_boundary(&catalog, middle), None);
        assert!(course_boundary(&catalog, last).unwrap().starts_with("Last"));
    }

    #[test]
    fn relative_db_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/course.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/course.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
