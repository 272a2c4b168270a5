use std::fmt;

use chrono::{DateTime, Utc};
use cc_core::model::{Category, CategoryId, Question, QuestionId};
use storage::CatalogWriter;
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    inactive_every: Option<u32>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
    InvalidInactiveEvery { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
            ArgsError::InvalidInactiveEvery { raw } => {
                write!(f, "invalid --inactive-every value: {raw}")
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
            std::env::var("CC_DB_URL").unwrap_or_else(|_| "sqlite://dev.sqlite3?mode=rwc".into());
        let mut inactive_every = None;
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
                "--inactive-every" => {
                    let value = require_value(&mut args, "--inactive-every")?;
                    let parsed = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| ArgsError::InvalidInactiveEvery { raw: value.clone() })?;
                    inactive_every = Some(parsed);
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
            inactive_every,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://dev.sqlite3?mode=rwc)");
    eprintln!("  --inactive-every <n>      Mark every n-th question inactive");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  CC_DB_URL");
}

const CATALOG: &[(&str, &str, &[&str])] = &[
    (
        "Childhood",
        "Stories from growing up",
        &[
            "What was your favourite game as a kid?",
            "Which teacher do you still think about?",
            "What did your family do on weekends?",
        ],
    ),
    (
        "Dreams",
        "Hopes and plans",
        &[
            "Where would you live if money were no object?",
            "What skill do you wish you had learned earlier?",
            "What does a perfect ordinary day look like?",
        ],
    ),
    (
        "Us",
        "About the two of you",
        &[
            "What was your first impression of me?",
            "Which trip together would you repeat tomorrow?",
            "What small thing makes you feel appreciated?",
        ],
    ),
];

struct SeedPlan {
    categories: Vec<Category>,
    questions: Vec<Question>,
}

impl SeedPlan {
    fn inactive(&self) -> usize {
        self.questions.iter().filter(|q| !q.is_active()).count()
    }
}

fn build_plan(now: DateTime<Utc>, inactive_every: Option<u32>) -> Result<SeedPlan, cc_core::Error> {
    let mut categories = Vec::with_capacity(CATALOG.len());
    let mut questions = Vec::new();
    let mut question_count = 0_u32;

    for (idx, (name, description, prompts)) in (0_i32..).zip(CATALOG.iter()) {
        let category_id = CategoryId::from_u128(u128::from(idx.unsigned_abs()) + 1);
        categories.push(Category::new(
            category_id,
            *name,
            Some((*description).to_owned()),
            idx * 10,
            now,
        )?);

        for text in *prompts {
            question_count += 1;
            let is_active = inactive_every.is_none_or(|n| question_count % n != 0);
            questions.push(Question::new(
                QuestionId::from_u128(1000 + u128::from(question_count)),
                category_id,
                *text,
                is_active,
                now,
                now,
            )?);
        }
    }

    Ok(SeedPlan {
        categories,
        questions,
    })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let plan = build_plan(args.now.unwrap_or_else(Utc::now), args.inactive_every)?;

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;
    for category in &plan.categories {
        repo.upsert_category(category).await?;
    }
    for question in &plan.questions {
        repo.upsert_question(question).await?;
    }

    println!(
        "Seeded {} categories and {} questions ({} inactive) into {}",
        plan.categories.len(),
        plan.questions.len(),
        plan.inactive(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::time::fixed_now;

    #[test]
    fn plan_covers_the_whole_catalog() {
        let plan = build_plan(fixed_now(), None).unwrap();
        assert_eq!(plan.categories.len(), CATALOG.len());
        assert_eq!(plan.questions.len(), 9);
        assert_eq!(plan.inactive(), 0);
        assert!(plan.categories.windows(2).all(|w| w[0].sort_order() < w[1].sort_order()));
    }

    #[test]
    fn inactive_every_marks_every_nth_question() {
        let plan = build_plan(fixed_now(), Some(3)).unwrap();
        assert_eq!(plan.inactive(), 3);
        assert!(!plan.questions[2].is_active());
        assert!(plan.questions[3].is_active());
    }
}
