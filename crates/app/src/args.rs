use std::fmt;
use std::io::{self, Write};

use cc_core::model::{CategoryId, QuestionId, UserId};

/// Local user id used with the sqlite backend when none is configured.
pub const DEFAULT_LOCAL_USER: UserId = UserId::from_u128(0x0c0c_0000_0000_4000_8000_0000_0000_0001);
pub const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCommand,
    UnknownCommand(String),
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidBackend { raw: String },
    InvalidUserId { raw: String },
    InvalidCategoryId { raw: String },
    InvalidQuestionId { raw: String },
    MissingQuestionId { command: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidBackend { raw } => {
                write!(f, "invalid --backend value (expected sqlite or remote): {raw}")
            }
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidCategoryId { raw } => write!(f, "invalid --category value: {raw}"),
            ArgsError::InvalidQuestionId { raw } => write!(f, "invalid question id: {raw}"),
            ArgsError::MissingQuestionId { command } => {
                write!(f, "{command} requires a question id")
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Remote,
}

impl Backend {
    fn parse(raw: &str) -> Result<Self, ArgsError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "local" => Ok(Self::Sqlite),
            "remote" | "supabase" => Ok(Self::Remote),
            _ => Err(ArgsError::InvalidBackend { raw: raw.to_owned() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Categories,
    Deal {
        categories: Vec<CategoryId>,
        random: bool,
    },
    Complete(QuestionId),
    Reopen(QuestionId),
    Completed,
    Browse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub backend: Backend,
    pub db_url: String,
    pub user_id: UserId,
    pub command: Command,
}

pub fn write_usage(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Usage:")?;
    writeln!(out, "  conversations [global options] <command>")?;
    writeln!(out)?;
    writeln!(out, "Commands:")?;
    writeln!(out, "  categories                               List categories")?;
    writeln!(out, "  deal [--category <id>]... [--random]     Deal incomplete questions")?;
    writeln!(out, "  complete <question-id>                   Mark a question complete")?;
    writeln!(out, "  reopen <question-id>                     Mark a question incomplete")?;
    writeln!(out, "  completed                                List completed questions")?;
    writeln!(out, "  browse                                   Pick categories and walk the cards")?;
    writeln!(out)?;
    writeln!(out, "Global options:")?;
    writeln!(out, "  --backend <sqlite|remote>   Storage backend (default: sqlite)")?;
    writeln!(out, "  --db <sqlite_url>           SQLite URL (default: {DEFAULT_DB_URL})")?;
    writeln!(out, "  --user <uuid>               Local user for the sqlite backend")?;
    writeln!(out)?;
    writeln!(out, "Environment:")?;
    writeln!(out, "  CC_BACKEND, CC_DB_URL, CC_USER_ID")?;
    writeln!(out, "  CC_SUPABASE_URL, CC_SUPABASE_ANON_KEY, CC_SCHEMA, CC_EMAIL, CC_PASSWORD")?;
    writeln!(out, "  CC_HTTP_TIMEOUT_SECS (default: 15)")?;
    writeln!(out, "  RUST_LOG (default: info)")
}

pub fn print_usage() {
    // Nothing useful to do if stderr is gone.
    let _ = write_usage(&mut io::stderr());
}

fn parse_question_id(raw: Option<String>, command: &'static str) -> Result<QuestionId, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingQuestionId { command })?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidQuestionId { raw: raw.clone() })
}

impl Args {
    /// Parse process arguments, reading defaults from the environment.
    pub fn from_env() -> Result<Self, ArgsError> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// Parse `argv` (without the program name). `env` supplies defaults.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut backend = match env("CC_BACKEND") {
            Some(raw) if !raw.trim().is_empty() => Backend::parse(&raw)?,
            _ => Backend::Sqlite,
        };
        let mut db_url = env("CC_DB_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_URL.into());
        let mut user_id = match env("CC_USER_ID") {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse()
                .map_err(|_| ArgsError::InvalidUserId { raw: raw.clone() })?,
            _ => DEFAULT_LOCAL_USER,
        };

        let mut args = argv.into_iter();
        let mut command_name = None;
        let mut rest = Vec::new();

        while let Some(arg) = args.next() {
            if command_name.is_some() {
                rest.push(arg);
                continue;
            }
            match arg.as_str() {
                "--backend" => backend = Backend::parse(&require_value(&mut args, "--backend")?)?,
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                flag if flag.starts_with('-') => return Err(ArgsError::UnknownArg(arg)),
                _ => command_name = Some(arg),
            }
        }

        let command_name = command_name.ok_or(ArgsError::MissingCommand)?;
        let command = parse_command(&command_name, rest)?;

        Ok(Self {
            backend,
            db_url,
            user_id,
            command,
        })
    }
}

fn parse_command(name: &str, rest: Vec<String>) -> Result<Command, ArgsError> {
    let mut args = rest.into_iter();
    let command = match name {
        "categories" => Command::Categories,
        "completed" => Command::Completed,
        "browse" => Command::Browse,
        "complete" => Command::Complete(parse_question_id(args.next(), "complete")?),
        "reopen" => Command::Reopen(parse_question_id(args.next(), "reopen")?),
        "deal" => {
            let mut categories = Vec::new();
            let mut random = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--category" | "-c" => {
                        let value = require_value(&mut args, "--category")?;
                        let id = value
                            .parse()
                            .map_err(|_| ArgsError::InvalidCategoryId { raw: value.clone() })?;
                        categories.push(id);
                    }
                    "--random" => random = true,
                    _ => return Err(ArgsError::UnknownArg(arg)),
                }
            }
            return Ok(Command::Deal { categories, random });
        }
        other => return Err(ArgsError::UnknownCommand(other.to_owned())),
    };
    match args.next() {
        Some(extra) => Err(ArgsError::UnknownArg(extra)),
        None => Ok(command),
    }
}

/// Accept bare paths as well as `sqlite:` URLs; always open read-write-create.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" {
        return trimmed.to_owned();
    }
    let base = if trimmed.starts_with("sqlite:") {
        trimmed.to_owned()
    } else {
        format!("sqlite://{trimmed}")
    };
    if base.contains("mode=") {
        base
    } else if base.contains('?') {
        format!("{base}&mode=rwc")
    } else {
        format!("{base}?mode=rwc")
    }
}
