mod args;
mod commands;

use std::error::Error;
use std::io;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cc_core::Clock;
use services::{AppServices, ServiceError};
use storage::remote::RemoteConfig;

use args::{Args, ArgsError, Backend, normalize_sqlite_url, print_usage};

#[derive(Debug)]
enum SetupError {
    MissingRemoteConfig,
    MissingCredentials,
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::MissingRemoteConfig => {
                write!(f, "remote backend needs CC_SUPABASE_URL and CC_SUPABASE_ANON_KEY")
            }
            SetupError::MissingCredentials => {
                write!(f, "remote backend needs CC_EMAIL and CC_PASSWORD")
            }
        }
    }
}

impl Error for SetupError {}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn build_services(args: &Args) -> Result<AppServices, Box<dyn Error>> {
    let clock = Clock::system();
    match args.backend {
        Backend::Sqlite => {
            let db_url = normalize_sqlite_url(&args.db_url);
            Ok(AppServices::sqlite(&db_url, args.user_id, clock).await?)
        }
        Backend::Remote => {
            let config = RemoteConfig::from_env().ok_or(SetupError::MissingRemoteConfig)?;
            let email = std::env::var("CC_EMAIL").map_err(|_| SetupError::MissingCredentials)?;
            let password =
                std::env::var("CC_PASSWORD").map_err(|_| SetupError::MissingCredentials)?;
            info!(schema = %config.schema, "signing in to hosted store");
            Ok(AppServices::remote(config, &email, &password, clock).await?)
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    if std::env::args()
        .skip(1)
        .any(|arg| arg == "--help" || arg == "-h")
    {
        print_usage();
        return Ok(());
    }

    let args = Args::from_env().map_err(|e: ArgsError| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let services = build_services(&args).await?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    let outcome = commands::run_command(&services, &args.command, &mut input, &mut out).await;

    if let Some(auth) = services.auth() {
        if let Err(err) = auth.sign_out().await {
            warn!(error = %err, "could not sign out cleanly");
        }
    }

    outcome.map_err(|err| {
        if matches!(err.downcast_ref::<ServiceError>(), Some(ServiceError::Unauthenticated)) {
            "not signed in: check CC_EMAIL and CC_PASSWORD".into()
        } else {
            err
        }
    })
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
