use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use turnstile::{LoginOutcome, SqliteRepositoryProvider, Turnstile, TurnstileError};

/// Command line interface for Turnstile
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, default_value = "sqlite://turnstile.db?mode=rwc")]
    db_url: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Register a user
    Register {
        username: String,
        #[arg(long)]
        password: String,
        /// Defaults to the password
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Attempt a login through the guard
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Show the guard state of an account as JSON
    Status { username: String },
    /// Lift a lock and clear the failure history
    Unlock { username: String },
    /// Delete expired locks and old attempts
    Prune,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, TurnstileError> {
    match cli.command {
        Commands::Version => {
            println!("Turnstile v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        command => {
            let storage = Arc::new(SqliteRepositoryProvider::connect(&cli.db_url).await?);
            execute(command, Turnstile::new(storage)?).await
        }
    }
}

async fn execute(
    command: Commands,
    turnstile: Turnstile<SqliteRepositoryProvider>,
) -> Result<ExitCode, TurnstileError> {
    match command {
        Commands::Migrate => {
            println!("Running migrations...");
            turnstile.migrate().await?;
        }
        Commands::Register {
            username,
            password,
            confirm,
        } => {
            let confirm = confirm.as_deref().unwrap_or(&password);
            let user = turnstile.register_user(&username, &password, confirm).await?;
            println!("Registered {} ({})", user.username, user.id);
        }
        Commands::Login { username, password } => {
            let outcome = turnstile.login(&username, &password).await;
            let report = match &outcome {
                LoginOutcome::Success => serde_json::json!({ "outcome": "success" }),
                LoginOutcome::Rejected => serde_json::json!({ "outcome": "rejected" }),
                LoginOutcome::Locked {
                    locked_until, tier, ..
                } => serde_json::json!({
                    "outcome": "locked",
                    "tier": tier,
                    "locked_until": locked_until,
                    "retry_after_seconds": outcome.retry_after_seconds(),
                }),
                LoginOutcome::Error(e) => serde_json::json!({
                    "outcome": "error",
                    "error": e.to_string(),
                }),
            };
            println!("{report}");
            if !outcome.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Status { username } => {
            let state = turnstile.account_state(&username).await?;
            let report = serde_json::json!({ "username": username, "account": state });
            println!("{report}");
        }
        Commands::Unlock { username } => {
            if turnstile.unlock_account(&username).await? {
                println!("Unlocked {username}");
            } else {
                println!("{username} was not locked");
            }
        }
        Commands::Prune => {
            let stats = turnstile.prune().await?;
            println!(
                "Removed {} expired locks and {} old attempts",
                stats.expired_locks_removed, stats.old_attempts_removed
            );
        }
        // Needs no storage; answered in run()
        Commands::Version => {}
    }

    Ok(ExitCode::SUCCESS)
}
