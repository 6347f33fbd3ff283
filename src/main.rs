use clap::{Parser, Subcommand};
use rowscope::concurrent::{fetch_users_and_older, DEFAULT_MIN_AGE};
use rowscope::config::Settings;
use rowscope::core::db::{execute_query, with_connection, Param, QueryOutcome};
use rowscope::core::Result;
use rowscope::layers::QueryPipeline;
use rowscope::paginate::lazy_pagination;
use rowscope::seed::{seed, DedupStrategy};
use rowscope::stream::{average_age, batch_processing, stream_users};
use rowscope::users::{get_user_by_id, UserRecord};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rowscope")]
#[command(version)]
#[command(about = "Scoped, streamed and layered access to the user_data table")]
#[command(long_about = "Scoped, streamed and layered access to the user_data table

CONFIGURATION:
  Connection parameters come from DB_HOST, DB_USER, DB_PASSWORD, DB_NAME and
  DB_PORT, falling back to the [database] section of the settings file.
  DB_NAME selects the SQLite file: `users` opens users.db, a path or a name
  ending in .db/.sqlite is used as given, and :memory: is in-memory.

  Settings file (TOML, default <config dir>/rowscope/config.toml):
    [retry]
    attempts = 3
    delay_ms = 1000

    [cache]
    capacity = 128

    [seed]
    dedup = \"application\"      # or \"constraint\"

LOGGING:
  Set RUST_LOG (e.g. RUST_LOG=debug) to change verbosity.")]
struct Cli {
    /// Settings file to load instead of the default location
    #[arg(long, global = true, env = "ROWSCOPE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print user rows as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and table, then load users from a CSV file
    Seed {
        csv: PathBuf,
        /// Override the configured duplicate-email strategy
        #[arg(long, value_name = "STRATEGY")]
        dedup: Option<DedupStrategy>,
    },
    /// Stream every user, one row at a time
    Stream,
    /// Stream users in batches and keep those older than --min-age
    Batches {
        size: usize,
        #[arg(long, default_value_t = 25)]
        min_age: i64,
    },
    /// Fetch users page by page
    Paginate { page_size: usize },
    /// Average user age, computed without loading the table
    AverageAge,
    /// Run one statement with bound parameters
    Execute { sql: String, params: Vec<String> },
    /// Look up one user by id
    User { id: String },
    /// Run a read query twice through the result cache
    Cached { sql: String },
    /// Run a query, retrying transient failures
    Retry { sql: String },
    /// Fetch all users and the older ones concurrently
    Concurrent {
        #[arg(long, default_value_t = DEFAULT_MIN_AGE)]
        min_age: i64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let db_config = settings.db_config()?;
    let source = db_config.data_source();
    debug!("Using data source {}", source);

    match cli.command {
        Command::Seed { csv, dedup } => {
            let strategy = dedup.unwrap_or(settings.seed.dedup);
            let report = seed(&source, &csv, strategy)?;
            println!(
                "Inserted {} users, skipped {} duplicates",
                report.inserted, report.skipped
            );
        }
        Command::Stream => {
            for user in stream_users(&source)? {
                print_user(&user?, cli.json)?;
            }
        }
        Command::Batches { size, min_age } => {
            for user in batch_processing(&source, size, min_age)? {
                print_user(&user, cli.json)?;
            }
        }
        Command::Paginate { page_size } => {
            for (number, page) in lazy_pagination(&source, page_size)?.enumerate() {
                println!("-- page {}", number + 1);
                for user in page? {
                    print_user(&user, cli.json)?;
                }
            }
        }
        Command::AverageAge => {
            println!("Average age of users: {:.2}", average_age(&source)?);
        }
        Command::Execute { sql, params } => {
            let params: Vec<Param> = params.iter().map(String::as_str).map(parse_param).collect();
            match execute_query(&source, &sql, &params)? {
                QueryOutcome::Rows(result) => print!("{}", result.render()),
                QueryOutcome::Affected(n) => println!("{} row(s) affected", n),
            }
        }
        Command::User { id } => match with_connection(&source, |conn| get_user_by_id(conn, &id))? {
            Some(user) => print_user(&user, cli.json)?,
            None => println!("No user with id {}", id),
        },
        Command::Cached { sql } => {
            let cache = settings.query_cache();
            let pipeline = QueryPipeline::new(source).with_logging().with_cache(&cache);
            let first = pipeline.fetch(&sql, &[])?;
            let second = pipeline.fetch(&sql, &[])?;
            print!("{}", second.render());
            let stats = cache.stats();
            println!(
                "{} rows; second call {} (hits: {}, misses: {})",
                first.row_count,
                if std::sync::Arc::ptr_eq(&first, &second) { "served from cache" } else { "re-ran the query" },
                stats.hits,
                stats.misses
            );
        }
        Command::Retry { sql } => {
            let pipeline = QueryPipeline::new(source)
                .with_logging()
                .with_retry(settings.retry_policy());
            print!("{}", pipeline.fetch(&sql, &[])?.render());
        }
        Command::Concurrent { min_age } => {
            let (all, older) = fetch_users_and_older(&source, Some(min_age))?;
            println!("-- all users ({})", all.row_count);
            print!("{}", all.render());
            println!("-- users older than {} ({})", min_age, older.row_count);
            print!("{}", older.render());
        }
    }
    Ok(())
}

fn print_user(user: &UserRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(user)?);
    } else {
        println!("('{}', '{}', '{}', {})", user.user_id, user.name, user.email, user.age);
    }
    Ok(())
}

/// Integer first, then real, otherwise text
fn parse_param(raw: &str) -> Param {
    if let Ok(i) = raw.parse::<i64>() {
        Param::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Param::Real(f)
    } else {
        Param::Text(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("42"), Param::Integer(42));
        assert_eq!(parse_param("2.5"), Param::Real(2.5));
        assert_eq!(parse_param("alice@example.com"), Param::Text("alice@example.com".into()));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["rowscope", "batches", "50", "--min-age", "30"]).unwrap();
        assert!(matches!(cli.command, Command::Batches { size: 50, min_age: 30 }));

        let cli = Cli::try_parse_from(["rowscope", "--json", "seed", "users.csv", "--dedup", "constraint"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Seed { dedup: Some(DedupStrategy::Constraint), .. }
        ));

        assert!(Cli::try_parse_from(["rowscope", "seed", "users.csv", "--dedup", "maybe"]).is_err());
    }
}
