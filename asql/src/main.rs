///
/// asql CLI - Run SQL through the asynchronous connector
///
/// Provides commands for exercising the connector from a shell:
/// - asql query <SQL>...: Execute statements and print their rows
/// - asql config: Print the resolved configuration
///

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use asql::{registry, Config, ConfigError, Connection, ConnectorError, LibraryContext};
use asql_std_core::{EventPump, ScriptFunction, ScriptValue};
use asql_std_sqlite3::SqliteDriver;

#[derive(Parser)]
#[command(name = "asql")]
#[command(author, version, about = "Asynchronous SQL connector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute SQL statements in order and print their results
    Query {
        /// Config file (defaults to asql.toml discovery)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Database to open, overriding the config
        #[arg(long)]
        database: Option<String>,

        /// Seconds to wait for each result
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Statements to run
        #[arg(required = true)]
        sql: Vec<String>,
    },

    /// Print the resolved configuration
    Config {
        /// Config file (defaults to asql.toml discovery)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Query {
            config,
            database,
            timeout,
            sql,
        } => run_statements(config.as_deref(), database, Duration::from_secs(timeout), &sql),
        Commands::Config { config } => show_config(config.as_deref()),
    };
    std::process::exit(code);
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover().map(|(config, _)| config),
    }
}

fn init_logging(config: &Config) {
    let level = config.log_level().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn show_config(path: Option<&Path>) -> i32 {
    let config = match load_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match config.to_toml_string() {
        Ok(text) => {
            print!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Start an operation that reports through one callback, then pump the
/// current thread until that callback has run.
fn call_and_wait<T, F>(pump: &EventPump, timeout: Duration, start: F) -> Result<(T, Vec<ScriptValue>), String>
where
    F: FnOnce(ScriptFunction) -> Result<T, ConnectorError>,
{
    let slot: Arc<Mutex<Option<Vec<ScriptValue>>>> = Arc::default();
    let sink = Arc::clone(&slot);
    let callback = ScriptFunction::new(move |args| {
        *sink.lock().unwrap() = Some(args.to_vec());
        Ok(ScriptValue::Undefined)
    });

    let started = start(callback).map_err(|e| e.to_string())?;
    if !pump.run_until(|| slot.lock().unwrap().is_some(), timeout) {
        return Err(format!("no reply after {}s", timeout.as_secs()));
    }
    let reply = slot.lock().unwrap().take().unwrap_or_default();
    Ok((started, reply))
}

fn error_of(reply: &[ScriptValue]) -> Option<&str> {
    reply.first().and_then(ScriptValue::as_str)
}

fn format_row(row: &[ScriptValue]) -> String {
    row.iter()
        .map(|v| v.as_str().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\t")
}

fn run_statements(config_path: Option<&Path>, database: Option<String>, timeout: Duration, statements: &[String]) -> i32 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    init_logging(&config);

    let mut options = config.connect_options();
    if database.is_some() {
        options.database = database;
    }
    let driver = SqliteDriver::new().with_busy_timeout(config.busy_timeout());
    let library = LibraryContext::new(Arc::new(driver));
    let registry = Arc::clone(registry::global());
    let pump = EventPump::current();

    let opened = call_and_wait(&pump, timeout, |on_open| {
        Connection::open(&registry, &library, options, &config.worker_options(), Some(on_open))
    });
    let conn = match opened {
        Ok((conn, reply)) => {
            if let Some(message) = error_of(&reply) {
                eprintln!("Error: {}", message);
                conn.close();
                registry.reset();
                return 1;
            }
            conn
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            registry.reset();
            return 1;
        }
    };

    let mut code = 0;
    for sql in statements {
        if let Err(message) = run_statement(&conn, &pump, timeout, sql) {
            eprintln!("Error: {}", message);
            code = 1;
        }
    }

    conn.close();
    registry.reset();
    code
}

fn run_statement(conn: &Connection, pump: &EventPump, timeout: Duration, sql: &str) -> Result<(), String> {
    let ((), reply) = call_and_wait(pump, timeout, |callback| conn.query(sql, Some(callback)))?;
    if let Some(message) = error_of(&reply) {
        return Err(message.to_string());
    }
    let field_count = match reply.get(1) {
        Some(ScriptValue::Number(n)) => *n as usize,
        _ => 0,
    };
    println!("-- {} field(s)", field_count);
    if field_count == 0 {
        return Ok(());
    }

    loop {
        let ((), reply) = call_and_wait(pump, timeout, |callback| conn.fetch(Some(callback)))?;
        match reply.first().and_then(ScriptValue::as_array) {
            Some(row) => println!("{}", format_row(row)),
            None => break,
        }
    }
    Ok(())
}
