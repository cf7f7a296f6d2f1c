use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use deltalite_kernel::{Options, Row, Store};

/// Deltalite table store CLI
///
/// Every command runs in its own transaction and commits on success.
#[derive(Parser, Debug)]
#[command(name = "deltalite")]
#[command(about = "Transactional table store over a local directory", long_about = None)]
struct Cli {
    /// Directory holding log segments and data objects
    #[arg(long)]
    root: PathBuf,

    /// Path to options JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows buffered per table before an eager flush (overrides config)
    #[arg(long)]
    max_buffer: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a table with the given column names
    Create { table: String, columns: Vec<String> },

    /// Insert rows, each given as a JSON array
    Put { table: String, rows: Vec<String> },

    /// Print every row of a table as JSON
    Scan { table: String },

    /// Print the replayed table snapshot
    Tables,

    /// Print every committed log segment
    Log,
}

#[derive(Debug, Serialize)]
struct TableSummary<'a> {
    name: &'a str,
    columns: &'a [String],
    files: usize,
}

fn load_options(cli: &Cli) -> Result<Options> {
    let mut opts = match &cli.config {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<Options>(&data)?
        }
        None => Options::default(),
    };

    if let Some(rows) = cli.max_buffer {
        opts.max_memory_buffer_sz = rows;
    }
    Ok(opts)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = load_options(&cli)?;

    tracing::debug!("Opening store at {} with options: {:?}", cli.root.display(), opts);
    let store = Store::open_dir(&cli.root, opts)?;

    match cli.command {
        Command::Create { table, columns } => {
            let mut tx = store.new_transaction()?;
            tx.create(&table, columns)?;
            tx.commit()?;
        }

        Command::Put { table, rows } => {
            let mut tx = store.new_transaction()?;
            for raw in rows {
                let row: Row =
                    serde_json::from_str(&raw).with_context(|| format!("invalid row {raw}"))?;
                tx.put(&table, row)?;
            }
            tx.commit()?;
        }

        Command::Scan { table } => {
            let tx = store.new_transaction()?;
            for row in tx.iter(&table)?.rows() {
                println!("{}", serde_json::to_string(&row?)?);
            }
        }

        Command::Tables => {
            let tx = store.new_transaction()?;
            let summaries: Vec<_> = tx
                .tables()
                .values()
                .map(|t| TableSummary {
                    name: t.name(),
                    columns: t.columns(),
                    files: t.files().len(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }

        Command::Log => {
            let log = store.replay()?;
            let segments: Vec<_> = log
                .segments
                .iter()
                .map(|s| serde_json::json!({ "segment": s.id.0, "actions": s.actions }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&segments)?);
        }
    }

    Ok(())
}
