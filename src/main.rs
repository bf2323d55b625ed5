use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Level;

use litefile::{BuildOptions, SqlValue, StoredDb, TableDef};

const DEFAULT_TABLE_NAME: &str = "mytable";

/// The CREATE statement written when `--sql` is not given.
fn default_create_sql(table: &str) -> String {
    format!("CREATE TABLE {}(id INTEGER PRIMARY KEY, name TEXT)", table)
}

#[derive(Parser, Debug)]
#[command(name = "litefile", about = "Read and write minimal SQLite database files")]
struct Cli {
    /// Log more: -v for debug, -vv for trace.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rows of a table.
    Read {
        file: PathBuf,
        table: String,
    },
    /// List the schema table.
    Tables { file: PathBuf },
    /// Write a new database with one table holding (1, 'Alice') and (2, 'Bob').
    Write {
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_TABLE_NAME)]
        table: String,
        /// Defaults to an (id, name) table named by --table.
        #[arg(long)]
        sql: Option<String>,
        #[arg(long, default_value_t = litefile::builder::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Read { file, table } => {
            let db = StoredDb::open(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let root = db.root_pagenum(&table)?;
            let rows = litefile::scan_table(db.bytes(), root)
                .with_context(|| format!("Failed to scan table {}", table))?;
            litefile::formatting::print_table(&mut out, &table, root, rows)?;
        }
        Command::Tables { file } => {
            let db = StoredDb::open(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            litefile::formatting::print_schema_entries(&mut out, &db.tables()?)?;
        }
        Command::Write {
            output,
            table,
            sql,
            page_size,
        } => {
            let rows = vec![
                vec![SqlValue::Int(1), SqlValue::from("Alice")],
                vec![SqlValue::Int(2), SqlValue::from("Bob")],
            ];
            let bytes = litefile::build_minimal_database_with(
                &BuildOptions { page_size },
                &TableDef::new(&table, &sql.unwrap_or_else(|| default_create_sql(&table))),
                &rows,
            )?;
            litefile::write_database(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            writeln!(out, "Wrote sqlite db to {}", output.display())?;
        }
    }
    Ok(())
}

#[test]
fn test_write_defaults_sql_to_the_table_name() {
    let cli = Cli::parse_from(["litefile", "write", "out.db", "--table", "foo"]);
    match cli.command {
        Command::Write { table, sql, .. } => {
            assert_eq!(table, "foo");
            assert_eq!(sql, None);
            assert_eq!(
                default_create_sql(&table),
                "CREATE TABLE foo(id INTEGER PRIMARY KEY, name TEXT)"
            );
        }
        other => panic!("parsed the wrong command: {:?}", other),
    }
    assert_eq!(
        default_create_sql(DEFAULT_TABLE_NAME),
        "CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)"
    );
}
