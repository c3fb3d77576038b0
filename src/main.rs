use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use box_tracker::{
    all, count, get_events_for_entity, load_lookup_csv, open, seed_lookups, Account, Company,
    Config, LookupEntry, Record, StorageBox,
};

const USAGE: &str = "usage: box-tracker [--db=PATH] [--log=FILTER] <command>

commands:
  init                      create the database and schema
  seed <csv>                load lookup entries (code,value,type)
  list <lookups|accounts|companies|boxes>
  history <table> <id>      audit trail of one row";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (config, positional) = Config::load(&args);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .init();

    let command: Vec<&str> = positional.iter().map(String::as_str).collect();
    match command.as_slice() {
        ["init"] => run_init(&config),
        ["seed", csv_path] => run_seed(&config, Path::new(csv_path)),
        ["list", table] => run_list(&config, table),
        ["history", table, id] => run_history(&config, table, id),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn connect(config: &Config) -> Result<Connection> {
    open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))
}

fn run_init(config: &Config) -> Result<()> {
    let conn = connect(config)?;

    println!("✓ Database ready at {}", config.db_path.display());
    let counts = [
        (LookupEntry::TABLE, count::<LookupEntry>(&conn)?),
        (Account::TABLE, count::<Account>(&conn)?),
        (Company::TABLE, count::<Company>(&conn)?),
        (StorageBox::TABLE, count::<StorageBox>(&conn)?),
    ];
    for (table, rows) in counts {
        println!("  {:<14} {} rows", table, rows);
    }

    Ok(())
}

fn run_seed(config: &Config, csv_path: &Path) -> Result<()> {
    let entries = load_lookup_csv(csv_path)?;
    println!("✓ Loaded {} lookup entries from CSV", entries.len());

    let conn = connect(config)?;
    let inserted = seed_lookups(&conn, &entries)?;
    println!("✓ Inserted: {} entries", inserted);
    println!("✓ Skipped duplicates: {}", entries.len() - inserted);

    Ok(())
}

fn print_labels<R: std::fmt::Display>(rows: Vec<R>, id_of: impl Fn(&R) -> Option<i64>) {
    for row in &rows {
        println!("{:>6}  {}", id_of(row).unwrap_or_default(), row);
    }
    println!("({} rows)", rows.len());
}

fn run_list(config: &Config, table: &str) -> Result<()> {
    let conn = connect(config)?;

    match table {
        "lookups" => print_labels(all::<LookupEntry>(&conn)?, |r| r.id),
        "accounts" => print_labels(all::<Account>(&conn)?, |r| r.audit.id),
        "companies" => print_labels(all::<Company>(&conn)?, |r| r.audit.id),
        "boxes" => print_labels(all::<StorageBox>(&conn)?, |r| r.audit.id),
        other => bail!("unknown table {:?}\n\n{}", other, USAGE),
    }

    Ok(())
}

fn run_history(config: &Config, table: &str, id: &str) -> Result<()> {
    let entity_type = match table {
        "account" | "accounts" => Account::TABLE,
        "company" | "companies" => Company::TABLE,
        "box" | "boxes" => StorageBox::TABLE,
        other => bail!("no audit trail for {:?}", other),
    };
    let id: i64 = id.parse().with_context(|| format!("invalid id {:?}", id))?;

    let conn = connect(config)?;
    let events = get_events_for_entity(&conn, entity_type, &id.to_string())?;

    for event in &events {
        println!(
            "{}  {:<8} by {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.actor
        );
    }
    println!("({} events)", events.len());

    Ok(())
}
