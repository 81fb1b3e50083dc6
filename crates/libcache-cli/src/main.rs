//! libcache CLI - load a library table and report each library's status.
//!
//! Reads a JSON library table, runs one load wave through a
//! `LibraryCacheManager`, waits for it and prints the outcome per library.

mod report;
mod table;

use anyhow::{Context, Result};
use clap::Parser;
use libcache::{LibraryCacheManager, LibraryScope, PluginRegistry};
use report::LibraryReport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "libcache")]
#[command(about = "Load a library table and report library status")]
struct Args {
    /// JSON library table (array of rows, or {"libraries": [...]})
    table: PathBuf,

    /// Additional project-scope table
    #[arg(long)]
    project_table: Option<PathBuf>,

    /// Number of load worker threads (default: one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// List the items of this library after loading
    #[arg(long)]
    list: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut rows = table::read_table(&args.table)?;
    if let Some(path) = &args.project_table {
        let mut project_rows = table::read_table(path)?;
        table::force_scope(&mut project_rows, LibraryScope::Project);
        rows.extend(project_rows);
    }
    info!("Loaded {} library rows", rows.len());

    let registry = Arc::new(PluginRegistry::with_builtin_backends());
    let mut builder = LibraryCacheManager::builder(registry);
    if let Some(workers) = args.workers {
        builder = builder.worker_threads(workers);
    }
    let manager = builder.build().context("Failed to create library cache manager")?;

    manager.async_load_all(&rows);
    manager.wait_for_pending().await;

    let reports: Vec<LibraryReport> = manager
        .library_statuses()
        .iter()
        .map(LibraryReport::from)
        .collect();

    // Report goes to stdout; logs go to stderr.
    if args.json {
        println!("{}", report::render_json(&reports)?);
    } else {
        print!("{}", report::render_text(&reports));
    }

    if let Some(nickname) = &args.list {
        let items = manager
            .enumerate_items(nickname)
            .with_context(|| format!("Failed to list library '{}'", nickname))?;
        info!("{} items in '{}'", items.len(), nickname);
        for item in items {
            println!("{}", item);
        }
    }

    Ok(())
}
