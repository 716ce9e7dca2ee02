//! Dedup Indexer - Main entry point

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dedup_indexer::config::Config;
use dedup_indexer::source::{DirectorySource, HttpSource};
use dedup_indexer::{utils, IndexBuilder, Indices, RunSummary, Search, StoreClient};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every backup set of a host not yet in the progress log
    Update {
        /// Host to index (overrides config, defaults to this machine)
        #[arg(long)]
        host: Option<String>,
    },
    /// Show the newest backup set containing a checksum
    Checksum { checksum: String },
    /// Show the checksum history of an absolute path
    File {
        path: String,
        /// Also look up the backup set of each checksum
        #[arg(long)]
        resolve: bool,
    },
    /// List backup sets recorded as completely indexed
    Completed,
    /// Delete all three index databases
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::from_file(&config_path)?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let client = StoreClient::new(&config.store, &config.retry)?;
    let names = config.indexer.databases.clone();

    match args.command {
        Command::Update { host } => {
            let host = host.unwrap_or_else(|| config.indexer.host());
            tracing::info!(
                "Starting dedup-indexer v{} for host {}",
                env!("CARGO_PKG_VERSION"),
                host
            );
            let indices = Indices::open(&client, &names).await?;
            let workers = config.indexer.workers;
            let summary = match (&config.source.url, &config.source.dir) {
                (Some(url), None) => {
                    let source = HttpSource::new(url, config.retry.timeout())?;
                    IndexBuilder::new(source, indices, workers).run(&host).await?
                }
                (None, Some(dir)) => {
                    let source = DirectorySource::new(dir);
                    IndexBuilder::new(source, indices, workers).run(&host).await?
                }
                _ => bail!("configure exactly one of source.url and source.dir"),
            };
            print_summary(&summary);
            if !summary.incomplete.is_empty() {
                std::process::exit(2);
            }
        }
        Command::Checksum { checksum } => {
            let search = Search::new(client, names);
            match search.checksum(&checksum).await? {
                Some(info) => println!(
                    "{}\t{} {} {}",
                    info.basename, info.hostname, info.date, info.time
                ),
                None => println!("{checksum} not found"),
            }
        }
        Command::File { path, resolve } => {
            let search = Search::new(client, names);
            if resolve {
                match search.file_versions(&path).await? {
                    Some(versions) => {
                        for version in versions {
                            let basename = version
                                .backupset
                                .map(|b| b.basename)
                                .unwrap_or_else(|| "-".to_string());
                            println!("{}\t{}", version.checksum, basename);
                        }
                    }
                    None => println!("{path} not found"),
                }
            } else {
                match search.file(&path).await? {
                    Some(checksums) => {
                        for checksum in checksums {
                            println!("{checksum}");
                        }
                    }
                    None => println!("{path} not found"),
                }
            }
        }
        Command::Completed => {
            let search = Search::new(client, names);
            for (basename, finished) in search.completed().await? {
                println!("{basename}\t{finished}");
            }
        }
        Command::Reset => {
            for name in [&names.file_index, &names.checksum_index, &names.progress_log] {
                match client.delete(name).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => tracing::info!("{} did not exist", name),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "indexed {}, skipped {}, incomplete {}, invalid {} ({} updates applied, {} failed)",
        summary.indexed.len(),
        summary.skipped.len(),
        summary.incomplete.len(),
        summary.invalid.len(),
        summary.items.applied,
        summary.items.failed
    );
    for basename in &summary.incomplete {
        println!("incomplete: {basename}");
    }
}
