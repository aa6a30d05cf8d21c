//! CLI module for locdb-rs
//!
//! This module handles command line argument parsing and query logic.

use crate::config::AppConfig;
use crate::database::LocationDatabase;
use crate::download::{Downloader, Refresher};
use crate::entity::{formatter, DatabaseSummary, LookupSummary};
use crate::error::Result;
use crate::export;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "locdb")]
#[command(version, about = "Offline country, AS and network flag lookups in IPFire location databases")]
#[command(long_about = "locdb answers which country, autonomous system and network an IP address \
    belongs to, using a local copy of the IPFire location database.\n\n\
    Examples:\n  \
    $ locdb 8.8.8.8\n  \
    $ locdb 2001:db8::1 --json\n  \
    $ cat addresses.txt | locdb\n  \
    $ locdb --info\n  \
    $ locdb --export networks.csv\n  \
    $ locdb --update")]
pub struct Cli {
    /// IP addresses to look up (read from standard input when none are given)
    #[arg(value_name = "QUERY")]
    pub queries: Vec<String>,

    /// Output JSON
    #[arg(short, long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Database file to use instead of the configured one
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Return empty results instead of errors for uncovered addresses and unknown AS names
    #[arg(long)]
    pub no_raise: bool,

    /// Memory map the database file
    #[arg(long)]
    pub mmap: bool,

    /// Never contact the download server
    #[arg(long)]
    pub offline: bool,

    /// Download the current database now
    #[arg(long)]
    pub update: bool,

    /// Show database metadata
    #[arg(long)]
    pub info: bool,

    /// Write every network to a CSV file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

/// Reader for the configured file, refreshed before first use unless disabled
pub fn open_database(config: &AppConfig, path: &Path) -> Result<LocationDatabase> {
    let db = LocationDatabase::with_options(path, config.reader_options());
    if !config.database.auto_update {
        return Ok(db);
    }
    let refresher = Refresher::new(Downloader::from_config(config)?);
    Ok(db.with_prepare(Box::new(refresher)))
}

/// Resolve one query into an owned result
pub fn lookup(db: &LocationDatabase, query: &str) -> Result<LookupSummary> {
    LookupSummary::from_info(&db.lookup(query.trim())?)
}

impl Cli {
    /// Fold command line switches into the loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if self.json {
            config.output.json = true;
        }
        if self.verbose {
            config.global.verbose = true;
        }
        if let Some(ref db) = self.db {
            config.database.path = db.to_string_lossy().into_owned();
        }
        if self.no_raise {
            config.database.raise_on_failure = false;
        }
        if self.mmap {
            config.database.use_mmap = true;
        }
        if self.offline {
            config.database.auto_update = false;
        }
    }

    /// Default log filter: debug when either the flag or the config asks for it
    pub fn log_level(&self, config: &AppConfig) -> &'static str {
        if self.verbose || config.global.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    pub fn run(&self, mut config: AppConfig) -> Result<()> {
        self.apply(&mut config);
        let path = config.database_path()?;

        let maintenance = self.update || self.info || self.export.is_some();

        if self.update {
            self.handle_update(&config, &path)?;
            if !self.info && self.export.is_none() && self.queries.is_empty() {
                return Ok(());
            }
            // the file was just fetched
            config.database.auto_update = false;
        }

        let db = open_database(&config, &path)?;

        if self.info {
            self.handle_info(&db, &config)?;
        }
        if let Some(ref file) = self.export {
            let rows = export::export_csv_file(&db, file)?;
            eprintln!("Exported {} networks to {}", rows, file.display());
        }
        if maintenance && self.queries.is_empty() {
            return Ok(());
        }

        if !self.queries.is_empty() {
            self.process_queries_from_args(&db, &config)
        } else {
            self.process_queries_from_stdin(&db, &config)
        }
    }

    /// Process queries from command line arguments
    fn process_queries_from_args(&self, db: &LocationDatabase, config: &AppConfig) -> Result<()> {
        let mut results = Vec::new();
        for query in &self.queries {
            match lookup(db, query) {
                Ok(summary) if config.output.json => results.push(summary),
                Ok(summary) => println!("{}", formatter::format_text(&summary, config.output.enable_colors)),
                Err(e) => eprintln!("Query failed for {}: {}", query, e),
            }
        }

        if config.output.json {
            println!("{}", formatter::format_json(&results)?);
        }
        Ok(())
    }

    /// Process queries from stdin (pipe or interactive mode)
    fn process_queries_from_stdin(&self, db: &LocationDatabase, config: &AppConfig) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        let interactive = atty::is(atty::Stream::Stdin);
        if interactive {
            println!("locdb interactive mode (type quit or press Ctrl+D to exit)");
        }

        for line in stdin.lock().lines() {
            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }
            if interactive && (trimmed == "quit" || trimmed == "exit") {
                break;
            }

            match lookup(db, trimmed) {
                Ok(summary) if config.output.json => {
                    println!("{}", serde_json::to_string(&summary)?);
                }
                Ok(summary) => println!("{}", formatter::format_text(&summary, config.output.enable_colors)),
                Err(e) => eprintln!("Query failed for {}: {}", trimmed, e),
            }
            stdout.flush()?;
        }

        Ok(())
    }

    fn handle_info(&self, db: &LocationDatabase, config: &AppConfig) -> Result<()> {
        let summary = DatabaseSummary::new(db)?;
        if config.output.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{}", formatter::format_info(&summary));
        }
        Ok(())
    }

    /// Handle database update command
    fn handle_update(&self, config: &AppConfig, path: &Path) -> Result<()> {
        let installed = path.exists();
        let refresher = Refresher::new(Downloader::from_config(config)?);
        refresher.download_blocking(path)?;

        if installed {
            println!("✓ Database updated: {}", path.display());
        } else {
            println!("✓ Database installed: {}", path.display());
        }
        Ok(())
    }
}
