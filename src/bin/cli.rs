//! TableKV CLI
//!
//! Command-line interface for lookups and upserts through a `TableAccessor`.
//! Entities are read and printed as flat JSON objects carrying `PartitionKey`
//! and `RowKey` next to their properties, plus `odata.etag` on output.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tablekv::entity::document;
use tablekv::query::Comparison;
use tablekv::{Config, DynamicEntity, Filter, Result, TableAccessor, TableQuery};
use tracing_subscriber::{fmt, EnvFilter};

/// TableKV CLI
#[derive(Parser, Debug)]
#[command(name = "tablekv-cli")]
#[command(about = "CLI for partition/row addressed table stores")]
#[command(version)]
struct Args {
    /// Storage connection string
    #[arg(
        short,
        long,
        env = "TABLEKV_CONNECTION_STRING",
        default_value = "UseDevelopmentStorage=true"
    )]
    connection_string: String,

    /// Fail instead of creating missing tables
    #[arg(long)]
    no_create: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up an entity by its keys
    Get {
        table: String,
        partition_key: String,
        row_key: String,
    },

    /// Insert or merge one entity given as a JSON object
    Upsert {
        table: String,

        /// e.g. '{"PartitionKey":"p","RowKey":"r","Name":"x"}'
        entity: String,
    },

    /// Insert or merge a single-partition batch from a JSON-lines file
    Batch { table: String, file: PathBuf },

    /// List the entities of a table, optionally of one partition
    Scan {
        table: String,

        #[arg(short, long)]
        partition: Option<String>,

        /// Maximum number of entities to print
        #[arg(short, long)]
        take: Option<usize>,
    },

    /// List tables
    Tables,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tablekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{} ({:?})", e, e.kind());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = Config::builder()
        .connection_string(&args.connection_string)
        .auto_create_tables(!args.no_create)
        .build();
    let accessor = TableAccessor::with_config(config)?;

    match args.command {
        Commands::Get {
            table,
            partition_key,
            row_key,
        } => match accessor.lookup_by_key::<DynamicEntity>(&table, &partition_key, &row_key)? {
            Some(entity) => println!("{}", document::dynamic_to_json(&entity)?),
            None => {
                tracing::warn!("No entity ({}, {}) in {}", partition_key, row_key, table);
                return Ok(ExitCode::from(2));
            }
        },

        Commands::Upsert { table, entity } => {
            let entity = document::dynamic_from_json(&entity)?;
            accessor.upsert_one(&table, &entity)?;
            tracing::info!("Upserted {} into {}", entity.key, table);
        }

        Commands::Batch { table, file } => {
            let reader = BufReader::new(File::open(&file)?);
            let mut entities = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    entities.push(document::dynamic_from_json(&line)?);
                }
            }

            accessor.upsert_batch(&table, &entities)?;
            tracing::info!("Upserted batch of {} into {}", entities.len(), table);
        }

        Commands::Scan {
            table,
            partition,
            take,
        } => {
            let mut query = TableQuery::new();
            if let Some(pk) = partition {
                query = query.filter(Filter::condition("PartitionKey", Comparison::Equal, pk));
            }
            if let Some(n) = take {
                query = query.take(n);
            }

            for entity in accessor.query::<DynamicEntity>(&table, &query)? {
                println!("{}", document::dynamic_to_json(&entity)?);
            }
        }

        Commands::Tables => {
            for name in accessor.list_tables()? {
                println!("{}", name);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
