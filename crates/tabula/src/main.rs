//! Tabula CLI - run table API operations against a PostgreSQL base.
//!
//! Tables and views come from the catalog named in the configuration file;
//! every command prints its JSON response to stdout.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabula::{CatalogMetadataStore, ListParams, OneOrMany, TableService, TabulaConfig};
use tabula_core::{Row, init_tracing};
use tabula_database::{PgTableConnection, StaticConnectionResolver, create_pool};
use tabula_query::Dialect;
use tracing::info;

/// Command-line arguments for the table API.
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(about = "Tabula - CRUD and queries over user-defined tables")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tabula.toml")]
    config: PathBuf,

    /// Database URL, overriding the configuration file
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one page of rows
    List {
        /// Table id or title
        table: String,
        /// Saved view to apply
        #[arg(long)]
        view: Option<String>,
        /// Fields to return
        #[arg(long)]
        fields: Vec<String>,
        /// Sort fields, `-` prefixed for descending
        #[arg(long, allow_hyphen_values = true)]
        sort: Vec<String>,
        /// Filter expression, e.g. `(Name,eq,Kabul)~and(Population,gt,1000)`
        #[arg(long = "where")]
        filter: Option<String>,
        /// Rows to skip
        #[arg(long)]
        offset: Option<String>,
        /// Page size
        #[arg(long)]
        limit: Option<String>,
    },
    /// Read one row by primary key
    Read {
        /// Table id or title
        table: String,
        /// Primary key value
        row: String,
        /// Saved view to apply
        #[arg(long)]
        view: Option<String>,
    },
    /// Count matching rows
    Count {
        /// Table id or title
        table: String,
        /// Saved view to apply
        #[arg(long)]
        view: Option<String>,
        /// Filter expression
        #[arg(long = "where")]
        filter: Option<String>,
    },
    /// Insert a record or an array of records
    Insert(MutationArgs),
    /// Update records identified by primary key
    Update(MutationArgs),
    /// Delete records identified by primary key
    Delete(MutationArgs),
}

#[derive(clap::Args, Debug)]
struct MutationArgs {
    /// Table id or title
    table: String,
    /// JSON object or array of objects
    body: String,
    /// Saved view to apply
    #[arg(long)]
    view: Option<String>,
}

impl MutationArgs {
    fn payload(&self) -> Result<OneOrMany<Row>, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!(config_file = ?args.config, "Loading configuration");
    let mut config = TabulaConfig::from_file(&args.config)?;
    if let Some(url) = args.database_url {
        config = config.with_database_url(url);
    }

    if *config.database().dialect() != Dialect::Postgres {
        return Err(format!(
            "the CLI only connects to postgres, configured dialect is {}",
            config.database().dialect()
        )
        .into());
    }
    let catalog_path = config
        .catalog()
        .clone()
        .ok_or("configuration does not name a catalog")?;
    let url = config
        .database()
        .url()
        .clone()
        .ok_or("no database URL configured")?;

    let catalog = CatalogMetadataStore::from_file(&catalog_path)?;
    let pool = create_pool(&url, *config.database().pool_size())?;
    let connections = StaticConnectionResolver::single(Arc::new(PgTableConnection::new(pool)));
    let service = TableService::new(Arc::new(catalog), Arc::new(connections), *config.pagination());
    info!(catalog = ?catalog_path, "Table service ready");

    match args.command {
        Command::List {
            table,
            view,
            fields,
            sort,
            filter,
            offset,
            limit,
        } => {
            let params = ListParams {
                view_id: view,
                fields: (!fields.is_empty()).then_some(OneOrMany::Many(fields)),
                sort: (!sort.is_empty()).then_some(OneOrMany::Many(sort)),
                filter,
                offset,
                limit,
            };
            print_json(&service.list(&table, &params).await?)?;
        }
        Command::Read { table, row, view } => {
            print_json(&service.read(&table, &row, view.as_deref()).await?)?;
        }
        Command::Count {
            table,
            view,
            filter,
        } => {
            print_json(&service.count(&table, view.as_deref(), filter.as_deref()).await?)?;
        }
        Command::Insert(args) => {
            let body = args.payload()?;
            print_json(&service.insert(&args.table, args.view.as_deref(), body).await?)?;
        }
        Command::Update(args) => {
            let body = args.payload()?;
            print_json(&service.update(&args.table, args.view.as_deref(), body).await?)?;
        }
        Command::Delete(args) => {
            let body = args.payload()?;
            print_json(&service.delete(&args.table, args.view.as_deref(), body).await?)?;
        }
    }

    Ok(())
}
