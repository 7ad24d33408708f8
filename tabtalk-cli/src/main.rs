//! tabtalk CLI
//!
//! Entry points:
//! - `ask`: run the agent once against a question
//! - `import`: load a CSV file into the analytics database
//! - `tables`: list user tables

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tabtalk_agent::{Agent, AgentConfig};
use tabtalk_core::ProviderSettings;
use tabtalk_llm::OpenAiCompatClient;
use tabtalk_tools::{register_builtin_tools, ToolRegistry};

mod import;

#[derive(Parser, Debug)]
#[command(name = "tabtalk")]
#[command(about = "Tool-calling analytics agent over a local SQLite database")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Ask the agent one question
    Ask {
        /// The question, in natural language
        question: String,

        /// Database path
        #[arg(long, default_value = "tabtalk.db")]
        db: PathBuf,

        /// Directory chart files are written into
        #[arg(long, default_value = "charts")]
        charts_dir: PathBuf,

        /// Model id (overrides TABTALK_MODEL)
        #[arg(long)]
        model: Option<String>,
    },

    /// Import a CSV file into the database
    Import {
        /// CSV file with a header row
        #[arg(long)]
        csv: PathBuf,

        /// Destination table name
        #[arg(long)]
        table: String,

        /// Database path
        #[arg(long, default_value = "tabtalk.db")]
        db: PathBuf,
    },

    /// List user tables in the database
    Tables {
        /// Database path
        #[arg(long, default_value = "tabtalk.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from /etc/tabtalk/environment or .env (if present)
    tabtalk_core::config::load_environment();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tabtalk_cli=info".parse()?)
                .add_directive("tabtalk_agent=info".parse()?)
                .add_directive("tabtalk_tools=info".parse()?)
                .add_directive("tabtalk_llm=info".parse()?),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Ask {
            question,
            db,
            charts_dir,
            model,
        } => {
            let settings = ProviderSettings::from_env()?;
            let provider = Arc::new(OpenAiCompatClient::from_settings(&settings));

            let mut registry = ToolRegistry::new();
            register_builtin_tools(&mut registry)?;
            info!("Initialized tool registry with {} tools", registry.len());

            let config = AgentConfig {
                model: model.unwrap_or(settings.model),
                db_path: db,
                charts_dir,
                ..AgentConfig::default()
            };

            let agent = Agent::new(provider, Arc::new(registry), config);
            let answer = agent.run(&question).await?;
            println!("{}", answer);
        }

        Commands::Import { csv, table, db } => {
            let report = import::import_csv(&csv, &table, &db)?;
            println!(
                "Imported {} rows into '{}' ({} skipped)",
                report.inserted, table, report.skipped
            );
        }

        Commands::Tables { db } => {
            for name in list_tables(&db)? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

fn list_tables(db_path: &PathBuf) -> Result<Vec<String>> {
    let conn = rusqlite::Connection::open(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}
