mod commands;
mod config;
mod gemini;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    EditFields, ProfileFields, cmd_add, cmd_confirm, cmd_delete, cmd_edit, cmd_history,
    cmd_pending, cmd_profile_set, cmd_profile_show, cmd_recalc, cmd_skip, cmd_today, cmd_week,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use morsel_core::store::SqliteStore;
use morsel_core::tracker::Tracker;

#[derive(Parser)]
#[command(
    name = "morsel",
    version,
    about = "Log meals in plain language and keep an eye on your daily calorie budget"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe what you ate (or your stats) and queue the result for review
    Add {
        /// Free text, e.g. "two eggs and a slice of toast"
        text: String,
        /// Meal: breakfast, lunch, dinner, snack (default: by time of day)
        #[arg(short, long)]
        meal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the entry currently under review
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save the entry under review, optionally with corrections
    Confirm {
        #[command(flatten)]
        fields: EditFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard the entry under review (or cancel an edit)
    Skip {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open a saved entry for correction
    Edit {
        /// Entry ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-estimate nutrition for the entry under review
    Recalc {
        /// Food description
        #[arg(long)]
        name: Option<String>,
        /// Portion amount
        #[arg(long)]
        amount: Option<String>,
        /// Portion unit
        #[arg(long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved entry
    Delete {
        /// Entry ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Today's intake against the daily goal
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calories per day for the current Saturday-to-Friday week
    Week {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved entries, most recent first
    History {
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage body stats and the daily goal
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Compute and save the daily goal from body stats
    Set {
        #[command(flatten)]
        fields: ProfileFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the saved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.settings.logging.level);

    let store = SqliteStore::open(&config.db_path)?;
    let mut tracker = Tracker::open(Box::new(store))?;

    match cli.command {
        Commands::Add { text, meal, json } => {
            let client = GeminiClient::new(&config.settings.inference)?;
            cmd_add(&mut tracker, &client, &text, meal.as_deref(), json)
        }
        Commands::Pending { json } => cmd_pending(&tracker, json),
        Commands::Confirm { fields, json } => cmd_confirm(&mut tracker, &fields, json),
        Commands::Skip { json } => cmd_skip(&mut tracker, json),
        Commands::Edit { id, json } => cmd_edit(&mut tracker, &id, json),
        Commands::Recalc {
            name,
            amount,
            unit,
            json,
        } => {
            let client = GeminiClient::new(&config.settings.inference)?;
            cmd_recalc(
                &mut tracker,
                &client,
                name.as_deref(),
                amount.as_deref(),
                unit.as_deref(),
                json,
            )
        }
        Commands::Delete { id, json } => cmd_delete(&mut tracker, &id, json),
        Commands::Today { json } => cmd_today(&tracker, json),
        Commands::Week { json } => cmd_week(&tracker, json),
        Commands::History { limit, json } => cmd_history(&tracker, limit, json),
        Commands::Profile { command } => match command {
            ProfileCommands::Set { fields, json } => cmd_profile_set(&mut tracker, &fields, json),
            ProfileCommands::Show { json } => cmd_profile_show(&tracker, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, created) = config.load_or_create_api_key()?;
                if created {
                    eprintln!("Generated new API key: {key}");
                    eprintln!("Include in requests: Authorization: Bearer {key}");
                }
                Some(key)
            };
            let client = GeminiClient::new(&config.settings.inference)?;
            server::start_server(tracker, client, port, &bind, api_key).await
        }
    }
}
