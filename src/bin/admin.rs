//! `tubeshare-admin` manages categories directly against the database.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tubeshare::app::categories::CategoryService;
use tubeshare::config::AppConfig;
use tubeshare::infra::db::{violated_constraint, Db};

#[derive(Parser, Debug)]
#[command(name = "tubeshare-admin", about = "Tubeshare administration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Category management.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    /// Add a category.
    Add {
        name: String,
        /// Emoji, short label, or http(s) image URL.
        logo: String,
    },
    /// Rename a category or change its logo.
    Edit {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        logo: Option<String>,
    },
    /// List all categories.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let (database_url, max_connections) = AppConfig::database_from_env()?;
    let db = Db::connect_url(&database_url, max_connections).await?;
    let categories = CategoryService::new(db);

    match cli.command {
        Commands::Category { action } => match action {
            CategoryAction::Add { name, logo } => {
                let category = categories.create(&name, &logo).await.map_err(|err| {
                    match violated_constraint(&err) {
                        Some(_) => anyhow!("a category named \"{}\" already exists", name.trim()),
                        None => err,
                    }
                })?;
                tracing::info!(category_id = %category.id, "category created");
                println!("{}\t{}\t{}", category.id, category.name, category.logo);
            }
            CategoryAction::Edit { id, name, logo } => {
                if name.is_none() && logo.is_none() {
                    return Err(anyhow!("nothing to change: pass --name and/or --logo"));
                }
                let category = categories
                    .update(id, name.as_deref(), logo.as_deref())
                    .await?
                    .ok_or_else(|| anyhow!("category {} not found", id))?;
                tracing::info!(category_id = %category.id, "category updated");
                println!("{}\t{}\t{}", category.id, category.name, category.logo);
            }
            CategoryAction::List => {
                for category in categories.list().await? {
                    println!("{}\t{}\t{}", category.id, category.name, category.logo);
                }
            }
        },
    }

    Ok(())
}
