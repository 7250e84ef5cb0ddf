//! Products CLI
//!
//! Reads, writes and lists products in the configured Cosmos DB container.
//! Connection settings come from `COSMOS_*` environment variables; results
//! are printed as JSON on stdout.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::cosmos::{CosmosClient, check_health_detailed};
use domain_products::{CosmosProductRepository, Product, ProductRepository};
use eyre::{Result, WrapErr};
use tracing::info;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "products-cli")]
#[command(about = "Manage products stored in Cosmos DB")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or replace a product
    Save {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Insert a product, failing if the id already exists
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Print a product, or `null` when it does not exist
    Get { id: String },

    /// Delete a product (succeeds when already absent)
    Delete { id: String },

    /// Print every stored product
    List,

    /// Check that the database is reachable with the configured credentials
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!(
        endpoint = %config.cosmos.endpoint(),
        database = %config.cosmos.database(),
        container = %config.cosmos.container(),
        "Using Cosmos DB container"
    );

    let repository = CosmosProductRepository::new(&config.cosmos)
        .wrap_err("Failed to create product repository")?;

    run(&repository, &config, cli.command).await
}

async fn health(config: &Config) -> Result<()> {
    let database = CosmosClient::from_config(&config.cosmos)?.database(config.cosmos.database());
    let status = check_health_detailed(&database).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "healthy": status.healthy,
            "message": status.message,
            "response_time_ms": status.response_time_ms,
        }))?
    );

    if !status.healthy {
        eyre::bail!("Cosmos DB health check failed");
    }
    Ok(())
}

async fn run(repository: &dyn ProductRepository, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Save {
            id,
            name,
            description,
        } => {
            let product = Product::new(id, name, description);
            repository
                .save(&product)
                .await
                .wrap_err_with(|| format!("Failed to save product {}", product.id))?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }

        Commands::Create {
            id,
            name,
            description,
        } => {
            let product = Product::new(id, name, description);
            repository
                .create(&product)
                .await
                .wrap_err_with(|| format!("Failed to create product {}", product.id))?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }

        Commands::Get { id } => {
            let product = repository
                .get(&id)
                .await
                .wrap_err_with(|| format!("Failed to fetch product {id}"))?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }

        Commands::Delete { id } => {
            repository
                .delete(&id)
                .await
                .wrap_err_with(|| format!("Failed to delete product {id}"))?;
            info!(product_id = %id, "Product deleted");
        }

        Commands::List => {
            let products = repository.list().await.wrap_err("Failed to list products")?;
            info!(count = products.len(), "Listed products");
            println!("{}", serde_json::to_string_pretty(&products)?);
        }

        Commands::Health => health(config).await?,
    }

    Ok(())
}
