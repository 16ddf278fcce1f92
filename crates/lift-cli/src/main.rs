use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lift_core::AccountId;
use lift_gateway::{HttpGateway, SalesApi};
use lift_pipeline::{
    format_percentage, CategoryFilter, OfferFilter, SalesQuery, SortDirection, SortKey, SortSpec,
};
use lift_web::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lift-cli")]
#[command(about = "Lift conversion dashboard command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the dashboard web server.
    Serve {
        /// Listen port; falls back to LIFT_WEB_PORT, then 8900.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the aggregated sales table to stdout.
    Sales {
        /// Restrict to one offer by exact name.
        #[arg(long, default_value = "all")]
        offer: String,
        /// Restrict to one resource type.
        #[arg(long, default_value = "all")]
        category: String,
        /// Sort column: clicks, sales, call_bookings, views, click_pct, sales_pct.
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending instead of ascending.
        #[arg(long)]
        desc: bool,
        /// Case-insensitive name/title substring filter.
        #[arg(long, default_value = "")]
        search: String,
    },
}

fn account_from_env() -> Result<AccountId> {
    let id = std::env::var("LIFT_ACCOUNT_ID").context("LIFT_ACCOUNT_ID must be set")?;
    Ok(AccountId::new(id))
}

fn port_from_env() -> u16 {
    std::env::var("LIFT_WEB_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8900)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let account = account_from_env()?;
            let gateway = HttpGateway::from_env()?;
            let port = port.unwrap_or_else(port_from_env);
            let state = AppState::new(Arc::new(gateway), account);
            info!(port, "starting dashboard server");
            lift_web::serve(state, port).await?;
        }
        Commands::Sales {
            offer,
            category,
            sort,
            desc,
            search,
        } => {
            let account = account_from_env()?;
            let gateway = HttpGateway::from_env()?;
            let resources = gateway.fetch_sales_data(&account).await?;

            let key = sort.as_deref().and_then(|value| value.parse::<SortKey>().ok());
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let query = SalesQuery {
                offer: OfferFilter::from_param(&offer),
                category: CategoryFilter::from_param(&category),
                search,
                sort: SortSpec { key, direction },
            };
            let rows = lift_pipeline::run(&resources, &query);

            println!(
                "{:<10} {:<40} {:>8} {:>8} {:>10} {:>10} {:>10}",
                "type", "name", "clicks", "sales", "views", "click%", "sales%"
            );
            for row in rows {
                let views = row
                    .resource
                    .views
                    .map(|views| views.to_string())
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "{:<10} {:<40} {:>8} {:>8} {:>10} {:>10} {:>10}",
                    row.resource.category.to_string(),
                    row.resource.display_title(),
                    row.total_clicks,
                    row.total_sales,
                    views,
                    format_percentage(row.click_percentage()),
                    format_percentage(row.sales_percentage()),
                );
            }
        }
    }

    Ok(())
}
