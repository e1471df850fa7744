//! # loom
//!
//! Operator CLI over the same commands the storefront and counter use.
//!
//! ## Usage
//! ```bash
//! loom health                       # open database, apply migrations
//! loom low-stock                    # items at or below their minimum
//! loom verify <ITEM_ID>             # replay an item's stock log
//! loom token <ROLE> <ID>            # issue a bearer token (customer|cashier|admin)
//! ```
//!
//! Configuration comes from `LOOM_*` environment variables.

use anyhow::{bail, Context};
use tracing::info;

use loom_api::commands::stock;
use loom_api::{init_tracing, AppConfig, AppContext, JwtPrincipalResolver, Principal, StaffRole};

/// The CLI acts with an admin principal.
const OPERATOR_ID: &str = "loom-cli";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(db = %config.database_path, "Configuration loaded");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    if command == "token" {
        let (role, id) = match (args.get(1), args.get(2)) {
            (Some(role), Some(id)) => (role.as_str(), id.as_str()),
            _ => bail!("Usage: loom token <customer|cashier|admin> <ID>"),
        };
        let principal = match role {
            "customer" => Principal::customer(id),
            other => Principal::staff(id, other.parse::<StaffRole>()?),
        };
        let resolver = JwtPrincipalResolver::new(&config.jwt_secret, config.jwt_lifetime_secs);
        println!("{}", resolver.issue(&principal)?);
        return Ok(());
    }

    let ctx = AppContext::from_config(&config).await?;
    let operator = Principal::staff(OPERATOR_ID, StaffRole::Admin);

    match command {
        "health" => {
            if !ctx.db.health_check().await {
                bail!("Database health check failed");
            }
            println!("ok ({} items)", ctx.db.items().count().await?);
        }
        "low-stock" => {
            for item in stock::low_stock(&ctx, &operator).await? {
                println!(
                    "{:<16} {:>6} (min {:>4})  {}",
                    item.code, item.quantity, item.min_stock, item.name
                );
            }
        }
        "verify" => {
            let item_id = args.get(1).context("Usage: loom verify <ITEM_ID>")?;
            let report = stock::verify_log_chain(&ctx, &operator, item_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_consistent() {
                bail!("Stock log does not reconstruct the ledger for {}", item_id);
            }
        }
        _ => {
            println!("Usage: loom <health|low-stock|verify <ITEM_ID>|token <ROLE> <ID>>");
        }
    }

    ctx.db.close().await;
    Ok(())
}
