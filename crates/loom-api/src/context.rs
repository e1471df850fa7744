//! Shared state handed to every command.

use std::sync::Arc;

use loom_core::types::TaxRate;
use loom_core::{ChargePolicy, FlatCharges, Money};
use loom_db::{Database, DbConfig};

use crate::config::AppConfig;
use crate::error::ApiResult;

/// Request handlers borrow this; it holds no per-request state.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    /// Shipping and tax for storefront checkout.
    pub checkout_policy: Arc<dyn ChargePolicy>,
    /// Tax for counter sales (shipping is never charged at the counter).
    pub counter_policy: Arc<dyn ChargePolicy>,
    /// Default page size for listings.
    pub page_size: u32,
}

impl AppContext {
    pub fn new(
        db: Database,
        checkout_policy: Arc<dyn ChargePolicy>,
        counter_policy: Arc<dyn ChargePolicy>,
        page_size: u32,
    ) -> Self {
        AppContext {
            db,
            checkout_policy,
            counter_policy,
            page_size,
        }
    }

    /// Opens the database and builds the charge policies from `config`.
    pub async fn from_config(config: &AppConfig) -> ApiResult<Self> {
        let db = Database::new(
            DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
        )
        .await?;

        let checkout_policy = FlatCharges::new(
            Money::from_minor(config.shipping_flat),
            TaxRate::from_bps(config.checkout_tax_bps),
        );
        let counter_policy =
            FlatCharges::new(Money::zero(), TaxRate::from_bps(config.counter_tax_bps));

        Ok(AppContext::new(
            db,
            Arc::new(checkout_policy),
            Arc::new(counter_policy),
            config.page_size,
        ))
    }

    /// Context over an existing database with no shipping and no tax.
    pub fn with_zero_charges(db: Database) -> Self {
        AppContext::new(
            db,
            Arc::new(loom_core::ZeroCharges),
            Arc::new(loom_core::ZeroCharges),
            20,
        )
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("db", &self.db)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
