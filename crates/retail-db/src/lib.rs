//! # retail-db: Database Layer for the Retail Back Office
//!
//! SQLite storage for the sales, inventory and returns core, and every
//! transaction boundary in the system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Retail Back Office Data Flow                       │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    retail-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Engines      │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  sale.rs      │    │  (embedded)  │  │   │
//! │  │   │               │    │  returns.rs   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  stock.rs     │    │ 001 ... 004  │  │   │
//! │  │   │ WAL, busy     │    │  loyalty.rs   │    │              │  │   │
//! │  │   │ timeout       │    │  invoice.rs   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (retail.db)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ledgers, engines, lookups and reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use retail_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("retail.db")).await?;
//!
//! let sale = db.sales().create_sale(&request).await?;
//! let levels = db.stock().list_positions(&InventoryFilter::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

mod rows;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::loyalty::LoyaltyRepository;
pub use repository::report::ReportRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockRepository;
