//! # Repository Module
//!
//! Database access for the back office, one module per component.
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engines own a transaction and call the ledgers on its connection:     │
//! │                                                                         │
//! │  SaleRepository::create_sale ─┬─► invoice::next_invoice_number         │
//! │                               ├─► catalog::resolve_product, ...        │
//! │                               ├─► stock::consume_for_sale              │
//! │                               └─► loyalty::earn                        │
//! │                                                                         │
//! │  SaleRepository::void_sale  ──┬─► stock::restore_for_return            │
//! │  ReturnRepository::create_return └─► loyalty::reverse                  │
//! │                                                                         │
//! │  Ledger primitives take `&mut SqliteConnection`, so they run inside   │
//! │  whichever transaction the caller opened. Dropping that transaction   │
//! │  without commit rolls all of it back.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`StockRepository`](stock::StockRepository) - Positions, movements, adjust, stock take, transfer
//! - [`SaleRepository`](sale::SaleRepository) - Create, void, read sales
//! - [`ReturnRepository`](returns::ReturnRepository) - Returns and returnable sales
//! - [`LoyaltyRepository`](loyalty::LoyaltyRepository) - Point history, reconciliation, manual adjustments
//! - [`catalog`] - Read-only reference lookups on a connection
//! - [`ReportRepository`](report::ReportRepository) - Sales and returns statistics

pub mod catalog;
pub mod invoice;
pub mod loyalty;
pub mod report;
pub mod returns;
pub mod sale;
pub mod stock;
