//! # mercado-db: SQLite Store for the Mercado Back Office
//!
//! Persistence and the transactional order engine. Business rules come from
//! `mercado-core`; this crate makes them atomic.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Data Flow                                │
//! │                                                                         │
//! │  Service layer: create / cancel / update / dashboard                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   mercado-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │               │    │                │    │              │  │   │
//! │  │   │ SqlitePool    │    │ OrderRepo      │    │ 001_initial_ │  │   │
//! │  │   │ DbConfig      │◄───│ DashboardRepo  │    │   schema.sql │  │   │
//! │  │   │ MercadoConfig │    │ Product/Cust.. │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              SQLite Database (WAL, foreign keys on)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercado_db::{Database, MercadoConfig};
//! use mercado_core::{NewOrder, NewOrderItem};
//!
//! let config = MercadoConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let order = db
//!     .orders()
//!     .create(&NewOrder::new(customer_id, vec![NewOrderItem::new(product_id, 2, 100)]).tax(16))
//!     .await?;
//! let dashboard = db.dashboard().dashboard_stats().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, MercadoConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::customer::CustomerRepository;
pub use repository::dashboard::DashboardRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
