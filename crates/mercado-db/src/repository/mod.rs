//! # Repository Module
//!
//! Database repository implementations for the Mercado store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Database (pool handle)                                                │
//! │  ├── catalog()    → CatalogRepository     categories, brands           │
//! │  ├── products()   → ProductRepository     catalog products             │
//! │  ├── customers()  → CustomerRepository    customers                    │
//! │  ├── orders()     → OrderRepository       create / cancel / update     │
//! │  │                    └── order_number    per-day atomic counter       │
//! │  └── dashboard()  → DashboardRepository   read-only aggregates         │
//! │                                                                         │
//! │  Each repository holds a clone of the pool. Multi-statement writes     │
//! │  run in one transaction owned by the repository method.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Categories and brands
//! - [`ProductRepository`](product::ProductRepository) - Product lookup and listing
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers
//! - [`OrderRepository`](order::OrderRepository) - The order engine
//! - [`DashboardRepository`](dashboard::DashboardRepository) - Reports

use uuid::Uuid;

pub mod catalog;
pub mod customer;
pub mod dashboard;
pub mod order;
pub mod order_number;
pub mod product;

/// Generates a new row ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
