//! # mercado-core: Pure Business Logic for the Mercado Back Office
//!
//! Order, inventory and reporting rules as pure functions. Nothing in this
//! crate touches a database, a file or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP / admin UI (outside this workspace)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ mercado-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   order   │  │  status   │  │  report   │  │   │
//! │  │   │  Product  │  │ NewOrder  │  │  state    │  │ Dashboard │  │   │
//! │  │   │   Order   │  │ Update    │  │  machine  │  │  Sales    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌──────────────┐  ┌────────────┐              │   │
//! │  │   │   money   │  │ order_number │  │ validation │              │   │
//! │  │   └───────────┘  └──────────────┘  └────────────┘              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                mercado-db (SQLite store)                        │   │
//! │  │     transactions, stock decrements, order numbers, reports      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Customer, Order, OrderItem, ...)
//! - [`money`] - Integer-cent money
//! - [`order`] - Order intents: pricing a new order, planning an update
//! - [`status`] - Order status transition table
//! - [`order_number`] - `YYMMDDNNNN` order numbers
//! - [`report`] - Dashboard and sales report shapes
//! - [`validation`] - Field validators
//! - [`error`] - Domain errors and their kinds
//!
//! ## Example Usage
//!
//! ```rust
//! use mercado_core::{NewOrder, NewOrderItem};
//!
//! let customer = "6f1c2a4e-1111-4c3b-9a55-000000000001";
//! let product = "6f1c2a4e-2222-4c3b-9a55-000000000001";
//!
//! let order = NewOrder::new(customer, vec![NewOrderItem::new(product, 2, 100)]).tax(16);
//! let priced = order.price().unwrap();
//!
//! assert_eq!(priced.subtotal.cents(), 200);
//! assert_eq!(priced.total.cents(), 216);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod order;
pub mod order_number;
pub mod report;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use order::{
    NewOrder, NewOrderItem, OrderChange, OrderUpdate, PricedItem, PricedOrder, UpdatePlan,
};
pub use order_number::OrderNumber;
pub use report::{
    summarize_sales, CategoryStats, DailySales, DashboardStats, InventoryReport,
    InventoryStats, OrderStats, OverviewReport, RecentOrder, ReportSettings, SaleRecord,
    SalesReport, TopProduct,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines in a single order.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity on a single order line.
///
/// ## Business Reason
/// Catches typos (1000 instead of 10) before stock is reserved.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest accepted unit price, in cents ($10,000,000.00).
///
/// Keeps `price × stock` and order totals far enough below `i64::MAX` that
/// store-wide sums never overflow.
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Highest accepted tax or shipping charge on one order, in cents.
pub const MAX_CHARGE_CENTS: i64 = 1_000_000_000;

/// Highest stock level a product may be created with.
pub const MAX_STOCK: i64 = 1_000_000;

/// Longest look-back accepted by the sales report, in days.
pub const MAX_SALES_WINDOW_DAYS: i64 = 3650;

/// Active products at or below this stock are reported as low on stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;
