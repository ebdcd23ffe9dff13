//! # Dashboard Repository
//!
//! Read-only aggregates over catalog and orders.
//!
//! ## Consistent Snapshots
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  dashboard_stats()                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN            ← one WAL read snapshot for the whole report         │
//! │  ├── overview          products / categories / orders                  │
//! │  ├── recent orders     + customer, + line count                        │
//! │  ├── low stock         ACTIVE, stock ≤ threshold, ascending            │
//! │  └── top selling       GROUP BY product_id, SUM(quantity)              │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  A create committed halfway through is either in every metric or in    │
//! │  none of them. Writers are never blocked.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Joined records that have disappeared (a product referenced by old order
//! items) surface as `None` instead of failing the report.

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::order::{fetch_order_stats, fetch_recent_orders, load_detail};
use crate::repository::product::{fetch_product, PRODUCT_COLUMNS};
use mercado_core::{
    summarize_sales, CategoryStats, DashboardStats, InventoryReport, InventoryStats, OrderDetail,
    OverviewReport, Product, ReportSettings, SaleRecord, SalesReport, TopProduct,
};

/// Repository for dashboard reports.
#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
    settings: ReportSettings,
}

impl DashboardRepository {
    /// Creates a new DashboardRepository.
    pub fn new(pool: SqlitePool, settings: ReportSettings) -> Self {
        DashboardRepository { pool, settings }
    }

    /// Overview, recent orders, low-stock list and top sellers.
    pub async fn dashboard_stats(&self) -> DbResult<DashboardStats> {
        debug!("Building dashboard stats");
        let mut tx = self.pool.begin().await?;

        let overview = overview(&mut tx).await?;
        let recent_orders = fetch_recent_orders(&mut tx, self.settings.recent_orders_limit).await?;
        let low_stock_products = low_stock(
            &mut tx,
            0,
            self.settings.low_stock_threshold,
            self.settings.low_stock_limit,
        )
        .await?;
        let top_selling_products = top_products(&mut tx, self.settings.dashboard_top_products).await?;

        tx.commit().await?;

        Ok(DashboardStats {
            overview,
            recent_orders,
            low_stock_products,
            top_selling_products,
        })
    }

    /// Headline numbers only.
    pub async fn overview(&self) -> DbResult<OverviewReport> {
        let mut tx = self.pool.begin().await?;
        let report = overview(&mut tx).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Best sellers by units, all orders included.
    ///
    /// Ties keep the order in which the products were first sold.
    pub async fn top_products(&self) -> DbResult<Vec<TopProduct>> {
        let mut tx = self.pool.begin().await?;
        let top = top_products(&mut tx, self.settings.top_products_limit).await?;
        tx.commit().await?;
        Ok(top)
    }

    /// Sales over the last `days` days, ending now.
    pub async fn sales_stats(&self, days: i64) -> DbResult<SalesReport> {
        self.sales_stats_at(days, Utc::now()).await
    }

    /// Sales over the `days` days ending at `now`.
    ///
    /// ## Returns
    /// * `Err(kind = Validation)` - `days` outside 1..=3650
    pub async fn sales_stats_at(&self, days: i64, now: DateTime<Utc>) -> DbResult<SalesReport> {
        mercado_core::validation::validate_sales_window(days)?;
        debug!(days, "Building sales report");

        // RFC 3339 UTC text compares in time order.
        let start = now - Duration::days(days);
        let records = sqlx::query_as::<_, SaleRecord>(
            r#"
            SELECT status, total_cents, created_at
            FROM orders
            WHERE status != 'CANCELLED' AND created_at >= ?1 AND created_at <= ?2
            "#,
        )
        .bind(start)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(summarize_sales(
            &records,
            now,
            days,
            self.settings.max_daily_buckets,
        )?)
    }

    /// Active stock, value, low/out-of-stock products and per-category totals.
    pub async fn inventory_summary(&self) -> DbResult<InventoryReport> {
        debug!("Building inventory summary");
        let mut tx = self.pool.begin().await?;

        let (total_products, total_value_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(price_cents * stock), 0)
            FROM products
            WHERE status = 'ACTIVE'
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        let low_stock_products = low_stock(
            &mut tx,
            1,
            self.settings.low_stock_threshold,
            self.settings.low_stock_limit,
        )
        .await?;

        let out_of_stock_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE status = 'ACTIVE' AND stock = 0",
        )
        .fetch_one(&mut *tx)
        .await?;

        let category_stats = category_stats(&mut tx).await?;

        tx.commit().await?;

        Ok(InventoryReport {
            total_products,
            total_value_cents,
            low_stock_products,
            out_of_stock_count,
            category_stats,
        })
    }

    /// Product counters by status and stock level.
    pub async fn inventory_stats(&self) -> DbResult<InventoryStats> {
        let (
            total_products,
            active_products,
            inactive_products,
            out_of_stock_products,
            low_stock_products,
            inventory_value_cents,
        ): (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(status = 'ACTIVE'), 0),
                COALESCE(SUM(status = 'INACTIVE'), 0),
                COALESCE(SUM(status = 'ACTIVE' AND stock = 0), 0),
                COALESCE(SUM(status = 'ACTIVE' AND stock > 0 AND stock <= ?1), 0),
                COALESCE(SUM(CASE WHEN status = 'ACTIVE' THEN price_cents * stock ELSE 0 END), 0)
            FROM products
            "#,
        )
        .bind(self.settings.low_stock_threshold)
        .fetch_one(&self.pool)
        .await?;

        Ok(InventoryStats {
            total_products,
            active_products,
            inactive_products,
            out_of_stock_products,
            low_stock_products,
            inventory_value_cents,
        })
    }

    /// Most recent non-cancelled orders with their items.
    pub async fn recent_sales(&self) -> DbResult<Vec<OrderDetail>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM orders
            WHERE status != 'CANCELLED'
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(self.settings.recent_sales_limit))
        .fetch_all(&mut *tx)
        .await?;

        let mut sales = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(detail) = load_detail(&mut tx, id).await? {
                sales.push(detail);
            }
        }

        tx.commit().await?;
        Ok(sales)
    }
}

// =============================================================================
// Report Parts
// =============================================================================

async fn overview(conn: &mut SqliteConnection) -> DbResult<OverviewReport> {
    let (total_products, inventory_value_cents, total_stock): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(price_cents * stock), 0), COALESCE(SUM(stock), 0)
        FROM products
        WHERE status = 'ACTIVE'
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    let total_categories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(&mut *conn)
        .await?;

    let orders = fetch_order_stats(&mut *conn).await?;

    Ok(OverviewReport {
        total_products,
        total_categories,
        total_orders: orders.total_orders,
        total_revenue_cents: orders.total_revenue_cents,
        inventory_value_cents,
        total_stock,
    })
}

/// ACTIVE products with `min_stock <= stock <= threshold`, ascending by stock.
async fn low_stock(
    conn: &mut SqliteConnection,
    min_stock: i64,
    threshold: i64,
    limit: u32,
) -> DbResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS} FROM products
        WHERE status = 'ACTIVE' AND stock >= ?1 AND stock <= ?2
        ORDER BY stock ASC, name ASC
        LIMIT ?3
        "#
    ))
    .bind(min_stock)
    .bind(threshold)
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await?;

    Ok(products)
}

async fn top_products(conn: &mut SqliteConnection, limit: u32) -> DbResult<Vec<TopProduct>> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT product_id, SUM(quantity) AS total_sold, COUNT(DISTINCT order_id) AS orders_count
        FROM order_items
        GROUP BY product_id
        ORDER BY total_sold DESC, MIN(rowid) ASC
        LIMIT ?1
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await?;

    let mut top = Vec::with_capacity(rows.len());
    for (product_id, total_sold, orders_count) in rows {
        let product = fetch_product(&mut *conn, &product_id).await?;
        top.push(TopProduct {
            product_id,
            product,
            total_sold,
            orders_count,
        });
    }
    Ok(top)
}

async fn category_stats(conn: &mut SqliteConnection) -> DbResult<Vec<CategoryStats>> {
    let rows: Vec<(String, String, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT
            c.id,
            c.name,
            COUNT(p.id),
            COALESCE(SUM(CASE WHEN p.status = 'ACTIVE' THEN p.stock ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN p.status = 'ACTIVE' THEN p.price_cents * p.stock ELSE 0 END), 0)
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id
        GROUP BY c.id, c.name
        ORDER BY c.name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(category_id, category, total_products, total_stock, total_value_cents)| CategoryStats {
                category_id,
                category,
                total_products,
                total_stock,
                total_value_cents,
            },
        )
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================
