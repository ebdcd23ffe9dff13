//! # Reports
//!
//! Shapes returned by the dashboard aggregator, plus the pure part of the
//! sales report (window filtering and daily bucketing).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  getSalesStats(days = 7), now = 2026-10-16T12:00Z                       │
//! │                                                                         │
//! │  window = [2026-10-09T12:00Z, 2026-10-16T12:00Z], CANCELLED dropped    │
//! │                                                                         │
//! │  2026-10-10 │ ██        2 orders   $300.00                             │
//! │  2026-10-14 │ █         1 order    $216.00                             │
//! │  2026-10-16 │ ███       3 orders   $450.00                             │
//! │             └──────────────────────────────────                         │
//! │  Σ buckets  = sales_revenue = $966.00                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Customer, Order, OrderStatus, Product};
use crate::validation::validate_sales_window;

// =============================================================================
// Settings
// =============================================================================

/// Thresholds and list caps used by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettings {
    /// Active products with `stock <= low_stock_threshold` are low on stock.
    pub low_stock_threshold: i64,
    pub low_stock_limit: u32,
    pub top_products_limit: u32,
    pub dashboard_top_products: u32,
    pub recent_orders_limit: u32,
    pub recent_sales_limit: u32,
    /// Most recent daily buckets kept in a sales report.
    pub max_daily_buckets: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            low_stock_threshold: crate::DEFAULT_LOW_STOCK_THRESHOLD,
            low_stock_limit: 10,
            top_products_limit: 10,
            dashboard_top_products: 5,
            recent_orders_limit: 5,
            recent_sales_limit: 10,
            max_daily_buckets: 30,
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Headline numbers of the back office.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    /// ACTIVE products.
    pub total_products: i64,
    pub total_categories: i64,
    /// All orders, cancelled included.
    pub total_orders: i64,
    /// Σ total over non-cancelled orders.
    pub total_revenue_cents: i64,
    /// Σ price × stock over ACTIVE products.
    pub inventory_value_cents: i64,
    /// Σ stock over ACTIVE products.
    pub total_stock: i64,
}

/// An order as listed on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
    pub item_count: i64,
}

/// Units sold of one product across all order items.
///
/// `product` is `None` when the product row is gone; the entry is kept.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    pub product: Option<Product>,
    pub total_sold: i64,
    /// Distinct orders containing the product.
    pub orders_count: i64,
}

/// Everything shown on the dashboard landing page.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub overview: OverviewReport,
    pub recent_orders: Vec<RecentOrder>,
    pub low_stock_products: Vec<Product>,
    pub top_selling_products: Vec<TopProduct>,
}

/// Order counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub total_revenue_cents: i64,
}

// =============================================================================
// Inventory
// =============================================================================

/// Product counters by status and stock level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total_products: i64,
    pub active_products: i64,
    pub inactive_products: i64,
    /// ACTIVE with stock = 0.
    pub out_of_stock_products: i64,
    /// ACTIVE with 0 < stock <= threshold.
    pub low_stock_products: i64,
    pub inventory_value_cents: i64,
}

/// Stock held in one category (ACTIVE products only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category_id: String,
    pub category: String,
    /// Products of any status in the category.
    pub total_products: i64,
    pub total_stock: i64,
    pub total_value_cents: i64,
}

/// Inventory summary with per-category breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    /// ACTIVE products.
    pub total_products: i64,
    /// Σ price × stock over ACTIVE products.
    pub total_value_cents: i64,
    /// ACTIVE with 0 < stock <= threshold, ascending by stock.
    pub low_stock_products: Vec<Product>,
    pub out_of_stock_count: i64,
    pub category_stats: Vec<CategoryStats>,
}

// =============================================================================
// Sales
// =============================================================================

/// The two columns of an order the sales report needs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleRecord {
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// One calendar day (UTC) of sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub orders_count: i64,
    pub total_revenue_cents: i64,
}

/// Sales over the last `days` days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub days: i64,
    #[ts(as = "String")]
    pub period_start: DateTime<Utc>,
    #[ts(as = "String")]
    pub period_end: DateTime<Utc>,
    pub total_sales: i64,
    pub sales_revenue_cents: i64,
    /// Mean order total, rounded half-up to whole cents.
    pub average_order_value_cents: i64,
    /// Ascending by date, at most `max_daily_buckets` most recent days.
    pub daily_sales: Vec<DailySales>,
}

/// Builds a sales report from raw order records.
///
/// Keeps records with `created_at` in `[now - days, now]` whose status is not
/// CANCELLED, then buckets them per UTC calendar day.
pub fn summarize_sales(
    records: &[SaleRecord],
    now: DateTime<Utc>,
    days: i64,
    max_buckets: usize,
) -> CoreResult<SalesReport> {
    validate_sales_window(days)?;
    let start = now - Duration::days(days);

    let mut total_sales = 0_i64;
    let mut revenue = Money::zero();
    let mut buckets: BTreeMap<NaiveDate, (i64, Money)> = BTreeMap::new();

    for record in records.iter().filter(|r| {
        r.status != OrderStatus::Cancelled && r.created_at >= start && r.created_at <= now
    }) {
        let amount = Money::from_cents(record.total_cents);
        total_sales += 1;
        revenue = revenue
            .checked_add(amount)
            .ok_or_else(|| CoreError::ReportOverflow("sales_revenue".to_string()))?;

        let bucket = buckets
            .entry(record.created_at.date_naive())
            .or_insert((0, Money::zero()));
        bucket.0 += 1;
        bucket.1 = bucket
            .1
            .checked_add(amount)
            .ok_or_else(|| CoreError::ReportOverflow("daily_sales".to_string()))?;
    }

    let skip = buckets.len().saturating_sub(max_buckets);
    let daily_sales = buckets
        .into_iter()
        .skip(skip)
        .map(|(date, (orders_count, total))| DailySales {
            date,
            orders_count,
            total_revenue_cents: total.cents(),
        })
        .collect();

    Ok(SalesReport {
        days,
        period_start: start,
        period_end: now,
        total_sales,
        sales_revenue_cents: revenue.cents(),
        average_order_value_cents: revenue.average_over(total_sales).cents(),
        daily_sales,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn record(status: OrderStatus, total_cents: i64, hours_ago: i64) -> SaleRecord {
        SaleRecord {
            status,
            total_cents,
            created_at: now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_window_excludes_old_and_cancelled() {
        let records = vec![
            record(OrderStatus::Pending, 21_600, 1),
            record(OrderStatus::Completed, 10_000, 24 * 3),
            record(OrderStatus::Cancelled, 50_000, 2),
            record(OrderStatus::Shipped, 99_999, 24 * 8),
        ];

        let report = summarize_sales(&records, now(), 7, 30).unwrap();
        assert_eq!(report.total_sales, 2);
        assert_eq!(report.sales_revenue_cents, 31_600);
        assert_eq!(report.average_order_value_cents, 15_800);
    }

    #[test]
    fn test_buckets_sum_to_revenue_and_are_sorted() {
        let records = vec![
            record(OrderStatus::Pending, 100, 0),
            record(OrderStatus::Pending, 200, 30),
            record(OrderStatus::Pending, 300, 1),
            record(OrderStatus::Pending, 400, 24 * 5),
        ];

        let report = summarize_sales(&records, now(), 7, 30).unwrap();
        let bucket_sum: i64 = report.daily_sales.iter().map(|d| d.total_revenue_cents).sum();
        assert_eq!(bucket_sum, report.sales_revenue_cents);

        let dates: Vec<_> = report.daily_sales.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);

        let today = report.daily_sales.last().unwrap();
        assert_eq!(today.date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(today.orders_count, 2);
        assert_eq!(today.total_revenue_cents, 400);
    }

    #[test]
    fn test_keeps_most_recent_buckets() {
        let records: Vec<_> = (0..40)
            .map(|d| record(OrderStatus::Completed, 100, 24 * d))
            .collect();

        let report = summarize_sales(&records, now(), 60, 30).unwrap();
        assert_eq!(report.total_sales, 40);
        assert_eq!(report.daily_sales.len(), 30);
        assert_eq!(
            report.daily_sales.last().unwrap().date,
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
        );
    }

    #[test]
    fn test_empty_window() {
        let report = summarize_sales(&[], now(), 30, 30).unwrap();
        assert_eq!(report.total_sales, 0);
        assert_eq!(report.average_order_value_cents, 0);
        assert!(report.daily_sales.is_empty());
    }

    #[test]
    fn test_invalid_window() {
        assert!(summarize_sales(&[], now(), 0, 30).is_err());
    }

    #[test]
    fn test_revenue_overflow_is_an_error() {
        let records = vec![
            record(OrderStatus::Pending, i64::MAX / 2 + 1, 1),
            record(OrderStatus::Pending, i64::MAX / 2 + 1, 2),
        ];

        let err = summarize_sales(&records, now(), 7, 30).unwrap_err();
        assert!(matches!(err, CoreError::ReportOverflow(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
