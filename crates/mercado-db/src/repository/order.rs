//! # Order Repository
//!
//! The order engine: create, cancel and update orders so that order rows,
//! order items, product stock and order numbers never disagree.
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(NewOrder)                                                       │
//! │       │                                                                 │
//! │       ├── NewOrder::price()            Validation (nothing read yet)   │
//! │       ├── customer exists?             NotFound                        │
//! │       ├── every product exists?        NotFound                        │
//! │       ├── Σ quantity ≤ stock?          Conflict (early, no write)      │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │       ├── allocate order number        (takes the write lock)          │
//! │       ├── INSERT orders                                                │
//! │       ├── INSERT order_items × n                                       │
//! │       ├── UPDATE products SET stock = stock - q WHERE stock >= q       │
//! │       │      └── 0 rows → InsufficientStock, ROLLBACK everything       │
//! │       ├── INSERT order_history (CREATED)                               │
//! │  COMMIT                                                                │
//! │       │                                                                 │
//! │       └── UNIQUE(order_number) hit → retry whole transaction           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancel
//! The status write is the first statement of its transaction and is
//! conditional on a non-terminal status, so of two concurrent cancels only one
//! restores stock.
//!
//! ## Update
//! Planned in `mercado_core` against the stored order, then written with a
//! compare-and-swap on the status that was read.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::customer::fetch_customer;
use crate::repository::generate_id;
use crate::repository::order_number;
use crate::repository::product::{fetch_product, restore_stock, take_stock};
use mercado_core::validation::{validate_id, validate_page};
use mercado_core::{
    CoreError, NewOrder, Order, OrderDetail, OrderFilter, OrderHistoryAction, OrderHistoryEntry,
    OrderItem, OrderLine, OrderStats, OrderStatus, OrderUpdate, Page, PricedOrder, Product,
    RecentOrder,
};

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, customer_id, buyer_id, seller_id, \
     status, payment_status, payment_method, subtotal_cents, tax_cents, shipping_cents, \
     total_cents, shipping_address, tracking_number, notes, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price_cents, line_total_cents, created_at";

/// Repository for orders, their items and their audit trail.
///
/// ## Usage
/// ```rust,ignore
/// let orders = db.orders();
///
/// let created = orders.create(&NewOrder::new(customer_id, items).tax(16)).await?;
/// orders.update(&created.order.id, &OrderUpdate::status(OrderStatus::InPreparation)).await?;
/// orders.cancel(&created.order.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    order_number_attempts: u32,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    ///
    /// `order_number_attempts` bounds the retries on an order number collision.
    pub fn new(pool: SqlitePool, order_number_attempts: u32) -> Self {
        OrderRepository {
            pool,
            order_number_attempts: order_number_attempts.max(1),
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates an order placed now.
    ///
    /// ## Returns
    /// * `Ok(OrderDetail)` - The order with customer, items and products
    /// * `Err(kind = Validation)` - Malformed intent
    /// * `Err(kind = NotFound)` - Unknown customer or product
    /// * `Err(kind = Conflict)` - Insufficient stock, order numbers exhausted
    pub async fn create(&self, new_order: &NewOrder) -> DbResult<OrderDetail> {
        self.create_at(new_order, Utc::now()).await
    }

    /// Creates an order placed at `placed_at`.
    ///
    /// The order number is taken from the UTC calendar day of `placed_at`.
    /// Used directly by the seeder to backdate history.
    pub async fn create_at(
        &self,
        new_order: &NewOrder,
        placed_at: DateTime<Utc>,
    ) -> DbResult<OrderDetail> {
        let priced = new_order.price()?;

        debug!(
            customer_id = %new_order.customer_id,
            lines = new_order.items.len(),
            total_cents = priced.total.cents(),
            "Creating order"
        );

        if fetch_customer(&self.pool, &new_order.customer_id)
            .await?
            .is_none()
        {
            return Err(CoreError::CustomerNotFound(new_order.customer_id.clone()).into());
        }

        let mut products: HashMap<String, Product> = HashMap::new();
        for (product_id, requested) in new_order.requested_quantities() {
            let product = fetch_product(&self.pool, product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
            if !product.has_stock_for(requested) {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    available: product.stock,
                    requested,
                }
                .into());
            }
            products.insert(product.id.clone(), product);
        }

        // The counter re-seeds past every stored number, so a collision needs a
        // writer outside this repository. The retry is a backstop for that.
        let mut attempt = 1;
        let order_id = loop {
            match self.insert_order(new_order, &priced, &products, placed_at).await {
                Ok(order_id) => break order_id,
                Err(err) if err.is_order_number_collision() => {
                    if attempt >= self.order_number_attempts {
                        return Err(CoreError::OrderNumberConflict { attempts: attempt }.into());
                    }
                    warn!(attempt, "Order number collision, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        self.get_detail(&order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", &order_id))
    }

    /// One attempt at writing the order. Everything rolls back on any error.
    async fn insert_order(
        &self,
        new_order: &NewOrder,
        priced: &PricedOrder,
        products: &HashMap<String, Product>,
        placed_at: DateTime<Utc>,
    ) -> DbResult<String> {
        let mut tx = self.pool.begin().await?;

        let number = order_number::allocate(&mut tx, placed_at.date_naive()).await?;
        let order_id = generate_id();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, buyer_id, seller_id,
                status, payment_status, payment_method,
                subtotal_cents, tax_cents, shipping_cents, total_cents,
                shipping_address, tracking_number, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, ?14, ?15, ?15)
            "#,
        )
        .bind(&order_id)
        .bind(number.to_string())
        .bind(&new_order.customer_id)
        .bind(&new_order.buyer_id)
        .bind(&new_order.seller_id)
        .bind(OrderStatus::Pending)
        .bind(mercado_core::PaymentStatus::Pending)
        .bind(new_order.payment_method)
        .bind(priced.subtotal.cents())
        .bind(priced.tax.cents())
        .bind(priced.shipping.cents())
        .bind(priced.total.cents())
        .bind(&new_order.shipping_address)
        .bind(&new_order.notes)
        .bind(placed_at)
        .execute(&mut *tx)
        .await?;

        for item in &priced.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, quantity, unit_price_cents, line_total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(generate_id())
            .bind(&order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price.cents())
            .bind(item.line_total.cents())
            .bind(placed_at)
            .execute(&mut *tx)
            .await?;
        }

        for (product_id, requested) in new_order.requested_quantities() {
            if !take_stock(&mut *tx, product_id, requested).await? {
                // Lost a race since the pre-check; report what is left now.
                let current = fetch_product(&mut *tx, product_id)
                    .await?
                    .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
                let sku = products
                    .get(product_id)
                    .map_or_else(|| current.sku.clone(), |p| p.sku.clone());
                debug!(product_id, available = current.stock, requested, "Stock taken concurrently");
                return Err(CoreError::InsufficientStock {
                    product_id: product_id.to_string(),
                    sku,
                    available: current.stock,
                    requested,
                }
                .into());
            }
        }

        insert_history(
            &mut tx,
            &order_id,
            OrderHistoryAction::Created,
            None,
            Some(number.to_string()),
            new_order.notes.as_deref(),
            placed_at,
        )
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            order_number = %number,
            total_cents = priced.total.cents(),
            "Order created"
        );
        Ok(order_id)
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels an order and puts every ordered unit back in stock.
    ///
    /// Payment status is left as it is.
    ///
    /// ## Returns
    /// * `Err(kind = NotFound)` - Unknown order
    /// * `Err(kind = Conflict)` - Order is COMPLETED or already CANCELLED
    pub async fn cancel(&self, order_id: &str) -> DbResult<Order> {
        debug!(order_id, "Cancelling order");

        let order = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        if !order.status.can_cancel() {
            return Err(CoreError::OrderNotCancellable {
                order_id: order.id,
                status: order.status,
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'CANCELLED', updated_at = ?2
            WHERE id = ?1 AND status NOT IN ('COMPLETED', 'CANCELLED')
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let status = fetch_order(&mut *tx, order_id)
                .await?
                .map_or(OrderStatus::Cancelled, |o| o.status);
            return Err(CoreError::OrderNotCancellable {
                order_id: order_id.to_string(),
                status,
            }
            .into());
        }

        let items = fetch_items(&mut *tx, order_id).await?;
        for item in &items {
            restore_stock(&mut *tx, &item.product_id, item.quantity).await?;
        }

        insert_history(
            &mut tx,
            order_id,
            OrderHistoryAction::Cancelled,
            Some(order.status.to_string()),
            Some(OrderStatus::Cancelled.to_string()),
            None,
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            order_id,
            order_number = %order.order_number,
            restored_lines = items.len(),
            "Order cancelled"
        );

        fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Applies a partial update.
    ///
    /// ## Rules
    /// - status moves must follow the transition table
    /// - CANCELLED is only reachable through [`cancel`](Self::cancel)
    /// - payment status and text fields may change on any order
    /// - an update that changes nothing writes nothing
    ///
    /// ## Returns
    /// * `Err(kind = Conflict)` - Illegal transition, or the order changed
    ///   status between read and write
    pub async fn update(&self, order_id: &str, update: &OrderUpdate) -> DbResult<Order> {
        debug!(order_id, ?update, "Updating order");

        let current = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let plan = update.plan(&current)?;
        if plan.is_noop() {
            return Ok(current);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?3,
                payment_status = COALESCE(?4, payment_status),
                payment_method = COALESCE(?5, payment_method),
                shipping_address = COALESCE(?6, shipping_address),
                tracking_number = COALESCE(?7, tracking_number),
                notes = COALESCE(?8, notes),
                updated_at = ?9
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(order_id)
        .bind(plan.expected_status)
        .bind(plan.next_status)
        .bind(update.payment_status)
        .bind(update.payment_method)
        .bind(&update.shipping_address)
        .bind(&update.tracking_number)
        .bind(&update.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ConcurrentModification {
                order_id: order_id.to_string(),
                expected: plan.expected_status,
            }
            .into());
        }

        for change in &plan.changes {
            insert_history(
                &mut tx,
                order_id,
                change.action,
                change.previous_value.clone(),
                change.new_value.clone(),
                update.notes.as_deref(),
                now,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            order_id,
            from = %plan.expected_status,
            to = %plan.next_status,
            changes = plan.changes.len(),
            "Order updated"
        );

        fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an order row by ID.
    pub async fn get(&self, order_id: &str) -> DbResult<Option<Order>> {
        fetch_order(&self.pool, order_id).await
    }

    /// Gets an order by its order number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets an order with its customer and items.
    ///
    /// A line whose product has since disappeared keeps `product: None`.
    pub async fn get_detail(&self, order_id: &str) -> DbResult<Option<OrderDetail>> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, order_id).await
    }

    /// Lists orders, newest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Page<Order>> {
        validate_page(filter.page, filter.limit)?;
        if let Some(customer_id) = &filter.customer_id {
            validate_id("customer_id", customer_id)?;
        }

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders WHERE 1 = 1");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1 = 1"));
        push_order_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.page - 1) * i64::from(filter.limit));

        let orders = select.build_query_as::<Order>().fetch_all(&self.pool).await?;

        Ok(Page::new(orders, filter.page, filter.limit, total))
    }

    /// Most recent orders with customer and line count.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<RecentOrder>> {
        let mut conn = self.pool.acquire().await?;
        fetch_recent_orders(&mut conn, limit).await
    }

    /// Order counters. Revenue excludes cancelled orders.
    pub async fn stats(&self) -> DbResult<OrderStats> {
        fetch_order_stats(&self.pool).await
    }

    /// Audit trail of an order, oldest first.
    pub async fn history(&self, order_id: &str) -> DbResult<Vec<OrderHistoryEntry>> {
        let entries = sqlx::query_as::<_, OrderHistoryEntry>(
            r#"
            SELECT id, order_id, action, previous_value, new_value, notes, created_at
            FROM order_history
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

fn push_order_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(customer_id) = &filter.customer_id {
        builder.push(" AND customer_id = ").push_bind(customer_id.clone());
    }
}

// =============================================================================
// Shared Reads (pool or open transaction)
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderWithItemCount {
    #[sqlx(flatten)]
    order: Order,
    item_count: i64,
}

pub(crate) async fn fetch_order<'e, E>(executor: E, order_id: &str) -> DbResult<Option<Order>>
where
    E: SqliteExecutor<'e>,
{
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
    ))
    .bind(order_id)
    .fetch_optional(executor)
    .await?;

    Ok(order)
}

pub(crate) async fn fetch_items<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<OrderItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY rowid"
    ))
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

/// Order + customer + items with products.
pub(crate) async fn load_detail(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Option<OrderDetail>> {
    let Some(order) = fetch_order(&mut *conn, order_id).await? else {
        return Ok(None);
    };
    let customer = fetch_customer(&mut *conn, &order.customer_id).await?;

    let items = fetch_items(&mut *conn, order_id).await?;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = fetch_product(&mut *conn, &item.product_id).await?;
        lines.push(OrderLine { item, product });
    }

    Ok(Some(OrderDetail {
        order,
        customer,
        items: lines,
    }))
}

pub(crate) async fn fetch_recent_orders(
    conn: &mut SqliteConnection,
    limit: u32,
) -> DbResult<Vec<RecentOrder>> {
    let rows = sqlx::query_as::<_, OrderWithItemCount>(&format!(
        r#"
        SELECT {ORDER_COLUMNS},
            (SELECT COUNT(*) FROM order_items i WHERE i.order_id = orders.id) AS item_count
        FROM orders
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?1
        "#
    ))
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await?;

    let mut recent = Vec::with_capacity(rows.len());
    for row in rows {
        let customer = fetch_customer(&mut *conn, &row.order.customer_id).await?;
        recent.push(RecentOrder {
            order: row.order,
            customer,
            item_count: row.item_count,
        });
    }
    Ok(recent)
}

pub(crate) async fn fetch_order_stats<'e, E>(executor: E) -> DbResult<OrderStats>
where
    E: SqliteExecutor<'e>,
{
    let (total_orders, pending_orders, total_revenue_cents): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(status = 'PENDING'), 0),
            COALESCE(SUM(CASE WHEN status != 'CANCELLED' THEN total_cents ELSE 0 END), 0)
        FROM orders
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(OrderStats {
        total_orders,
        pending_orders,
        total_revenue_cents,
    })
}

async fn insert_history(
    conn: &mut SqliteConnection,
    order_id: &str,
    action: OrderHistoryAction,
    previous_value: Option<String>,
    new_value: Option<String>,
    notes: Option<&str>,
    at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_history (id, order_id, action, previous_value, new_value, notes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(generate_id())
    .bind(order_id)
    .bind(action)
    .bind(previous_value)
    .bind(new_value)
    .bind(notes)
    .bind(at)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::fixtures::Fixture;
    use chrono::{Duration, TimeZone};
    use mercado_core::{ErrorKind, NewOrderItem, PaymentMethod, PaymentStatus};
    use std::collections::HashSet;

    fn one_line(fx: &Fixture, product: &Product, quantity: i64) -> NewOrder {
        NewOrder::new(
            fx.customer.id.clone(),
            vec![NewOrderItem::new(product.id.clone(), quantity, product.price_cents)],
        )
    }

    fn suffix(number: &str) -> u32 {
        number[6..].parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_pricing_scenario() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;

        let detail = fx
            .db
            .orders()
            .create(&one_line(&fx, &p1, 2).tax(16).payment_method(PaymentMethod::Card))
            .await
            .unwrap();

        assert_eq!(detail.order.subtotal_cents, 200);
        assert_eq!(detail.order.total_cents, 216);
        assert_eq!(detail.order.status, OrderStatus::Pending);
        assert_eq!(detail.order.payment_status, PaymentStatus::Pending);
        assert_eq!(detail.order.payment_method, Some(PaymentMethod::Card));
        assert_eq!(detail.customer.as_ref().unwrap().id, fx.customer.id);
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].item.line_total_cents, 200);
        assert_eq!(detail.items[0].product.as_ref().unwrap().sku, "P1");

        let items_sum: i64 = detail.items.iter().map(|l| l.item.line_total_cents).sum();
        assert_eq!(detail.order.subtotal_cents, items_sum);
        assert_eq!(
            detail.order.total_cents,
            detail.order.subtotal_cents + detail.order.tax_cents + detail.order.shipping_cents
        );

        assert_eq!(fx.stock_of(&p1.id).await, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_stock_unchanged() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;

        let err = fx.db.orders().create(&one_line(&fx, &p1, 6)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 5, requested: 6, ref sku, .. })
                if sku == "P1"
        ));
        assert_eq!(fx.stock_of(&p1.id).await, 5);
        assert_eq!(fx.db.orders().stats().await.unwrap().total_orders, 0);
    }

    #[tokio::test]
    async fn test_one_short_line_aborts_whole_order() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;
        let p2 = fx.product("P2", 300, 1).await;

        let order = NewOrder::new(
            fx.customer.id.clone(),
            vec![
                NewOrderItem::new(p1.id.clone(), 2, 100),
                NewOrderItem::new(p2.id.clone(), 2, 300),
            ],
        );
        let err = fx.db.orders().create(&order).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fx.stock_of(&p1.id).await, 5);
        assert_eq!(fx.stock_of(&p2.id).await, 1);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_are_summed() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;

        let order = NewOrder::new(
            fx.customer.id.clone(),
            vec![
                NewOrderItem::new(p1.id.clone(), 3, 100),
                NewOrderItem::new(p1.id.clone(), 3, 100),
            ],
        );
        let err = fx.db.orders().create(&order).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { requested: 6, .. })
        ));
        assert_eq!(fx.stock_of(&p1.id).await, 5);
    }

    #[tokio::test]
    async fn test_unknown_customer_and_product() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;

        let unknown_customer = NewOrder::new(
            "6f1c2a4e-1111-4c3b-9a55-00000000dead",
            vec![NewOrderItem::new(p1.id.clone(), 1, 100)],
        );
        let err = fx.db.orders().create(&unknown_customer).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CustomerNotFound(_))));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let unknown_product = NewOrder::new(
            fx.customer.id.clone(),
            vec![NewOrderItem::new("6f1c2a4e-2222-4c3b-9a55-00000000dead", 1, 100)],
        );
        let err = fx.db.orders().create(&unknown_product).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        let invalid = one_line(&fx, &p1, 0);
        let err = fx.db.orders().create(&invalid).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_create_then_cancel_restores_stock() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;
        let orders = fx.db.orders();

        let created = orders.create(&one_line(&fx, &p1, 3)).await.unwrap();
        assert_eq!(fx.stock_of(&p1.id).await, 2);

        let cancelled = orders.cancel(&created.order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
        assert_eq!(fx.stock_of(&p1.id).await, 5);
    }

    #[tokio::test]
    async fn test_cancel_terminal_order_fails_without_touching_stock() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;
        let orders = fx.db.orders();

        let created = orders.create(&one_line(&fx, &p1, 3)).await.unwrap();
        orders.cancel(&created.order.id).await.unwrap();

        let err = orders.cancel(&created.order.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OrderNotCancellable {
                status: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(fx.stock_of(&p1.id).await, 5);

        let completed = orders.create(&one_line(&fx, &p1, 1)).await.unwrap();
        for status in [
            OrderStatus::InPreparation,
            OrderStatus::Shipped,
            OrderStatus::Completed,
        ] {
            orders
                .update(&completed.order.id, &OrderUpdate::status(status))
                .await
                .unwrap();
        }
        let err = orders.cancel(&completed.order.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fx.stock_of(&p1.id).await, 4);

        let err = orders.cancel("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_same_day_numbers_are_consecutive() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 50).await;
        let orders = fx.db.orders();

        let mut numbers = Vec::new();
        for _ in 0..5 {
            numbers.push(orders.create(&one_line(&fx, &p1, 1)).await.unwrap().order.order_number);
        }

        for pair in numbers.windows(2) {
            assert_eq!(pair[0][..6], pair[1][..6]);
            assert_eq!(suffix(&pair[1]), suffix(&pair[0]) + 1);
        }
    }

    #[tokio::test]
    async fn test_numbering_resets_on_new_day_and_skips_failed_creates() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 3).await;
        let orders = fx.db.orders();
        let day1 = Utc.with_ymd_and_hms(2026, 10, 15, 23, 59, 0).unwrap();

        let a = orders.create_at(&one_line(&fx, &p1, 1), day1).await.unwrap();
        assert!(orders.create_at(&one_line(&fx, &p1, 9), day1).await.is_err());
        let b = orders.create_at(&one_line(&fx, &p1, 1), day1).await.unwrap();
        let c = orders
            .create_at(&one_line(&fx, &p1, 1), day1 + Duration::minutes(2))
            .await
            .unwrap();

        assert_eq!(a.order.order_number, "2610150001");
        assert_eq!(b.order.order_number, "2610150002");
        assert_eq!(c.order.order_number, "2610160001");
        assert_eq!(a.order.created_at, day1);
    }

    #[tokio::test]
    async fn test_counter_reseeds_from_existing_orders() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 10).await;
        let orders = fx.db.orders();
        let day = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();

        orders.create_at(&one_line(&fx, &p1, 1), day).await.unwrap();
        sqlx::query("DELETE FROM order_number_counters")
            .execute(fx.db.pool())
            .await
            .unwrap();

        let next = orders.create_at(&one_line(&fx, &p1, 1), day).await.unwrap();
        assert_eq!(next.order.order_number, "2610160002");
    }

    #[tokio::test]
    async fn test_order_number_collisions_retry_then_give_up() {
        let db = Database::new(DbConfig::in_memory().order_number_attempts(3))
            .await
            .unwrap();
        let fx = Fixture::on(db).await;
        let p1 = fx.product("P1", 100, 5).await;

        // Every order insert reports the number as taken.
        sqlx::query(
            r#"
            CREATE TRIGGER orders_number_taken BEFORE INSERT ON orders
            BEGIN
                SELECT RAISE(ABORT, 'UNIQUE constraint failed: orders.order_number');
            END
            "#,
        )
        .execute(fx.db.pool())
        .await
        .unwrap();

        let err = fx.db.orders().create(&one_line(&fx, &p1, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OrderNumberConflict { attempts: 3 })
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fx.stock_of(&p1.id).await, 5);
        assert_eq!(fx.db.orders().stats().await.unwrap().total_orders, 0);

        sqlx::query("DROP TRIGGER orders_number_taken")
            .execute(fx.db.pool())
            .await
            .unwrap();

        let detail = fx.db.orders().create(&one_line(&fx, &p1, 2)).await.unwrap();
        assert_eq!(suffix(&detail.order.order_number), 1);
        assert_eq!(fx.stock_of(&p1.id).await, 3);
    }

    #[tokio::test]
    async fn test_update_follows_transition_table() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;
        let orders = fx.db.orders();
        let id = orders.create(&one_line(&fx, &p1, 1)).await.unwrap().order.id;

        let err = orders
            .update(&id, &OrderUpdate::status(OrderStatus::Shipped))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = orders
            .update(&id, &OrderUpdate::status(OrderStatus::Cancelled))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CancelRequiresCancelOperation(_))
        ));
        assert_eq!(fx.stock_of(&p1.id).await, 4);

        let updated = orders
            .update(
                &id,
                &OrderUpdate {
                    status: Some(OrderStatus::InPreparation),
                    payment_status: Some(PaymentStatus::Paid),
                    tracking_number: Some("TRK-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::InPreparation);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(updated.tracking_number.as_deref(), Some("TRK-1"));
        assert_eq!(updated.notes, None);

        let err = orders
            .update("missing", &OrderUpdate::status(OrderStatus::Shipped))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_history_records_each_change() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 5).await;
        let orders = fx.db.orders();
        let id = orders.create(&one_line(&fx, &p1, 1)).await.unwrap().order.id;

        let mut prepare = OrderUpdate::status(OrderStatus::InPreparation);
        prepare.notes = Some("Picked by warehouse 2".to_string());
        orders.update(&id, &prepare).await.unwrap();
        orders
            .update(&id, &OrderUpdate::status(OrderStatus::InPreparation))
            .await
            .unwrap();
        orders.cancel(&id).await.unwrap();

        let history = orders.history(&id).await.unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                OrderHistoryAction::Created,
                OrderHistoryAction::StatusChanged,
                OrderHistoryAction::Updated,
                OrderHistoryAction::Cancelled,
            ]
        );

        let notes: Vec<_> = history.iter().map(|e| e.notes.as_deref()).collect();
        assert_eq!(
            notes,
            vec![
                None,
                Some("Picked by warehouse 2"),
                Some("Picked by warehouse 2"),
                None
            ]
        );
    }

    #[tokio::test]
    async fn test_queries() {
        let fx = Fixture::in_memory().await;
        let p1 = fx.product("P1", 100, 10).await;
        let orders = fx.db.orders();

        let first = orders.create(&one_line(&fx, &p1, 1)).await.unwrap();
        let second = orders.create(&one_line(&fx, &p1, 2)).await.unwrap();
        orders.cancel(&first.order.id).await.unwrap();

        let stats = orders.stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.total_revenue_cents, 200);

        let pending = orders
            .list(&OrderFilter {
                status: Some(OrderStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.data[0].id, second.order.id);

        let by_customer = orders
            .list(&OrderFilter {
                customer_id: Some(fx.customer.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_customer.total, 2);

        let recent = orders.recent(5).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].order.id, second.order.id);
        assert_eq!(recent[0].item_count, 1);

        let by_number = orders
            .get_by_number(&second.order.order_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_number.id, second.order.id);
        assert!(orders.get_detail("missing").await.unwrap().is_none());

        let customers = fx.db.customers().list(1, 10).await.unwrap();
        assert_eq!(customers.data[0].order_count, 2);
    }

    /// Many writers racing for the last units of one product.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_never_oversell() {
        let path = std::env::temp_dir().join(format!("mercado-{}.db", generate_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(8))
            .await
            .unwrap();
        let fx = Fixture::on(db.clone()).await;
        let p1 = fx.product("P1", 100, 5).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let orders = db.orders();
            let order = one_line(&fx, &p1, 1);
            handles.push(tokio::spawn(async move { orders.create(&order).await }));
        }

        let mut numbers = HashSet::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(detail) => assert!(numbers.insert(detail.order.order_number)),
                Err(err) => {
                    assert!(matches!(
                        err,
                        DbError::Domain(CoreError::InsufficientStock { .. })
                    ));
                    rejected += 1;
                }
            }
        }

        assert_eq!(numbers.len(), 5);
        assert_eq!(rejected, 7);
        assert_eq!(fx.stock_of(&p1.id).await, 0);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    /// Two cancels of the same order restore stock once.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_cancels_restore_once() {
        let path = std::env::temp_dir().join(format!("mercado-{}.db", generate_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let fx = Fixture::on(db.clone()).await;
        let p1 = fx.product("P1", 100, 5).await;
        let id = db.orders().create(&one_line(&fx, &p1, 3)).await.unwrap().order.id;

        let (first, second) = (db.orders(), db.orders());
        let (a, b) = tokio::join!(first.cancel(&id), second.cancel(&id));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(fx.stock_of(&p1.id).await, 5);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
