//! # Product Repository
//!
//! Database operations for catalog products.
//!
//! ## Key Operations
//! - Insert and lookup (by id, by SKU)
//! - Filtered, paginated listing
//! - Atomic stock primitives for the order engine (crate-private)
//!
//! ## Stock Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who May Change products.stock                        │
//! │                                                                         │
//! │  ProductRepository::insert      opening stock only                     │
//! │  OrderRepository::create        take_stock()    (decrement)            │
//! │  OrderRepository::cancel        restore_stock() (increment)            │
//! │                                                                         │
//! │  ❌ WRONG: read stock, compute in Rust, write back                      │
//! │     SELECT stock ...; UPDATE products SET stock = 2 WHERE id = ?       │
//! │                                                                         │
//! │  ✅ CORRECT: conditional delta in one statement                         │
//! │     UPDATE products SET stock = stock - 3                              │
//! │     WHERE id = ? AND stock >= 3                                        │
//! │                                                                         │
//! │  Two concurrent orders for the last unit: one matches, the other       │
//! │  affects 0 rows and is rejected. Stock never goes below zero.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use mercado_core::validation::validate_page;
use mercado_core::{NewProduct, Page, Product, ProductFilter};

pub(crate) const PRODUCT_COLUMNS: &str = "id, sku, name, description, price_cents, stock, status, \
     category_id, brand_id, seller_id, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_sku("COKE-330").await?;
/// let page = repo.list(&ProductFilter::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, id).await
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
        ))
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product with its opening stock.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    /// * `Err(DbError::ForeignKeyViolation)` - Unknown category or brand
    pub async fn insert(&self, new_product: &NewProduct) -> DbResult<Product> {
        new_product.validate()?;

        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            sku: new_product.sku.trim().to_string(),
            name: new_product.name.trim().to_string(),
            description: new_product.description.clone(),
            price_cents: new_product.price_cents,
            stock: new_product.stock,
            status: new_product.status,
            category_id: new_product.category_id.clone(),
            brand_id: new_product.brand_id.clone(),
            seller_id: new_product.seller_id.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, stock = product.stock, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, price_cents, stock, status,
                category_id, brand_id, seller_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.status)
        .bind(&product.category_id)
        .bind(&product.brand_id)
        .bind(&product.seller_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &product.sku),
            other => other,
        })?;

        Ok(product)
    }

    /// Lists products matching `filter`, newest first.
    ///
    /// ## Filter Semantics
    /// Every set field narrows the result (AND). `stock.min`/`stock.max` are
    /// inclusive bounds.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Page<Product>> {
        validate_page(filter.page, filter.limit)?;

        debug!(?filter, "Listing products");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE 1 = 1");
        push_product_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"
        ));
        push_product_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.page - 1) * i64::from(filter.limit));

        let products = select
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(products, filter.page, filter.limit, total))
    }

    /// Counts all products, any status.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn push_product_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category_id) = &filter.category_id {
        builder.push(" AND category_id = ").push_bind(category_id.clone());
    }
    if let Some(brand_id) = &filter.brand_id {
        builder.push(" AND brand_id = ").push_bind(brand_id.clone());
    }
    if let Some(range) = filter.stock {
        if let Some(min) = range.min {
            builder.push(" AND stock >= ").push_bind(min);
        }
        if let Some(max) = range.max {
            builder.push(" AND stock <= ").push_bind(max);
        }
    }
}

// =============================================================================
// Stock Primitives (order engine only)
// =============================================================================

/// Loads one product on any executor (pool or open transaction).
pub(crate) async fn fetch_product<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: SqliteExecutor<'e>,
{
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(product)
}

/// Takes `quantity` units if at least that many are available.
///
/// ## Returns
/// * `Ok(true)` - Stock decremented
/// * `Ok(false)` - Not enough stock (or no such product); nothing changed
pub(crate) async fn take_stock<'e, E>(executor: E, product_id: &str, quantity: i64) -> DbResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND stock >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Puts `quantity` units back.
pub(crate) async fn restore_stock<'e, E>(executor: E, product_id: &str, quantity: i64) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use mercado_core::{ErrorKind, ProductStatus, StockRange};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db.catalog().create_category("Drinks").await.unwrap();
        let brand = db.catalog().create_brand("Acme").await.unwrap();
        (db, category.id, brand.id)
    }

    fn new_product(sku: &str, stock: i64, status: ProductStatus, category: &str, brand: &str) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            price_cents: 250,
            stock,
            status,
            category_id: category.to_string(),
            brand_id: brand.to_string(),
            seller_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let (db, category, brand) = setup().await;
        let repo = db.products();

        let inserted = repo
            .insert(&new_product("COKE-330", 5, ProductStatus::Active, &category, &brand))
            .await
            .unwrap();

        let by_id = repo.get_by_id(&inserted.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "COKE-330");
        assert_eq!(by_id.stock, 5);
        assert_eq!(by_id.status, ProductStatus::Active);

        let by_sku = repo.get_by_sku("COKE-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, inserted.id);

        assert!(repo.get_by_sku("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_conflict() {
        let (db, category, brand) = setup().await;
        let repo = db.products();
        let product = new_product("COKE-330", 5, ProductStatus::Active, &category, &brand);

        repo.insert(&product).await.unwrap();
        let err = repo.insert(&product).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "COKE-330"));
    }

    #[tokio::test]
    async fn test_negative_opening_stock_rejected() {
        let (db, category, brand) = setup().await;
        let err = db
            .products()
            .insert(&new_product("BAD", -1, ProductStatus::Active, &category, &brand))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (db, category, brand) = setup().await;
        let repo = db.products();
        for (sku, stock, status) in [
            ("A-1", 0, ProductStatus::Active),
            ("A-2", 4, ProductStatus::Active),
            ("A-3", 50, ProductStatus::Active),
            ("I-1", 3, ProductStatus::Inactive),
        ] {
            repo.insert(&new_product(sku, stock, status, &category, &brand))
                .await
                .unwrap();
        }

        let active_low = repo
            .list(&ProductFilter {
                status: Some(ProductStatus::Active),
                stock: Some(StockRange {
                    min: Some(1),
                    max: Some(10),
                }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active_low.total, 1);
        assert_eq!(active_low.data[0].sku, "A-2");

        let paged = repo
            .list(&ProductFilter {
                page: 2,
                limit: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.total, 4);
        assert_eq!(paged.pages, 2);
        assert_eq!(paged.data.len(), 1);

        let err = repo
            .list(&ProductFilter {
                page: 0,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_take_stock_is_conditional() {
        let (db, category, brand) = setup().await;
        let product = db
            .products()
            .insert(&new_product("COKE-330", 5, ProductStatus::Active, &category, &brand))
            .await
            .unwrap();

        assert!(!take_stock(db.pool(), &product.id, 6).await.unwrap());
        assert_eq!(fetch_product(db.pool(), &product.id).await.unwrap().unwrap().stock, 5);

        assert!(take_stock(db.pool(), &product.id, 5).await.unwrap());
        assert_eq!(fetch_product(db.pool(), &product.id).await.unwrap().unwrap().stock, 0);

        restore_stock(db.pool(), &product.id, 2).await.unwrap();
        assert_eq!(fetch_product(db.pool(), &product.id).await.unwrap().unwrap().stock, 2);

        let err = restore_stock(db.pool(), "missing", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
