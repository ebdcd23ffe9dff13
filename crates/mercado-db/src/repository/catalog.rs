//! # Catalog Repository
//!
//! Categories and brands. Taxonomy is managed by the catalog side of the back
//! office; the order engine only reads it for inventory reports.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use mercado_core::validation::validate_name;
use mercado_core::{Brand, Category};

/// Repository for categories and brands.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a category.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - A category with this name exists
    pub async fn create_category(&self, name: &str) -> DbResult<Category> {
        validate_name("category name", name)?;
        let category = Category {
            id: generate_id(),
            name: name.trim().to_string(),
        };

        debug!(name = %category.name, "Inserting category");

        sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &category.name),
                other => other,
            })?;

        Ok(category)
    }

    /// Inserts a brand.
    pub async fn create_brand(&self, name: &str) -> DbResult<Brand> {
        validate_name("brand name", name)?;
        let brand = Brand {
            id: generate_id(),
            name: name.trim().to_string(),
        };

        debug!(name = %brand.name, "Inserting brand");

        sqlx::query("INSERT INTO brands (id, name) VALUES (?1, ?2)")
            .bind(&brand.id)
            .bind(&brand.name)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &brand.name),
                other => other,
            })?;

        Ok(brand)
    }

    pub async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    /// Lists categories by name.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(categories)
    }

    /// Lists brands by name.
    pub async fn list_brands(&self) -> DbResult<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>("SELECT id, name FROM brands ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(brands)
    }

    /// Counts categories.
    pub async fn count_categories(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
