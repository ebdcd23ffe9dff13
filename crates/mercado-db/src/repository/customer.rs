//! # Customer Repository
//!
//! Customers placing orders. Email is the business key.

use chrono::Utc;
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use mercado_core::validation::validate_page;
use mercado_core::{Customer, CustomerSummary, NewCustomer, Page};

pub(crate) const CUSTOMER_COLUMNS: &str = "id, email, name, phone, address, created_at, updated_at";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

/// Customer row joined with its order count.
#[derive(Debug, FromRow)]
struct CustomerWithCount {
    #[sqlx(flatten)]
    customer: Customer,
    order_count: i64,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Email already registered
    pub async fn create(&self, new_customer: &NewCustomer) -> DbResult<Customer> {
        new_customer.validate()?;

        let now = Utc::now();
        let customer = Customer {
            id: generate_id(),
            email: new_customer.email.trim().to_lowercase(),
            name: new_customer.name.trim().to_string(),
            phone: new_customer.phone.clone(),
            address: new_customer.address.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(email = %customer.email, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, email, name, phone, address, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &customer.email),
            other => other,
        })?;

        Ok(customer)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        fetch_customer(&self.pool, id).await
    }

    /// Lists customers with their order counts, newest first.
    pub async fn list(&self, page: u32, limit: u32) -> DbResult<Page<CustomerSummary>> {
        validate_page(page, limit)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, CustomerWithCount>(
            r#"
            SELECT
                c.id, c.email, c.name, c.phone, c.address, c.created_at, c.updated_at,
                (SELECT COUNT(*) FROM orders o WHERE o.customer_id = c.id) AS order_count
            FROM customers c
            ORDER BY c.created_at DESC, c.rowid DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(i64::from(limit))
        .bind(i64::from(page - 1) * i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let data = rows
            .into_iter()
            .map(|row| CustomerSummary {
                customer: row.customer,
                order_count: row.order_count,
            })
            .collect();

        Ok(Page::new(data, page, limit, total))
    }
}

/// Loads one customer on any executor.
pub(crate) async fn fetch_customer<'e, E>(executor: E, id: &str) -> DbResult<Option<Customer>>
where
    E: SqliteExecutor<'e>,
{
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(customer)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use mercado_core::ErrorKind;

    fn new_customer(email: &str) -> NewCustomer {
        NewCustomer {
            email: email.to_string(),
            name: "Cliente Uno".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db
            .customers()
            .create(&new_customer("Cliente1@External.com"))
            .await
            .unwrap();

        assert_eq!(created.email, "cliente1@external.com");
        let loaded = db.customers().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(db.customers().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().create(&new_customer("a@b.com")).await.unwrap();

        let err = db.customers().create(&new_customer("A@B.com")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = db.customers().create(&new_customer("not-an-email")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_list_with_zero_orders() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().create(&new_customer("a@b.com")).await.unwrap();
        db.customers().create(&new_customer("c@d.com")).await.unwrap();

        let page = db.customers().list(1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.data.iter().all(|c| c.order_count == 0));
    }
}
