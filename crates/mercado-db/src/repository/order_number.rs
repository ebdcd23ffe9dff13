//! # Order Number Allocation
//!
//! Issues `YYMMDDNNNN` numbers from a per-day counter row.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create transaction (BEGIN)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO order_number_counters (day, last_seq)                     │
//! │  VALUES ('261016', <highest existing 261016xxxx> + 1)                  │
//! │  ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1                │
//! │  RETURNING last_seq                                                    │
//! │       │                                                                 │
//! │       │  first write of the transaction: takes the SQLite write lock,  │
//! │       │  so a concurrent create waits here until this one commits      │
//! │       ▼                                                                 │
//! │  '261016' + 0042 → 2610160042                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rolled-back create rolls back its counter increment too, so sequential
//! issuance has no gaps. `orders.order_number` is UNIQUE as a backstop; the
//! counter also re-seeds from the orders table, which covers rows written
//! before the counter existed.

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use mercado_core::order_number::{day_prefix, MAX_DAILY_SEQUENCE};
use mercado_core::{CoreError, OrderNumber};

/// Allocates the next order number of `day` on an open transaction.
///
/// ## Errors
/// `OrderSequenceExhausted` once the day has issued 9999 numbers. The caller
/// rolls back, which also undoes the counter increment.
pub(crate) async fn allocate(conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<OrderNumber> {
    let prefix = day_prefix(day);

    let sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO order_number_counters (day, last_seq)
        VALUES (
            ?1,
            (SELECT COALESCE(MAX(CAST(substr(order_number, 7) AS INTEGER)), 0)
             FROM orders
             WHERE substr(order_number, 1, 6) = ?1) + 1
        )
        ON CONFLICT(day) DO UPDATE
            SET last_seq = MAX(order_number_counters.last_seq + 1, excluded.last_seq)
        RETURNING last_seq
        "#,
    )
    .bind(&prefix)
    .fetch_one(&mut *conn)
    .await?;

    if sequence > i64::from(MAX_DAILY_SEQUENCE) {
        return Err(CoreError::OrderSequenceExhausted { day: prefix }.into());
    }

    let number = OrderNumber::new(day, sequence as u32)?;
    debug!(order_number = %number, "Allocated order number");
    Ok(number)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_and_daily_reset() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let a = allocate(&mut conn, day(2026, 10, 16)).await.unwrap();
        let b = allocate(&mut conn, day(2026, 10, 16)).await.unwrap();
        let next_day = allocate(&mut conn, day(2026, 10, 17)).await.unwrap();

        assert_eq!(a.to_string(), "2610160001");
        assert_eq!(b.to_string(), "2610160002");
        assert_eq!(next_day.to_string(), "2610170001");
    }

    #[tokio::test]
    async fn test_rollback_releases_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let first = allocate(&mut tx, day(2026, 10, 16)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let again = allocate(&mut tx, day(2026, 10, 16)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_exhausted_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO order_number_counters (day, last_seq) VALUES ('261016', 9999)")
            .execute(db.pool())
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = allocate(&mut conn, day(2026, 10, 16)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OrderSequenceExhausted { ref day }) if day == "261016"
        ));
    }
}
