//! # Error Types
//!
//! Domain-specific error types for mercado-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mercado-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mercado-db errors (separate crate)                                    │
//! │  └── DbError          - Store failures, wraps CoreError                │
//! │                                                                         │
//! │  Both classify into ErrorKind, which is what callers branch on:        │
//! │  Validation │ NotFound │ Conflict │ Internal                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, available stock, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every variant maps to exactly one `ErrorKind`

use serde::Serialize;
use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing classification of any failure in the engine.
///
/// `Validation`, `NotFound` and `Conflict` are recoverable by the caller;
/// `Internal` means the store itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Customer referenced by an order does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Product referenced by an order line does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Not enough stock to fulfil an order line.
    ///
    /// ## User Workflow
    /// ```text
    /// Create order (P1 × 6)
    ///      │
    ///      ▼
    /// Check stock: available=5
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "P1", available: 5, requested: 6 }
    ///      │
    ///      ▼
    /// Whole order rejected, nothing written
    /// ```
    #[error("Insufficient stock for {sku} ({product_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Order is in a terminal status and cannot be cancelled.
    #[error("Order {order_id} is {status} and cannot be cancelled")]
    OrderNotCancellable { order_id: String, status: OrderStatus },

    /// Requested status change is not in the transition table.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Cancellation must go through the cancel operation so stock is restored.
    #[error("Order {0} must be cancelled through the cancel operation")]
    CancelRequiresCancelOperation(String),

    /// The order changed between read and write.
    #[error("Order {order_id} was modified concurrently, expected status {expected}")]
    ConcurrentModification {
        order_id: String,
        expected: OrderStatus,
    },

    /// The daily order number sequence ran past its 4-digit range.
    #[error("Order number sequence exhausted for day {day}")]
    OrderSequenceExhausted { day: String },

    /// Could not obtain a unique order number after retrying.
    #[error("Could not allocate a unique order number after {attempts} attempts")]
    OrderNumberConflict { attempts: u32 },

    /// A report total ran past the supported money range.
    #[error("Report total {0} overflows the supported range")]
    ReportOverflow(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies this error for the calling layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CustomerNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::OrderNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. }
            | CoreError::OrderNotCancellable { .. }
            | CoreError::InvalidStatusTransition { .. }
            | CoreError::CancelRequiresCancelOperation(_)
            | CoreError::ConcurrentModification { .. }
            | CoreError::OrderSequenceExhausted { .. }
            | CoreError::OrderNumberConflict { .. } => ErrorKind::Conflict,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::ReportOverflow(_) => ErrorKind::Internal,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Checked before any store access.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Arithmetic on the given values would overflow.
    #[error("{field} overflows the supported range")]
    Overflow { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
