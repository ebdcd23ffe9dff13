//! # Order Status State Machine
//!
//! Every status write goes through [`OrderStatus::transition_to`] before it
//! reaches the store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PENDING ──► IN_PREPARATION ──► SHIPPED ──► COMPLETED (terminal)       │
//! │     │               │              │                                    │
//! │     └───────────────┴──────────────┴──────► CANCELLED (terminal)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::OrderStatus;

impl OrderStatus {
    /// Statuses reachable in one step from `self`.
    pub const fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::InPreparation, OrderStatus::Cancelled],
            OrderStatus::InPreparation => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    /// Terminal statuses accept no further transition.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Cancellation is one-way and only from a non-terminal status.
    #[inline]
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Validates moving order `order_id` from `self` to `next`.
    ///
    /// Staying in the same status is accepted and changes nothing.
    pub fn transition_to(&self, order_id: &str, next: OrderStatus) -> CoreResult<OrderStatus> {
        if *self == next {
            return Ok(next);
        }
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                order_id: order_id.to_string(),
                from: *self,
                to: next,
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::InPreparation,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn test_forward_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::InPreparation));
        assert!(OrderStatus::InPreparation.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::InPreparation));
        assert!(!OrderStatus::InPreparation.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_statuses_are_closed() {
        for from in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(from.is_terminal());
            assert!(!from.can_cancel());
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_every_open_status_can_cancel() {
        for status in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_cancel());
        }
    }

    #[test]
    fn test_transition_to_errors() {
        let err = OrderStatus::Completed
            .transition_to("o-1", OrderStatus::Shipped)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidStatusTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Shipped,
                ..
            }
        ));

        assert_eq!(
            OrderStatus::Shipped.transition_to("o-1", OrderStatus::Shipped).unwrap(),
            OrderStatus::Shipped
        );
    }
}
