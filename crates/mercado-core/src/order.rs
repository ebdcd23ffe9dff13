//! # Order Intents
//!
//! What a caller asks for, before anything touches the store:
//!
//! - [`NewOrder`] - an order to create, priced into a [`PricedOrder`]
//! - [`OrderUpdate`] - a partial update, planned against the current order
//!   into an [`UpdatePlan`]
//!
//! ## Pricing
//! ```text
//! item.line_total = item.unit_price × item.quantity
//! subtotal        = Σ item.line_total
//! total           = subtotal + tax + shipping
//! ```
//! All arithmetic is checked; an overflow is a validation error, not a panic.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    Order, OrderHistoryAction, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::validation::{
    validate_charge_cents, validate_id, validate_optional_text, validate_order_size,
    validate_price_cents, validate_quantity, ValidationResult,
};

/// Longest accepted shipping address.
pub const MAX_ADDRESS_LEN: usize = 500;
/// Longest accepted notes field.
pub const MAX_NOTES_LEN: usize = 1000;
/// Longest accepted tracking number.
pub const MAX_TRACKING_LEN: usize = 100;

// =============================================================================
// New Order
// =============================================================================

/// One requested line: product, quantity and the unit price agreed at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewOrderItem {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        NewOrderItem {
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
        }
    }
}

/// An order intent as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: String,
    pub items: Vec<NewOrderItem>,
    #[serde(default)]
    pub buyer_id: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub shipping_cents: i64,
}

impl NewOrder {
    /// Creates an order intent with no tax, no shipping and no optional fields.
    pub fn new(customer_id: impl Into<String>, items: Vec<NewOrderItem>) -> Self {
        NewOrder {
            customer_id: customer_id.into(),
            items,
            buyer_id: None,
            seller_id: None,
            payment_method: None,
            shipping_address: None,
            notes: None,
            tax_cents: 0,
            shipping_cents: 0,
        }
    }

    pub fn tax(mut self, cents: i64) -> Self {
        self.tax_cents = cents;
        self
    }

    pub fn shipping(mut self, cents: i64) -> Self {
        self.shipping_cents = cents;
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn shipping_address(mut self, address: impl Into<String>) -> Self {
        self.shipping_address = Some(address.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn seller(mut self, seller_id: impl Into<String>) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub fn buyer(mut self, buyer_id: impl Into<String>) -> Self {
        self.buyer_id = Some(buyer_id.into());
        self
    }

    /// Checks the shape of the intent. Does not look at customers or stock.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_id("customer_id", &self.customer_id)?;
        validate_order_size(self.items.len())?;
        for item in &self.items {
            validate_id("product_id", &item.product_id)?;
            validate_quantity(item.quantity)?;
            validate_price_cents(item.unit_price_cents)?;
        }
        validate_charge_cents("tax", self.tax_cents)?;
        validate_charge_cents("shipping", self.shipping_cents)?;
        validate_optional_text("shipping_address", self.shipping_address.as_deref(), MAX_ADDRESS_LEN)?;
        validate_optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;
        Ok(())
    }

    /// Total quantity requested per product, in order of first appearance.
    ///
    /// A product listed on several lines must have stock for the sum.
    pub fn requested_quantities(&self) -> Vec<(&str, i64)> {
        let mut totals: Vec<(&str, i64)> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match totals.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += item.quantity,
                None => totals.push((item.product_id.as_str(), item.quantity)),
            }
        }
        totals
    }

    /// Validates the intent and computes every line and header amount.
    pub fn price(&self) -> CoreResult<PricedOrder> {
        self.validate()?;

        let overflow = |field: &str| -> CoreError {
            ValidationError::Overflow {
                field: field.to_string(),
            }
            .into()
        };

        let mut items = Vec::with_capacity(self.items.len());
        let mut subtotal = Money::zero();
        for item in &self.items {
            let unit_price = Money::from_cents(item.unit_price_cents);
            let line_total = unit_price
                .checked_mul_quantity(item.quantity)
                .ok_or_else(|| overflow("line total"))?;
            subtotal = subtotal
                .checked_add(line_total)
                .ok_or_else(|| overflow("subtotal"))?;
            items.push(PricedItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price,
                line_total,
            });
        }

        let tax = Money::from_cents(self.tax_cents);
        let shipping = Money::from_cents(self.shipping_cents);
        let total = subtotal
            .checked_add(tax)
            .and_then(|t| t.checked_add(shipping))
            .ok_or_else(|| overflow("total"))?;

        Ok(PricedOrder {
            items,
            subtotal,
            tax,
            shipping,
            total,
        })
    }
}

/// A priced line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Amounts of an order ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub items: Vec<PricedItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

// =============================================================================
// Order Update
// =============================================================================

/// Partial update of an existing order. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderUpdate {
    pub fn status(status: OrderStatus) -> Self {
        OrderUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn payment_status(status: PaymentStatus) -> Self {
        OrderUpdate {
            payment_status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == OrderUpdate::default()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_optional_text("shipping_address", self.shipping_address.as_deref(), MAX_ADDRESS_LEN)?;
        validate_optional_text("tracking_number", self.tracking_number.as_deref(), MAX_TRACKING_LEN)?;
        validate_optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;
        Ok(())
    }

    /// Plans this update against the order as currently stored.
    ///
    /// ## Rules
    /// - status changes must follow the transition table
    /// - moving to CANCELLED is refused; cancel restores stock, update does not
    /// - payment status and the free-text fields are bookkeeping and may be
    ///   written on any order, terminal or not
    pub fn plan(&self, current: &Order) -> CoreResult<UpdatePlan> {
        self.validate()?;

        let mut changes = Vec::new();

        let next_status = match self.status {
            Some(OrderStatus::Cancelled) if current.status != OrderStatus::Cancelled => {
                return Err(CoreError::CancelRequiresCancelOperation(current.id.clone()));
            }
            Some(requested) => current.status.transition_to(&current.id, requested)?,
            None => current.status,
        };
        if next_status != current.status {
            changes.push(OrderChange {
                action: OrderHistoryAction::StatusChanged,
                previous_value: Some(current.status.to_string()),
                new_value: Some(next_status.to_string()),
            });
        }

        if let Some(payment) = self.payment_status {
            if payment != current.payment_status {
                changes.push(OrderChange {
                    action: OrderHistoryAction::PaymentStatusChanged,
                    previous_value: Some(current.payment_status.to_string()),
                    new_value: Some(payment.to_string()),
                });
            }
        }

        let details = OrderUpdate {
            status: None,
            payment_status: None,
            ..self.clone()
        };
        if !details.is_empty() {
            changes.push(OrderChange {
                action: OrderHistoryAction::Updated,
                previous_value: None,
                new_value: serde_json::to_string(&details).ok(),
            });
        }

        Ok(UpdatePlan {
            expected_status: current.status,
            next_status,
            changes,
        })
    }
}

/// One audited effect of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderChange {
    pub action: OrderHistoryAction,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
}

/// Result of planning an [`OrderUpdate`].
///
/// The store writes `next_status` only if the row still has
/// `expected_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub expected_status: OrderStatus,
    pub next_status: OrderStatus,
    pub changes: Vec<OrderChange>,
}

impl UpdatePlan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const CUSTOMER: &str = "6f1c2a4e-1111-4c3b-9a55-000000000001";
    const P1: &str = "6f1c2a4e-2222-4c3b-9a55-000000000001";
    const P2: &str = "6f1c2a4e-2222-4c3b-9a55-000000000002";

    fn order_with(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: "6f1c2a4e-3333-4c3b-9a55-000000000001".to_string(),
            order_number: "2610160001".to_string(),
            customer_id: CUSTOMER.to_string(),
            buyer_id: None,
            seller_id: None,
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            subtotal_cents: 200,
            tax_cents: 16,
            shipping_cents: 0,
            total_cents: 216,
            shipping_address: None,
            tracking_number: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pricing_scenario() {
        let order = NewOrder::new(CUSTOMER, vec![NewOrderItem::new(P1, 2, 100)]).tax(16);
        let priced = order.price().unwrap();

        assert_eq!(priced.items[0].line_total.cents(), 200);
        assert_eq!(priced.subtotal.cents(), 200);
        assert_eq!(priced.total.cents(), 216);
    }

    #[test]
    fn test_totals_invariant_holds() {
        let order = NewOrder::new(
            CUSTOMER,
            vec![NewOrderItem::new(P1, 3, 1_250), NewOrderItem::new(P2, 1, 999)],
        )
        .tax(760)
        .shipping(1_500);
        let priced = order.price().unwrap();

        let lines: Money = priced.items.iter().map(|i| i.line_total).sum();
        assert_eq!(priced.subtotal, lines);
        assert_eq!(priced.total, priced.subtotal + priced.tax + priced.shipping);
    }

    #[test]
    fn test_rejects_bad_intents() {
        let empty = NewOrder::new(CUSTOMER, vec![]);
        assert!(empty.price().is_err());

        let zero_qty = NewOrder::new(CUSTOMER, vec![NewOrderItem::new(P1, 0, 100)]);
        assert!(matches!(zero_qty.price(), Err(CoreError::Validation(_))));

        let negative_tax = NewOrder::new(CUSTOMER, vec![NewOrderItem::new(P1, 1, 100)]).tax(-1);
        assert!(negative_tax.validate().is_err());

        let bad_customer = NewOrder::new("nope", vec![NewOrderItem::new(P1, 1, 100)]);
        assert!(bad_customer.validate().is_err());
    }

    #[test]
    fn test_amount_ceilings_bound_order_totals() {
        let huge = NewOrder::new(CUSTOMER, vec![NewOrderItem::new(P1, 1, i64::MAX / 2 + 1)]);
        let err = huge.price().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "price"
        ));

        let too_much_tax = NewOrder::new(CUSTOMER, vec![NewOrderItem::new(P1, 1, 100)])
            .tax(crate::MAX_CHARGE_CENTS + 1);
        assert!(too_much_tax.price().is_err());

        // The largest order accepted still leaves room for store-wide sums.
        let largest = NewOrder::new(
            CUSTOMER,
            vec![NewOrderItem::new(P1, crate::MAX_ITEM_QUANTITY, crate::MAX_PRICE_CENTS); crate::MAX_ORDER_ITEMS],
        )
        .tax(crate::MAX_CHARGE_CENTS)
        .shipping(crate::MAX_CHARGE_CENTS);
        let priced = largest.price().unwrap();
        assert!(priced.total.cents() < i64::MAX / 10_000);
    }

    #[test]
    fn test_requested_quantities_merge_lines() {
        let order = NewOrder::new(
            CUSTOMER,
            vec![
                NewOrderItem::new(P1, 2, 100),
                NewOrderItem::new(P2, 1, 100),
                NewOrderItem::new(P1, 3, 90),
            ],
        );
        assert_eq!(order.requested_quantities(), vec![(P1, 5), (P2, 1)]);
    }

    #[test]
    fn test_plan_status_change() {
        let current = order_with(OrderStatus::Pending);
        let plan = OrderUpdate::status(OrderStatus::InPreparation)
            .plan(&current)
            .unwrap();

        assert_eq!(plan.expected_status, OrderStatus::Pending);
        assert_eq!(plan.next_status, OrderStatus::InPreparation);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].action, OrderHistoryAction::StatusChanged);
        assert_eq!(plan.changes[0].new_value.as_deref(), Some("IN_PREPARATION"));
    }

    #[test]
    fn test_plan_rejects_illegal_jump() {
        let current = order_with(OrderStatus::Pending);
        let err = OrderUpdate::status(OrderStatus::Completed)
            .plan(&current)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn test_plan_refuses_cancel_through_update() {
        let current = order_with(OrderStatus::Shipped);
        let err = OrderUpdate::status(OrderStatus::Cancelled)
            .plan(&current)
            .unwrap_err();
        assert!(matches!(err, CoreError::CancelRequiresCancelOperation(_)));
    }

    #[test]
    fn test_plan_bookkeeping_on_terminal_order() {
        let current = order_with(OrderStatus::Completed);
        let update = OrderUpdate {
            payment_status: Some(PaymentStatus::Paid),
            notes: Some("paid at pickup".to_string()),
            ..Default::default()
        };
        let plan = update.plan(&current).unwrap();

        assert_eq!(plan.next_status, OrderStatus::Completed);
        let actions: Vec<_> = plan.changes.iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![OrderHistoryAction::PaymentStatusChanged, OrderHistoryAction::Updated]
        );
        assert_eq!(
            plan.changes[1].new_value.as_deref(),
            Some(r#"{"notes":"paid at pickup"}"#)
        );
    }

    #[test]
    fn test_empty_update_is_noop() {
        let current = order_with(OrderStatus::Pending);
        assert!(OrderUpdate::default().is_empty());
        assert!(OrderUpdate::default().plan(&current).unwrap().is_noop());
        assert!(OrderUpdate::status(OrderStatus::Pending)
            .plan(&current)
            .unwrap()
            .is_noop());
    }
}
