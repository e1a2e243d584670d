//! Payment and delivery rules for an order, kept free of persistence so the
//! service layer only loads, applies and saves.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    entity::orders::{ActiveModel as OrderActive, Model as OrderModel},
    error::AppError,
    models::{OrderStatus, PaymentResult},
};
use sea_orm::Set;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderStateError {
    #[error("Payment status can only be updated for delivered orders")]
    PaymentRequiresDelivery,
}

impl From<OrderStateError> for AppError {
    fn from(err: OrderStateError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

/// The mutable part of an order after checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLifecycle {
    pub order_status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Default for OrderLifecycle {
    fn default() -> Self {
        Self {
            order_status: OrderStatus::Processing,
            is_paid: false,
            paid_at: None,
            payment_result: None,
            is_delivered: false,
            delivered_at: None,
        }
    }
}

impl OrderLifecycle {
    /// Payment confirmation callback. Not gated on delivery.
    pub fn mark_paid(&mut self, result: PaymentResult, now: DateTime<Utc>) {
        self.is_paid = true;
        self.paid_at = Some(now);
        self.payment_result = Some(result);
    }

    /// Delivered is re-stamped on every call; leaving Delivered clears it.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.order_status = status;
        if status == OrderStatus::Delivered {
            self.is_delivered = true;
            self.delivered_at = Some(now);
        } else if self.is_delivered {
            self.is_delivered = false;
            self.delivered_at = None;
        }
    }

    /// Admin update. The status part is applied before the payment gate is
    /// checked and stays applied when the gate rejects the payment part.
    pub fn apply_admin_update(
        &mut self,
        status: Option<OrderStatus>,
        is_paid: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderStateError> {
        let was_delivered = self.is_delivered;

        if let Some(status) = status {
            self.set_status(status, now);
        }

        let Some(is_paid) = is_paid else {
            return Ok(());
        };

        let delivered_now = status == Some(OrderStatus::Delivered) || was_delivered;
        if !delivered_now {
            return Err(OrderStateError::PaymentRequiresDelivery);
        }

        self.is_paid = is_paid;
        if is_paid {
            self.paid_at = self.paid_at.or(Some(now));
        } else {
            self.paid_at = None;
            self.payment_result = None;
        }
        Ok(())
    }

    /// Copy the lifecycle columns onto an active model for saving.
    pub fn write_to(self, active: &mut OrderActive) {
        active.order_status = Set(self.order_status);
        active.is_paid = Set(self.is_paid);
        active.paid_at = Set(self.paid_at.map(Into::into));
        active.payment_result = Set(self.payment_result);
        active.is_delivered = Set(self.is_delivered);
        active.delivered_at = Set(self.delivered_at.map(Into::into));
    }
}

impl From<&OrderModel> for OrderLifecycle {
    fn from(model: &OrderModel) -> Self {
        Self {
            order_status: model.order_status,
            is_paid: model.is_paid,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            payment_result: model.payment_result.clone(),
            is_delivered: model.is_delivered,
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
