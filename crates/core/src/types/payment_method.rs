//! Stored payment methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{PaymentMethodId, UserId};
use crate::payment::{PaymentDetails, PaymentMethodType};
use crate::selection::{Selectable, Slot};

/// A saved, tokenized payment method.
///
/// Only display details and the processor reference are kept; card numbers,
/// security codes and full IBANs never reach storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub user_id: UserId,
    pub method_type: PaymentMethodType,
    pub details: PaymentDetails,
    /// Opaque reference issued by the payment processor.
    #[serde(skip_serializing, default)]
    pub processor_token: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for inserting a new payment method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentMethod {
    pub details: PaymentDetails,
    pub processor_token: String,
}

impl NewPaymentMethod {
    #[must_use]
    pub const fn method_type(&self) -> PaymentMethodType {
        self.details.method_type()
    }
}

impl Selectable for PaymentMethod {
    type Id = PaymentMethodId;

    fn slot(&self) -> Slot<PaymentMethodId> {
        Slot {
            id: self.id,
            is_default: self.is_default,
            created_at: self.created_at,
        }
    }

    fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }
}
