use crate::schema::{payments, subscriptions};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FREE_PLAN: &str = "free";

// Billing rows are persisted for future use; nothing in the entitlement
// path reads them back (see services::entitlements).

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub is_active: bool,
    pub auto_renew: bool,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan: String,
    pub is_active: bool,
    pub auto_renew: bool,
}

impl NewSubscription {
    pub fn free(user_id: Uuid) -> Self {
        Self {
            user_id,
            plan: FREE_PLAN.to_string(),
            is_active: true,
            auto_renew: false,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_ref: String,
    pub order_ref: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub method: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub payment_ref: String,
    pub order_ref: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_subscription_defaults() {
        let user_id = Uuid::new_v4();
        let sub = NewSubscription::free(user_id);
        assert_eq!(sub.plan, "free");
        assert!(sub.is_active);
        assert!(!sub.auto_renew);
    }
}
