//! # Change Events
//!
//! The envelope every observer receives, adjacently tagged:
//! ```json
//! { "type": "sale_created", "data": { "id": 7, "receiptNumber": "20240501-000007", ... } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{Customer, SaleWithRelations};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Sent once to a new observer, after it is subscribed.
    Connected(Greeting),

    /// A settlement committed.
    SaleCreated(Box<SaleWithRelations>),

    /// A customer's points were adjusted by an administrator.
    CustomerUpdated(Box<Customer>),
}

impl ChangeEvent {
    pub fn sale_created(sale: SaleWithRelations) -> Self {
        ChangeEvent::SaleCreated(Box::new(sale))
    }

    pub fn customer_updated(customer: Customer) -> Self {
        ChangeEvent::CustomerUpdated(Box::new(customer))
    }

    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Connected(_) => "connected",
            ChangeEvent::SaleCreated(_) => "sale_created",
            ChangeEvent::CustomerUpdated(_) => "customer_updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Greeting {
    pub observer_id: String,
    pub server_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: 3,
            name: "Ana".to_string(),
            email: None,
            phone: None,
            loyalty_points: 120,
            loyalty_tier: Some("Silver".to_string()),
            points_multiplier_bps: 12_500,
            total_spent_cents: 0,
            total_orders: 0,
            last_visit: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ChangeEvent::customer_updated(customer())).unwrap();
        assert_eq!(json["type"], "customer_updated");
        assert_eq!(json["data"]["loyaltyTier"], "Silver");
        assert_eq!(json["data"]["pointsMultiplierBps"], 12_500);
    }

    #[test]
    fn test_greeting_is_camel_case() {
        let event = ChangeEvent::Connected(Greeting {
            observer_id: "obs-1".to_string(),
            server_time: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["data"]["observerId"], "obs-1");
        assert_eq!(event.kind(), "connected");
    }
}
