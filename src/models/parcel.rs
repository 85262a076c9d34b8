use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatus {
    Pending,
    Confirmed,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
}

impl ParcelStatus {
    pub const ALL: [ParcelStatus; 8] = [
        ParcelStatus::Pending,
        ParcelStatus::Confirmed,
        ParcelStatus::PickedUp,
        ParcelStatus::InTransit,
        ParcelStatus::OutForDelivery,
        ParcelStatus::Delivered,
        ParcelStatus::Returned,
        ParcelStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Pending => "PENDING",
            ParcelStatus::Confirmed => "CONFIRMED",
            ParcelStatus::PickedUp => "PICKED_UP",
            ParcelStatus::InTransit => "IN_TRANSIT",
            ParcelStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            ParcelStatus::Delivered => "DELIVERED",
            ParcelStatus::Returned => "RETURNED",
            ParcelStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParcelStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase().replace('-', "_");
        ParcelStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| AppError::Validation(format!("unknown parcel status: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    Standard,
    Express,
    Overnight,
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(Priority::Standard),
            "EXPRESS" => Ok(Priority::Express),
            "OVERNIGHT" => Ok(Priority::Overnight),
            _ => Err(AppError::Validation(format!(
                "unknown priority: {raw}, expected STANDARD/EXPRESS/OVERNIGHT"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub postal_code: String,
}

impl Address {
    /// City and country only; safe to show without authentication.
    pub fn coarse(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderInfo {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiverContact {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl ReceiverContact {
    pub fn contact_keys(&self) -> Vec<ContactKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(email) = self.email.as_deref().and_then(ContactKey::email) {
            keys.push(email);
        }
        if let Some(phone) = ContactKey::phone(&self.phone) {
            keys.push(phone);
        }
        keys
    }
}

/// Key under which a parcel counts as "received" by a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContactKey {
    Email(String),
    Phone(String),
}

impl ContactKey {
    pub fn email(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(ContactKey::Email(normalized))
        }
    }

    pub fn phone(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }

        if trimmed.starts_with('+') {
            Some(ContactKey::Phone(format!("+{digits}")))
        } else {
            Some(ContactKey::Phone(digits))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parcel {
    pub id: Uuid,
    pub tracking_number: String,
    pub description: String,
    pub weight: Decimal,
    pub declared_value: Decimal,
    pub priority: Priority,
    pub shipping_cost: Decimal,
    pub sender: SenderInfo,
    pub receiver: ReceiverContact,
    pub receiver_self_service: bool,
    pub pickup: Address,
    pub delivery: Address,
    pub special_instructions: Option<String>,
    pub estimated_delivery_date: DateTime<Utc>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A parcel together with the status derived from its ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParcelView {
    #[serde(flatten)]
    pub parcel: Parcel,
    pub status: ParcelStatus,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ContactKey, ParcelStatus, Priority, ReceiverContact};

    #[test]
    fn status_parses_wire_and_loose_forms() {
        assert_eq!(
            ParcelStatus::from_str("OUT_FOR_DELIVERY").unwrap(),
            ParcelStatus::OutForDelivery
        );
        assert_eq!(
            ParcelStatus::from_str(" picked-up ").unwrap(),
            ParcelStatus::PickedUp
        );
        assert!(ParcelStatus::from_str("LOST").is_err());
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ParcelStatus::InTransit).unwrap();
        assert_eq!(json, "\"IN_TRANSIT\"");
    }

    #[test]
    fn unknown_priority_is_a_validation_error() {
        let err = Priority::from_str("TELEPORT").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(Priority::from_str("express").unwrap(), Priority::Express);
    }

    #[test]
    fn contact_keys_are_normalized() {
        let receiver = ReceiverContact {
            name: "Bo".to_string(),
            phone: "+1 (555) 010-2000".to_string(),
            email: Some("  Bo@Example.COM ".to_string()),
        };

        assert_eq!(
            receiver.contact_keys(),
            vec![
                ContactKey::Email("bo@example.com".to_string()),
                ContactKey::Phone("+15550102000".to_string()),
            ]
        );
        assert_eq!(ContactKey::email("   "), None);
        assert_eq!(ContactKey::phone("n/a"), None);
    }
}
