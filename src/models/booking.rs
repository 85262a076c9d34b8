use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::parcel::{Address, Priority, ReceiverContact};

/// Booking payload as submitted by a sender. Missing fields deserialize to
/// empty values so that they surface as validation errors, not parse errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingRequest {
    pub description: String,
    pub weight: Decimal,
    pub declared_value: Decimal,
    pub priority: Option<String>,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_email: Option<String>,
    pub receiver_self_service: Option<bool>,
    pub pickup: Address,
    pub delivery: Address,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidatedBooking {
    pub description: String,
    pub weight: Decimal,
    pub declared_value: Decimal,
    pub priority: Priority,
    pub receiver: ReceiverContact,
    pub receiver_self_service: bool,
    pub pickup: Address,
    pub delivery: Address,
    pub special_instructions: Option<String>,
}

impl BookingRequest {
    pub fn validate(self) -> Result<ValidatedBooking, AppError> {
        let description = required("description", self.description)?;

        if self.weight <= Decimal::ZERO {
            return Err(AppError::Validation("weight must be > 0".to_string()));
        }
        if self.declared_value < Decimal::ZERO {
            return Err(AppError::Validation(
                "declared_value must be >= 0".to_string(),
            ));
        }

        let priority = match self.priority.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<Priority>()?,
            _ => Priority::default(),
        };

        let receiver = ReceiverContact {
            name: required("receiver_name", self.receiver_name)?,
            phone: required("receiver_phone", self.receiver_phone)?,
            email: optional(self.receiver_email),
        };

        Ok(ValidatedBooking {
            description,
            weight: self.weight,
            declared_value: self.declared_value,
            priority,
            receiver,
            receiver_self_service: self.receiver_self_service.unwrap_or(true),
            pickup: validate_address("pickup", self.pickup)?,
            delivery: validate_address("delivery", self.delivery)?,
            special_instructions: optional(self.special_instructions),
        })
    }
}

fn validate_address(prefix: &str, address: Address) -> Result<Address, AppError> {
    Ok(Address {
        street: required(&format!("{prefix}.street"), address.street)?,
        city: required(&format!("{prefix}.city"), address.city)?,
        region: required(&format!("{prefix}.region"), address.region)?,
        country: required(&format!("{prefix}.country"), address.country)?,
        postal_code: required(&format!("{prefix}.postal_code"), address.postal_code)?,
    })
}

fn required(field: &str, value: String) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
