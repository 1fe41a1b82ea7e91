use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PaymentMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayment {
    /// Opaque secret the browser hands to the card processor's widget.
    pub client_secret: String,
    pub payment_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantTransferPayment {
    pub pix_code: String,
    pub pix_key: String,
    pub amount: f64,
    pub payment_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferPayment {
    pub zelle_email: String,
    pub zelle_phone: String,
    pub amount: f64,
    pub payment_id: Uuid,
    pub reference: String,
    pub instructions: Vec<String>,
}

/// What the buyer must do next to pay. Each variant serializes to the flat
/// response body of its provider route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentInstructions {
    Card(CardPayment),
    InstantTransfer(InstantTransferPayment),
    BankTransfer(BankTransferPayment),
}

impl PaymentInstructions {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Card(_) => PaymentMethod::Card,
            Self::InstantTransfer(_) => PaymentMethod::InstantTransfer,
            Self::BankTransfer(_) => PaymentMethod::BankTransfer,
        }
    }

    pub fn payment_id(&self) -> Uuid {
        match self {
            Self::Card(p) => p.payment_id,
            Self::InstantTransfer(p) => p.payment_id,
            Self::BankTransfer(p) => p.payment_id,
        }
    }

    /// Parse a provider response body, using the route's method to pick the shape.
    pub fn from_json(method: PaymentMethod, body: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match method {
            PaymentMethod::Card => Self::Card(serde_json::from_value(body)?),
            PaymentMethod::InstantTransfer => Self::InstantTransfer(serde_json::from_value(body)?),
            PaymentMethod::BankTransfer => Self::BankTransfer(serde_json::from_value(body)?),
        })
    }
}
