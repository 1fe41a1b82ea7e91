use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{
    NumberStatus, Payment, PaymentStatus, Profile, Raffle, RaffleNumber, RaffleStatus,
    RaffleTranslation,
};

// -- JWT Claims --

/// Bearer-token claims shared by the server middleware and the buyer client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub token: String,
    pub profile: Profile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

// -- Raffles --

#[derive(Debug, Serialize, Deserialize)]
pub struct RafflesResponse {
    pub raffles: Vec<Raffle>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RaffleResponse {
    pub raffle: Raffle,
}

fn default_status() -> RaffleStatus {
    RaffleStatus::Draft
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRaffleRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub specifications: Map<String, Value>,
    #[serde(default)]
    pub translations: BTreeMap<String, RaffleTranslation>,
    #[serde(default)]
    pub market_value: f64,
    pub price_per_number: f64,
    pub total_numbers: u32,
    pub draw_date: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: RaffleStatus,
}

/// Admin edit of a raffle. `total_numbers` is deliberately absent and rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRaffleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub specifications: Option<Map<String, Value>>,
    pub translations: Option<BTreeMap<String, RaffleTranslation>>,
    pub market_value: Option<f64>,
    pub price_per_number: Option<f64>,
    pub draw_date: Option<DateTime<Utc>>,
    pub status: Option<RaffleStatus>,
    pub winner_number: Option<u32>,
    pub winner_user_id: Option<Uuid>,
}

impl UpdateRaffleRequest {
    pub fn apply(&self, raffle: &mut Raffle) {
        if let Some(v) = &self.title {
            raffle.title = v.clone();
        }
        if let Some(v) = &self.description {
            raffle.description = v.clone();
        }
        if let Some(v) = &self.images {
            raffle.images = v.clone();
        }
        if let Some(v) = &self.specifications {
            raffle.specifications = v.clone();
        }
        if let Some(v) = &self.translations {
            raffle.translations = v.clone();
        }
        if let Some(v) = self.market_value {
            raffle.market_value = v;
        }
        if let Some(v) = self.price_per_number {
            raffle.price_per_number = v;
        }
        if let Some(v) = self.draw_date {
            raffle.draw_date = v;
        }
        if let Some(v) = self.status {
            raffle.status = v;
        }
        if self.winner_number.is_some() {
            raffle.winner_number = self.winner_number;
        }
        if self.winner_user_id.is_some() {
            raffle.winner_user_id = self.winner_user_id;
        }
    }
}

// -- Ticket numbers --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberBoard {
    pub sold_numbers: Vec<u32>,
    pub reserved_numbers: Vec<u32>,
    pub total_sold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveNumbersRequest {
    pub numbers: Vec<u32>,
    pub user_email: String,
    pub user_name: String,
    #[serde(default)]
    pub user_whatsapp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveNumbersResponse {
    pub success: bool,
    pub reserved_until: DateTime<Utc>,
    pub numbers: Vec<RaffleNumber>,
}

// -- Payments --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub raffle_id: Uuid,
    pub numbers: Vec<u32>,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub user_email: String,
    pub user_name: String,
    #[serde(default)]
    pub user_whatsapp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettlePaymentRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub payment: Payment,
}

// -- Admin --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_raffles: u64,
    pub active_raffles: u64,
    pub total_users: u64,
    pub total_revenue: f64,
    pub pending_payments: u64,
}

/// Partition `(number, status, reserved_until)` rows into sold and reserved.
/// Pending rows whose hold has lapsed count as available.
pub fn classify_rows<I>(rows: I, now: DateTime<Utc>) -> NumberBoard
where
    I: IntoIterator<Item = (u32, NumberStatus, Option<DateTime<Utc>>)>,
{
    let mut sold = BTreeSet::new();
    let mut reserved = BTreeSet::new();
    for (number, status, reserved_until) in rows {
        match status {
            NumberStatus::Paid => {
                sold.insert(number);
            }
            NumberStatus::Pending if reserved_until.is_some_and(|until| until > now) => {
                reserved.insert(number);
            }
            _ => {}
        }
    }
    let reserved_numbers: Vec<u32> = reserved.difference(&sold).copied().collect();
    let sold_numbers: Vec<u32> = sold.into_iter().collect();
    NumberBoard {
        total_sold: sold_numbers.len(),
        sold_numbers,
        reserved_numbers,
    }
}
