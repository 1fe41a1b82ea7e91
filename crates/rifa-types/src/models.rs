use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum using the
/// same lowercase names serde uses on the wire.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

// -- Raffles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaffleStatus {
    Draft,
    Active,
    Paused,
    Ended,
    Drawn,
}

string_enum!(RaffleStatus, "raffle status", {
    Draft => "draft",
    Active => "active",
    Paused => "paused",
    Ended => "ended",
    Drawn => "drawn",
});

/// Per-locale override of a raffle's display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaffleTranslation {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raffle {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub specifications: Map<String, Value>,
    #[serde(default)]
    pub translations: BTreeMap<String, RaffleTranslation>,
    pub market_value: f64,
    pub price_per_number: f64,
    /// Fixed at creation.
    pub total_numbers: u32,
    pub draw_date: DateTime<Utc>,
    pub status: RaffleStatus,
    pub winner_number: Option<u32>,
    pub winner_user_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "soldNumbers", default, skip_serializing_if = "Option::is_none")]
    pub sold_numbers: Option<u64>,
}

impl Raffle {
    /// Replace title, description and specifications with the translation for
    /// `locale`, if the raffle carries one. Unknown locales leave the base text.
    pub fn localize(&mut self, locale: &str) {
        let Some(tr) = self.translations.get(locale) else {
            return;
        };
        if !tr.title.is_empty() {
            self.title = tr.title.clone();
        }
        if !tr.description.is_empty() {
            self.description = tr.description.clone();
        }
        if let Some(specs) = &tr.specifications {
            self.specifications = specs.clone();
        }
    }

    pub fn contains_number(&self, number: u32) -> bool {
        (1..=self.total_numbers).contains(&number)
    }
}

// -- Ticket numbers --

/// Payment state of a single ticket-number row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Expired,
}

string_enum!(NumberStatus, "number status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
    Expired => "expired",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaffleNumber {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub number: u32,
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub user_name: String,
    pub user_phone: Option<String>,
    pub payment_status: NumberStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_id: Option<Uuid>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RaffleNumber {
    /// A row blocks its number while it is paid, or pending with a live hold.
    pub fn is_taken_at(&self, now: DateTime<Utc>) -> bool {
        match self.payment_status {
            NumberStatus::Paid => true,
            NumberStatus::Pending => self.reserved_until.is_some_and(|until| until > now),
            _ => false,
        }
    }
}

// -- Payments --

/// Payment rail. Serialized with the provider slug used in the payment routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "stripe")]
    Card,
    #[serde(rename = "pix")]
    InstantTransfer,
    #[serde(rename = "zelle")]
    BankTransfer,
}

string_enum!(PaymentMethod, "payment provider", {
    Card => "stripe",
    InstantTransfer => "pix",
    BankTransfer => "zelle",
});

impl PaymentMethod {
    /// Currency forced by the rail, if any. Card payments use the buyer's currency.
    pub fn fixed_currency(&self) -> Option<&'static str> {
        match self {
            Self::Card => None,
            Self::InstantTransfer => Some("BRL"),
            Self::BankTransfer => Some("USD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
    Cancelled => "cancelled",
});

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Pending, Processing | Completed | Failed | Cancelled) => true,
            (Processing, Completed | Failed | Cancelled) => true,
            (Completed, Refunded) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub user_name: String,
    pub user_phone: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Correlation id on the provider side (card intent id, transfer txid, reference).
    pub provider_ref: Option<String>,
    pub numbers: Vec<u32>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Profiles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Moderator,
}

string_enum!(Role, "role", {
    User => "user",
    Admin => "admin",
    Moderator => "moderator",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
