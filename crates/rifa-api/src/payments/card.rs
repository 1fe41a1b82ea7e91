use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("card payments are not configured")]
    NotConfigured,

    #[error("card processor rejected the request: {0}")]
    Rejected(String),

    #[error("card processor unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// What the processor needs to open a payment intent.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub payment_id: Uuid,
    pub raffle_id: Uuid,
    /// Minor units (cents).
    pub amount_minor: i64,
    pub currency: String,
    pub numbers: Vec<u32>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait CardProcessor: Send + Sync {
    async fn create_intent(&self, req: &IntentRequest) -> Result<PaymentIntent, CardError>;
}

/// Card processor speaking the Stripe REST API.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[async_trait]
impl CardProcessor for StripeClient {
    async fn create_intent(&self, req: &IntentRequest) -> Result<PaymentIntent, CardError> {
        let key = self.secret_key.as_deref().ok_or(CardError::NotConfigured)?;

        let numbers = serde_json::to_string(&req.numbers).unwrap_or_default();
        let mut form = vec![
            ("amount", req.amount_minor.to_string()),
            ("currency", req.currency.to_lowercase()),
            ("metadata[paymentId]", req.payment_id.to_string()),
            ("metadata[raffleId]", req.raffle_id.to_string()),
            ("metadata[numbers]", numbers),
            ("metadata[userEmail]", req.email.clone()),
            ("metadata[userName]", req.name.clone()),
        ];
        if let Some(phone) = &req.phone {
            form.push(("metadata[userWhatsapp]", phone.clone()));
        }

        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(key)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| status.to_string());
            warn!("Payment intent for {} refused: {}", req.payment_id, message);
            return Err(CardError::Rejected(message));
        }

        let intent: PaymentIntent = resp.json().await?;
        debug!("Payment intent {} opened for {}", intent.id, req.payment_id);
        Ok(intent)
    }
}

/// Amount in minor units, rounded to the nearest cent.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
