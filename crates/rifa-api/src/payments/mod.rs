//! Payment initiation for the three rails and admin settlement.
//!
//! Every rail goes through the same checks before anything is charged: the
//! raffle exists, the numbers are valid, the amount matches the raffle price,
//! and the buyer still holds every number. The rail then produces its
//! [`PaymentInstructions`] and the payment row is written in the same
//! transaction that links the buyer's holds to it.

pub mod card;
pub mod pix;
pub mod zelle;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use rifa_db::models::NewPayment;
use rifa_types::api::{Claims, InitiatePaymentRequest, PaymentResponse, SettlePaymentRequest};
use rifa_types::models::PaymentMethod;
use rifa_types::payment::{CardPayment, PaymentInstructions};

use crate::auth::ensure_profile;
use crate::error::ApiError;
use crate::numbers::{check_selection, contact_from, load_raffle};
use crate::policy::{Action, authorize};
use crate::{AppState, blocking};

use self::card::{CardError, IntentRequest, to_minor_units};

/// Recipient details for the transfer rails.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub pix_key: String,
    pub zelle_email: String,
    pub zelle_phone: String,
    pub reference_prefix: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            pix_key: "pagamentos@rifa.example".into(),
            zelle_email: "payments@rifa.example".into(),
            zelle_phone: "+10000000000".into(),
            reference_prefix: "RIFA".into(),
        }
    }
}

const DEFAULT_CARD_CURRENCY: &str = "USD";

pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let method: PaymentMethod = provider
        .parse()
        .map_err(|_| ApiError::not_found(format!("unknown payment provider '{}'", provider)))?;

    let contact = contact_from(&req.user_email, &req.user_name, req.user_whatsapp.as_deref())?;
    let raffle = load_raffle(&state, req.raffle_id).await?;
    check_selection(&raffle, &req.numbers)?;

    let amount = req.numbers.len() as f64 * raffle.price_per_number;
    if to_minor_units(req.amount) != to_minor_units(amount) {
        return Err(ApiError::bad_request(format!(
            "amount {:.2} does not match {} numbers at {:.2}",
            req.amount,
            req.numbers.len(),
            raffle.price_per_number
        )));
    }
    let amount = rifa_types::round_cents(amount);

    let currency = match method.fixed_currency() {
        Some(fixed) => fixed.to_string(),
        None => req
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CARD_CURRENCY)
            .to_uppercase(),
    };

    // Refuse before asking a rail for money.
    let now = Utc::now();
    let (raffle_id, numbers, email) = (raffle.id, req.numbers.clone(), contact.email.clone());
    let held = blocking(&state, move |db| db.active_holds(raffle_id, &numbers, &email, now)).await?;
    if held.len() != req.numbers.len() {
        let missing: Vec<u32> = req
            .numbers
            .iter()
            .copied()
            .filter(|n| !held.contains(n))
            .collect();
        return Err(ApiError::Conflict(format!(
            "numbers not held by this buyer: {:?}",
            missing
        )));
    }

    let payment_id = Uuid::new_v4();
    let (instructions, provider_ref) = match method {
        PaymentMethod::Card => {
            let intent = state
                .card
                .create_intent(&IntentRequest {
                    payment_id,
                    raffle_id,
                    amount_minor: to_minor_units(amount),
                    currency: currency.clone(),
                    numbers: req.numbers.clone(),
                    email: contact.email.clone(),
                    name: contact.name.clone(),
                    phone: contact.phone.clone(),
                })
                .await
                .map_err(provider_error)?;
            (
                PaymentInstructions::Card(CardPayment {
                    client_secret: intent.client_secret,
                    payment_id,
                }),
                intent.id,
            )
        }
        PaymentMethod::InstantTransfer => {
            let p = pix::instructions(&state.payments.pix_key, amount, raffle_id, payment_id, now);
            (PaymentInstructions::InstantTransfer(p), pix::txid(payment_id))
        }
        PaymentMethod::BankTransfer => {
            let settings = &state.payments;
            let p = zelle::instructions(
                &settings.zelle_email,
                &settings.zelle_phone,
                &settings.reference_prefix,
                amount,
                payment_id,
            );
            let reference = p.reference.clone();
            (PaymentInstructions::BankTransfer(p), reference)
        }
    };

    let metadata = serde_json::to_value(&instructions).map_err(|e| {
        error!("Serializing payment instructions failed: {}", e);
        ApiError::Internal
    })?;
    let new = NewPayment {
        id: payment_id,
        raffle_id,
        contact,
        amount,
        currency,
        method,
        provider_ref: Some(provider_ref),
        numbers: req.numbers,
        metadata,
    };
    blocking(&state, move |db| db.insert_payment(&new, now)).await?;

    info!("Payment {} ({}) opened on raffle {}", payment_id, method, raffle_id);
    Ok(Json(instructions))
}

pub async fn settle_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SettlePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = ensure_profile(&state, claims.sub, &claims.email).await?;
    authorize(profile.role, Action::SettlePayment)?;

    let now = Utc::now();
    let status = req.status;
    let payment = blocking(&state, move |db| db.settle_payment(id, status, now)).await?;

    info!("Payment {} settled as {} by {}", id, status, claims.sub);
    Ok(Json(PaymentResponse { payment }))
}

fn provider_error(e: CardError) -> ApiError {
    match e {
        CardError::Transport(inner) => {
            error!("Card processor request failed: {}", inner);
            ApiError::Provider("card processor unavailable".into())
        }
        other => ApiError::Provider(other.to_string()),
    }
}
