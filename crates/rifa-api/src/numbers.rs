use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use rifa_db::models::Contact;
use rifa_db::ReserveError;
use rifa_types::RESERVATION_HOLD_SECS;
use rifa_types::api::{ReserveNumbersRequest, ReserveNumbersResponse};
use rifa_types::models::{Raffle, RaffleStatus};

use crate::error::ApiError;
use crate::{AppState, blocking};

pub async fn get_numbers(
    State(state): State<AppState>,
    Path(raffle_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let board = blocking(&state, move |db| {
        if db.get_raffle(raffle_id)?.is_none() {
            return Ok(None);
        }
        db.number_board(raffle_id, now).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("raffle not found"))?;

    Ok(Json(board))
}

pub async fn reserve_numbers(
    State(state): State<AppState>,
    Path(raffle_id): Path<Uuid>,
    Json(req): Json<ReserveNumbersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = contact_from(&req.user_email, &req.user_name, req.user_whatsapp.as_deref())?;
    let raffle = load_raffle(&state, raffle_id).await?;
    if raffle.status != RaffleStatus::Active {
        return Err(ApiError::Conflict(format!("raffle is {}", raffle.status)));
    }
    check_selection(&raffle, &req.numbers)?;

    let now = Utc::now();
    let hold = Duration::seconds(RESERVATION_HOLD_SECS);
    let numbers = req.numbers.clone();
    let rows = blocking(&state, move |db| {
        Ok::<_, ApiError>(db.reserve_numbers(raffle_id, &numbers, &contact, now, hold))
    })
    .await?
    .map_err(|e| {
        if let ReserveError::Conflict { numbers } = &e {
            warn!("Reservation on raffle {} lost numbers {:?}", raffle_id, numbers);
        }
        ApiError::from(e)
    })?;

    info!("Reserved {} numbers on raffle {}", rows.len(), raffle_id);
    Ok(Json(ReserveNumbersResponse {
        success: true,
        reserved_until: now + hold,
        numbers: rows,
    }))
}

pub(crate) async fn load_raffle(state: &AppState, id: Uuid) -> Result<Raffle, ApiError> {
    blocking(state, move |db| db.get_raffle(id))
        .await?
        .ok_or_else(|| ApiError::not_found("raffle not found"))
}

/// Buyer contact from request fields. Name and email must be present.
pub(crate) fn contact_from(
    email: &str,
    name: &str,
    phone: Option<&str>,
) -> Result<Contact, ApiError> {
    let email = email.trim();
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("userName is required"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("userEmail is required"));
    }
    Ok(Contact {
        email: email.to_string(),
        name: name.to_string(),
        phone: phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
        user_id: None,
    })
}

/// Non-empty, distinct, and inside the raffle's pool.
pub(crate) fn check_selection(raffle: &Raffle, numbers: &[u32]) -> Result<(), ApiError> {
    if numbers.is_empty() {
        return Err(ApiError::bad_request("numbers must not be empty"));
    }
    let mut seen = HashSet::with_capacity(numbers.len());
    for &n in numbers {
        if !raffle.contains_number(n) {
            return Err(ApiError::bad_request(format!(
                "number {} is outside 1..={}",
                n, raffle.total_numbers
            )));
        }
        if !seen.insert(n) {
            return Err(ApiError::bad_request(format!("number {} is repeated", n)));
        }
    }
    Ok(())
}
