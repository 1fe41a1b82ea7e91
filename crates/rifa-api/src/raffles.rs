use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use rifa_types::api::{
    Claims, CreateRaffleRequest, RaffleResponse, RafflesResponse, UpdateRaffleRequest,
};
use rifa_types::models::{Raffle, RaffleStatus};

use crate::auth::ensure_profile;
use crate::error::ApiError;
use crate::policy::{Action, authorize};
use crate::{AppState, blocking};

const MAX_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_status")]
    pub status: RaffleStatus,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub locale: Option<String>,
}

fn default_status() -> RaffleStatus {
    RaffleStatus::Active
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<String>,
}

pub async fn list_raffles(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(MAX_PAGE);
    let (status, offset) = (query.status, query.offset);
    let mut raffles = blocking(&state, move |db| db.list_raffles(status, limit, offset)).await?;

    if let Some(locale) = query.locale.as_deref() {
        raffles.iter_mut().for_each(|r| r.localize(locale));
    }

    Ok(Json(RafflesResponse { raffles }))
}

pub async fn get_raffle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LocaleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut raffle = blocking(&state, move |db| db.get_raffle(id))
        .await?
        .ok_or_else(|| ApiError::not_found("raffle not found"))?;

    if let Some(locale) = query.locale.as_deref() {
        raffle.localize(locale);
    }

    Ok(Json(RaffleResponse { raffle }))
}

pub async fn create_raffle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRaffleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = ensure_profile(&state, claims.sub, &claims.email).await?;
    authorize(profile.role, Action::CreateRaffle)?;

    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    if req.total_numbers == 0 {
        return Err(ApiError::bad_request("total_numbers must be at least 1"));
    }
    if !(req.price_per_number > 0.0) {
        return Err(ApiError::bad_request("price_per_number must be positive"));
    }

    let now = Utc::now();
    let raffle = Raffle {
        id: Uuid::new_v4(),
        title: req.title,
        description: req.description,
        images: req.images,
        specifications: req.specifications,
        translations: req.translations,
        market_value: req.market_value,
        price_per_number: req.price_per_number,
        total_numbers: req.total_numbers,
        draw_date: req.draw_date,
        status: req.status,
        winner_number: None,
        winner_user_id: None,
        created_by: Some(claims.sub),
        created_at: now,
        updated_at: now,
        sold_numbers: Some(0),
    };

    let stored = raffle.clone();
    blocking(&state, move |db| db.insert_raffle(&stored)).await?;
    info!("Raffle {} created by {}", raffle.id, claims.sub);

    Ok((StatusCode::CREATED, Json(RaffleResponse { raffle })))
}

pub async fn update_raffle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<UpdateRaffleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = ensure_profile(&state, claims.sub, &claims.email).await?;
    authorize(profile.role, Action::UpdateRaffle)?;

    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("title cannot be empty"));
    }
    if patch.price_per_number.is_some_and(|p| !(p > 0.0)) {
        return Err(ApiError::bad_request("price_per_number must be positive"));
    }

    let now = Utc::now();
    let raffle = blocking(&state, move |db| {
        if let Some(winner) = patch.winner_number {
            match db.get_raffle(id)? {
                Some(r) if !r.contains_number(winner) => return Ok(Err(winner)),
                None => return Ok(Ok(None)),
                Some(_) => {}
            }
        }
        db.update_raffle(id, &patch, now).map(Ok)
    })
    .await?
    .map_err(|winner| ApiError::bad_request(format!("winner number {} is out of range", winner)))?
    .ok_or_else(|| ApiError::not_found("raffle not found"))?;

    info!("Raffle {} updated by {}", id, claims.sub);
    Ok(Json(RaffleResponse { raffle }))
}
