use axum::{Extension, Json, extract::State, response::IntoResponse};

use rifa_types::api::Claims;

use crate::auth::ensure_profile;
use crate::error::ApiError;
use crate::policy::{Action, authorize};
use crate::{AppState, blocking};

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = ensure_profile(&state, claims.sub, &claims.email).await?;
    authorize(profile.role, Action::ViewStats)?;

    let stats = blocking(&state, |db| db.stats()).await?;
    Ok(Json(stats))
}
