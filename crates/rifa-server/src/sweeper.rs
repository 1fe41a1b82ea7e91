use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use rifa_api::AppState;

/// Background task that marks lapsed reservation holds as expired.
///
/// Reads already treat a lapsed hold as available; this only keeps the
/// stored `payment_status` honest for reporting.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: expired {} lapsed holds", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}

pub async fn sweep_once(state: &AppState) -> anyhow::Result<usize> {
    let st = state.clone();
    tokio::task::spawn_blocking(move || st.db.expire_stale_holds(Utc::now())).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use rifa_api::AppStateInner;
    use rifa_api::payments::PaymentSettings;
    use rifa_api::payments::card::{CardError, CardProcessor, IntentRequest, PaymentIntent};
    use rifa_db::Database;
    use rifa_db::models::Contact;
    use rifa_types::models::{NumberStatus, Raffle, RaffleStatus};
    use serde_json::Map;
    use uuid::Uuid;

    struct NoCard;

    #[async_trait]
    impl CardProcessor for NoCard {
        async fn create_intent(&self, _: &IntentRequest) -> Result<PaymentIntent, CardError> {
            Err(CardError::NotConfigured)
        }
    }

    #[tokio::test]
    async fn test_sweep_expires_lapsed_holds() {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            admin_email: None,
            card: Arc::new(NoCard),
            payments: PaymentSettings::default(),
        });

        let now = Utc::now();
        let raffle = Raffle {
            id: Uuid::new_v4(),
            title: "Phone".into(),
            description: String::new(),
            images: vec![],
            specifications: Map::new(),
            translations: Default::default(),
            market_value: 0.0,
            price_per_number: 10.0,
            total_numbers: 50,
            draw_date: now,
            status: RaffleStatus::Active,
            winner_number: None,
            winner_user_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
            sold_numbers: None,
        };
        state.db.insert_raffle(&raffle).unwrap();

        let contact = Contact {
            email: "ana@x.com".into(),
            name: "Ana".into(),
            phone: None,
            user_id: None,
        };
        let hold = ChronoDuration::minutes(15);
        state
            .db
            .reserve_numbers(raffle.id, &[1, 2], &contact, now - ChronoDuration::minutes(20), hold)
            .unwrap();
        state.db.reserve_numbers(raffle.id, &[3], &contact, now, hold).unwrap();

        assert_eq!(sweep_once(&state).await.unwrap(), 2);
        assert_eq!(sweep_once(&state).await.unwrap(), 0);

        let rows = state.db.numbers_for_raffle(raffle.id).unwrap();
        let expired = rows
            .iter()
            .filter(|r| r.payment_status == NumberStatus::Expired)
            .count();
        assert_eq!(expired, 2);
    }
}
