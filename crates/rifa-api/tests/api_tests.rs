//! Router-level tests: real handlers, in-memory SQLite, a fake card processor.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use rifa_api::payments::PaymentSettings;
use rifa_api::payments::card::{CardError, CardProcessor, IntentRequest, PaymentIntent};
use rifa_api::{AppState, AppStateInner, build_router};
use rifa_db::Database;
use rifa_db::models::Contact;
use rifa_types::models::{PaymentStatus, Raffle, RaffleStatus};

const ADMIN_EMAIL: &str = "admin@rifa.example";

struct FakeCard;

#[async_trait]
impl CardProcessor for FakeCard {
    async fn create_intent(&self, req: &IntentRequest) -> Result<PaymentIntent, CardError> {
        Ok(PaymentIntent {
            id: format!("pi_{}", req.payment_id.simple()),
            client_secret: format!("pi_{}_secret_{}", req.payment_id.simple(), req.amount_minor),
        })
    }
}

fn test_state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        admin_email: Some(ADMIN_EMAIL.into()),
        card: Arc::new(FakeCard),
        payments: PaymentSettings::default(),
    })
}

fn seed_raffle(state: &AppState, status: RaffleStatus) -> Raffle {
    let now = Utc::now();
    let raffle = Raffle {
        id: Uuid::new_v4(),
        title: "iPhone 15 Pro".into(),
        description: "Sealed, 256GB".into(),
        images: vec![],
        specifications: Map::new(),
        translations: serde_json::from_value(json!({
            "pt": { "title": "iPhone 15 Pro (lacrado)", "description": "Lacrado, 256GB" }
        }))
        .unwrap(),
        market_value: 8999.0,
        price_per_number: 10.0,
        total_numbers: 300,
        draw_date: now + Duration::days(7),
        status,
        winner_number: None,
        winner_user_id: None,
        created_by: None,
        created_at: now,
        updated_at: now,
        sold_numbers: None,
    };
    state.db.insert_raffle(&raffle).unwrap();
    raffle
}

async fn json_request(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(json_body) => Body::from(serde_json::to_vec(&json_body).unwrap()),
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

async fn register(router: &Router, email: &str) -> String {
    let (status, body) = json_request(
        router,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": "correct horse", "name": "Tester" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

fn reserve_body(numbers: &[u32], email: &str) -> Value {
    json!({
        "numbers": numbers,
        "userEmail": email,
        "userName": "Ana",
        "userWhatsapp": "+55 11 99999-9999"
    })
}

fn parse_time(v: &Value) -> DateTime<Utc> {
    v.as_str().unwrap().parse().unwrap()
}

fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
    let drift = (actual - expected).num_seconds().abs();
    assert!(drift <= 5, "{actual} is {drift}s away from {expected}");
}

#[tokio::test]
async fn test_health() {
    let router = build_router(test_state());
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_instant_transfer_checkout_end_to_end() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);
    let start = Utc::now();

    let (status, body) = json_request(
        &router,
        "POST",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        Some(reserve_body(&[4, 17, 42], "ana@x.com")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["numbers"].as_array().unwrap().len(), 3);
    assert!(body["numbers"]
        .as_array()
        .unwrap()
        .iter()
        .all(|n| n["payment_status"] == "pending"));
    assert_close(parse_time(&body["reservedUntil"]), start + Duration::minutes(15));

    let (status, body) = json_request(
        &router,
        "POST",
        "/api/payments/pix",
        None,
        Some(json!({
            "raffleId": raffle.id,
            "numbers": [4, 17, 42],
            "amount": 30,
            "userEmail": "ana@x.com",
            "userName": "Ana"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(!body["pixCode"].as_str().unwrap().is_empty());
    assert_eq!(body["pixKey"], "pagamentos@rifa.example");
    assert_eq!(body["amount"], 30.0);
    assert_close(parse_time(&body["expiresAt"]), start + Duration::minutes(30));

    let payment_id: Uuid = body["paymentId"].as_str().unwrap().parse().unwrap();
    let payment = state.db.get_payment(payment_id).unwrap().unwrap();
    assert_eq!(payment.amount, 30.0);
    assert_eq!(payment.currency, "BRL");
    assert_eq!(payment.payment_status, PaymentStatus::Pending);
    assert_eq!(payment.numbers, vec![4, 17, 42]);

    let (status, body) = json_request(
        &router,
        "GET",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservedNumbers"], json!([4, 17, 42]));
    assert_eq!(body["soldNumbers"], json!([]));
    assert_eq!(body["totalSold"], 0);
}

#[tokio::test]
async fn test_expired_hold_reads_as_available() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);

    let contact = Contact {
        email: "ana@x.com".into(),
        name: "Ana".into(),
        phone: None,
        user_id: None,
    };
    // Hold ended one second ago.
    let then = Utc::now() - Duration::minutes(15) - Duration::seconds(1);
    state
        .db
        .reserve_numbers(raffle.id, &[5], &contact, then, Duration::minutes(15))
        .unwrap();

    let (status, body) = json_request(
        &router,
        "GET",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["soldNumbers"], json!([]));
    assert_eq!(body["reservedNumbers"], json!([]));

    let (status, _) = json_request(
        &router,
        "POST",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        Some(reserve_body(&[5], "bob@x.com")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_overlapping_reservations() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);
    let uri = format!("/api/raffles/{}/numbers", raffle.id);

    let (a, b) = tokio::join!(
        json_request(&router, "POST", &uri, None, Some(reserve_body(&[1, 2, 3], "ana@x.com"))),
        json_request(&router, "POST", &uri, None, Some(reserve_body(&[3, 4, 5], "bob@x.com"))),
    );

    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let board = state.db.number_board(raffle.id, Utc::now()).unwrap();
    assert_eq!(board.reserved_numbers.len(), 3);
    assert!(board.reserved_numbers.contains(&3));
}

#[tokio::test]
async fn test_reservation_validation() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);
    let draft = seed_raffle(&state, RaffleStatus::Draft);
    let uri = format!("/api/raffles/{}/numbers", raffle.id);

    let (status, _) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[301], "a@x.com"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[7, 7], "a@x.com"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[7], ""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_request(
        &router,
        "POST",
        &format!("/api/raffles/{}/numbers", draft.id),
        None,
        Some(reserve_body(&[7], "a@x.com")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[8], "a@x.com"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["numbers"][0]["number"], 8);

    let (status, body) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[8, 9], "b@x.com"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains('8'));
}

#[tokio::test]
async fn test_payment_checks_amount_and_holds() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);

    json_request(
        &router,
        "POST",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        Some(reserve_body(&[10, 11], "ana@x.com")),
    )
    .await;

    let pay = |amount: f64, email: &str| {
        json!({
            "raffleId": raffle.id,
            "numbers": [10, 11],
            "amount": amount,
            "userEmail": email,
            "userName": "Ana"
        })
    };

    let (status, _) = json_request(&router, "POST", "/api/payments/zelle", None, Some(pay(1.0, "ana@x.com"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_request(&router, "POST", "/api/payments/zelle", None, Some(pay(20.0, "bob@x.com"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = json_request(&router, "POST", "/api/payments/paypal", None, Some(pay(20.0, "ana@x.com"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = json_request(&router, "POST", "/api/payments/zelle", None, Some(pay(20.0, "ana@x.com"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["zelleEmail"], "payments@rifa.example");
    assert!(body["reference"].as_str().unwrap().starts_with("RIFA-"));
    assert_eq!(body["instructions"].as_array().unwrap().len(), 5);

    let payment_id: Uuid = body["paymentId"].as_str().unwrap().parse().unwrap();
    let payment = state.db.get_payment(payment_id).unwrap().unwrap();
    assert_eq!(payment.currency, "USD");
    assert_eq!(payment.provider_ref.as_deref(), body["reference"].as_str());

    // The hold already backs an open payment.
    let (status, body) = json_request(&router, "POST", "/api/payments/pix", None, Some(pay(20.0, "ana@x.com"))).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn test_buyer_can_extend_own_reservation() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);
    let uri = format!("/api/raffles/{}/numbers", raffle.id);

    let (status, _) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[4], "ana@x.com"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[4, 5], "ana@x.com"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["numbers"].as_array().unwrap().len(), 2);
    assert_eq!(state.db.numbers_for_raffle(raffle.id).unwrap().len(), 2);

    let (status, _) = json_request(&router, "POST", &uri, None, Some(reserve_body(&[5], "bob@x.com"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_card_payment_and_admin_settlement() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);
    let admin = register(&router, ADMIN_EMAIL).await;
    let buyer = register(&router, "buyer@x.com").await;

    json_request(
        &router,
        "POST",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        Some(reserve_body(&[100], "ana@x.com")),
    )
    .await;

    let (status, body) = json_request(
        &router,
        "POST",
        "/api/payments/stripe",
        None,
        Some(json!({
            "raffleId": raffle.id,
            "numbers": [100],
            "amount": 10.0,
            "currency": "brl",
            "userEmail": "ana@x.com",
            "userName": "Ana"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["clientSecret"].as_str().unwrap().ends_with("_secret_1000"));
    let payment_id = body["paymentId"].as_str().unwrap().to_string();
    assert_eq!(
        state.db.get_payment(payment_id.parse().unwrap()).unwrap().unwrap().currency,
        "BRL"
    );

    let settle_uri = format!("/api/payments/{}", payment_id);
    let completed = Some(json!({ "status": "completed" }));

    let (status, _) = json_request(&router, "PATCH", &settle_uri, None, completed.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = json_request(&router, "PATCH", &settle_uri, Some(&buyer), completed.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = json_request(&router, "PATCH", &settle_uri, Some(&admin), completed.clone()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["payment_status"], "completed");

    let (status, _) = json_request(&router, "PATCH", &settle_uri, Some(&admin), completed).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, board) = json_request(
        &router,
        "GET",
        &format!("/api/raffles/{}/numbers", raffle.id),
        None,
        None,
    )
    .await;
    assert_eq!(board["soldNumbers"], json!([100]));

    let (status, stats) = json_request(&router, "GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalRevenue"], 10.0);
    assert_eq!(stats["activeRaffles"], 1);
    assert_eq!(stats["totalUsers"], 2);
}

#[tokio::test]
async fn test_admin_only_raffle_writes() {
    let state = test_state();
    let router = build_router(state.clone());
    let admin = register(&router, ADMIN_EMAIL).await;
    let user = register(&router, "ana@x.com").await;

    let new_raffle = json!({
        "title": "PlayStation 5",
        "price_per_number": 5.0,
        "total_numbers": 500,
        "draw_date": "2026-12-24T20:00:00Z",
        "status": "active"
    });

    let (status, body) = json_request(&router, "POST", "/api/raffles", None, Some(new_raffle.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = json_request(&router, "POST", "/api/raffles", Some(&user), Some(new_raffle.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = json_request(&router, "GET", "/api/admin/stats", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = json_request(&router, "POST", "/api/raffles", Some(&admin), Some(new_raffle)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["raffle"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["raffle"]["soldNumbers"], 0);

    let (status, _) = json_request(
        &router,
        "PATCH",
        &format!("/api/raffles/{}", id),
        Some(&admin),
        Some(json!({ "total_numbers": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = json_request(
        &router,
        "PATCH",
        &format!("/api/raffles/{}", id),
        Some(&admin),
        Some(json!({ "status": "paused", "price_per_number": 6.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["raffle"]["status"], "paused");
    assert_eq!(body["raffle"]["total_numbers"], 500);

    let (status, body) = json_request(&router, "GET", "/api/raffles?status=paused", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["raffles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_raffle_is_404() {
    let router = build_router(test_state());
    let missing = Uuid::new_v4();

    let (status, body) = json_request(&router, "GET", &format!("/api/raffles/{}", missing), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "raffle not found");

    let (status, _) = json_request(
        &router,
        "POST",
        &format!("/api/raffles/{}/numbers", missing),
        None,
        Some(reserve_body(&[1], "a@x.com")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_raffle_listing_is_localized() {
    let state = test_state();
    let router = build_router(state.clone());
    let raffle = seed_raffle(&state, RaffleStatus::Active);

    let (status, body) = json_request(&router, "GET", "/api/raffles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["raffles"][0]["title"], "iPhone 15 Pro");
    assert_eq!(body["raffles"][0]["soldNumbers"], 0);

    let (_, body) = json_request(
        &router,
        "GET",
        &format!("/api/raffles/{}?locale=pt", raffle.id),
        None,
        None,
    )
    .await;
    assert_eq!(body["raffle"]["title"], "iPhone 15 Pro (lacrado)");

    let (_, body) = json_request(
        &router,
        "GET",
        &format!("/api/raffles/{}?locale=fr", raffle.id),
        None,
        None,
    )
    .await;
    assert_eq!(body["raffle"]["title"], "iPhone 15 Pro");
}

#[tokio::test]
async fn test_profile_lifecycle() {
    let router = build_router(test_state());
    let token = register(&router, "ana@x.com").await;

    let (status, body) = json_request(&router, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["role"], "user");

    let (status, body) = json_request(
        &router,
        "PATCH",
        "/api/auth/me",
        Some(&token),
        Some(json!({ "phone": "+55 11 90000-0000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["phone"], "+55 11 90000-0000");

    let (status, body) = json_request(
        &router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@x.com", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["email"], "ana@x.com");

    let (status, _) = json_request(
        &router,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@x.com", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = json_request(&router, "GET", "/api/auth/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
